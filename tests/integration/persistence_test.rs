// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use ratingcrawl::domain::models::WorkItem;
use ratingcrawl::infrastructure::repositories::url_info_repo_impl::UrlInfoRepositoryImpl;
use ratingcrawl::workers::WorkerPool;
use sea_orm::Database;
use tokio_util::sync::CancellationToken;

use super::helpers::{options, StubStrategy};

#[tokio::test]
async fn test_pool_persists_into_url_info() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let repo = Arc::new(UrlInfoRepositoryImpl::new(Arc::new(db)));

    let pool = WorkerPool::new(
        Arc::new(StubStrategy {
            delay: Duration::from_millis(1),
        }),
        repo.clone(),
        options(2),
        CancellationToken::new(),
    );
    let (dispatcher, completion) = pool.start();

    dispatcher
        .dispatch(WorkItem::new("good", "https://channelstore.roku.com/details/1/good"))
        .await
        .unwrap();
    dispatcher
        .dispatch(WorkItem::new("broken", "https://channelstore.roku.com/details/2/bad"))
        .await
        .unwrap();
    drop(dispatcher);

    let report = completion.wait().await;
    assert_eq!(report.persisted, 2);
    assert_eq!(report.persist_failed, 0);
    assert_eq!(repo.count().await.unwrap(), 2);

    let good = repo.find_by_request_id("good").await.unwrap();
    assert_eq!(good.len(), 1);
    assert!(good[0].success);
    assert_eq!(good[0].app_name, "Stub Channel");
    assert_eq!(good[0].rating, 4.65);
    assert_eq!(good[0].rating_count, 12);

    let broken = repo.find_by_request_id("broken").await.unwrap();
    assert!(!broken[0].success);
    assert!(broken[0].last_error.contains("404"));
    assert_eq!(broken[0].rating_count, 0);
}

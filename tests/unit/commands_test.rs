// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use ratingcrawl::application::commands;
use ratingcrawl::config::settings::Settings;
use tokio_util::sync::CancellationToken;

fn local_settings() -> Settings {
    let mut settings = Settings::load(None).unwrap();
    settings.database.url = "sqlite::memory:".to_string();
    settings.database.min_connections = None;
    settings.database.max_connections = Some(1);
    settings.broker.url = "memory".to_string();
    settings.server.host = "127.0.0.1".to_string();
    settings.server.port = 0;
    settings.metrics.enabled = false;
    settings
}

#[tokio::test]
async fn test_migrate_on_empty_database() {
    commands::run_migrate(&local_settings()).await.unwrap();
}

#[tokio::test]
async fn test_crawler_stops_on_cancel() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    commands::run_crawler(&local_settings(), cancel).await.unwrap();
}

#[tokio::test]
async fn test_standalone_stops_on_cancel() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    commands::run_standalone(&local_settings(), cancel).await.unwrap();
}

#[tokio::test]
async fn test_feed_missing_file_fails() {
    let settings = local_settings();
    let result = commands::run_feed(
        &settings,
        std::path::Path::new("/nonexistent/urls.csv"),
        CancellationToken::new(),
    )
    .await;

    assert!(result.is_err());
}

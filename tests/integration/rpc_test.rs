// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use std::sync::Arc;
use tower::util::ServiceExt;

use ratingcrawl::domain::services::admission_service::KillSwitchPolicy;
use ratingcrawl::infrastructure::repositories::memory_sink::MemorySink;
use ratingcrawl::presentation::routes;
use ratingcrawl::queue::memory_broker::MemoryBroker;
use tokio_util::sync::CancellationToken;

use super::helpers::{crawler, eventually, gateway};

fn process_url(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/process-url")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// 健康检查
#[tokio::test]
async fn health_check_works() {
    let broker = Arc::new(MemoryBroker::new());
    let app = routes::routes(Arc::new(gateway(
        Arc::new(KillSwitchPolicy::new(false)),
        broker,
        CancellationToken::new(),
    )));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

/// RPC 请求经队列到达持久化层
#[tokio::test]
async fn process_url_reaches_the_sink() {
    let broker = Arc::new(MemoryBroker::new());
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let running = crawler(broker.clone(), sink.clone(), 2).subscribe().await.unwrap();
    let crawler_task = tokio::spawn(running.run(cancel.clone()));

    let app = routes::routes(Arc::new(gateway(
        Arc::new(KillSwitchPolicy::new(false)),
        broker.clone(),
        cancel.clone(),
    )));

    let response = app
        .oneshot(process_url(
            r#"{"request_id":"rpc-1","url":"https://channelstore.roku.com/en-gb/details/12/news"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ACCEPTED");
    assert_eq!(body["request_id"], "rpc-1");

    eventually("record persisted", || sink.len() == 1).await;
    cancel.cancel();
    crawler_task.await.unwrap();

    let record = &sink.records()[0];
    assert_eq!(record.request_id, "rpc-1");
    assert_eq!(record.url, "https://channelstore.roku.com/en-gb/details/12/news");
    assert!(record.success);
}

/// 开关打开时返回 UNAVAILABLE 且不入队
#[tokio::test]
async fn kill_switch_answers_unavailable() {
    let broker = Arc::new(MemoryBroker::new());
    let app = routes::routes(Arc::new(gateway(
        Arc::new(KillSwitchPolicy::new(true)),
        broker.clone(),
        CancellationToken::new(),
    )));

    let response = app
        .oneshot(process_url(r#"{"url":"https://channelstore.roku.com/details/1/a"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "UNAVAILABLE");
    assert_eq!(broker.published_count(), 0);
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::sync::Arc;

use ratingcrawl::application::dto::process_url_request::ProcessUrlRequest;
use ratingcrawl::domain::services::admission_service::{AdmissionStatus, KillSwitchPolicy, RandomRejectPolicy};
use ratingcrawl::infrastructure::repositories::memory_sink::MemorySink;
use ratingcrawl::queue::broker::MessageBroker;
use ratingcrawl::queue::memory_broker::MemoryBroker;
use tokio_util::sync::CancellationToken;

use super::helpers::{crawler, eventually, gateway, TOPIC};

fn url(n: usize) -> String {
    format!("https://channelstore.roku.com/details/{}/channel-{}", n, n)
}

#[tokio::test]
async fn test_gateway_to_sink_round_trip() {
    let broker = Arc::new(MemoryBroker::new());
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let running = crawler(broker.clone(), sink.clone(), 3).subscribe().await.unwrap();
    let crawler_task = tokio::spawn(running.run(cancel.clone()));

    let gateway = gateway(Arc::new(KillSwitchPolicy::new(false)), broker.clone(), cancel.clone());

    let mut expected = HashSet::new();
    for n in 0..8 {
        let response = gateway
            .process_url(ProcessUrlRequest::new(format!("req-{}", n), url(n)))
            .await
            .unwrap();
        assert_eq!(response.status, AdmissionStatus::Accepted);
        expected.insert((response.request_id, url(n)));
    }
    let bad = gateway
        .process_url(ProcessUrlRequest {
            request_id: None,
            url: "https://channelstore.roku.com/details/9/bad".to_string(),
        })
        .await
        .unwrap();
    expected.insert((bad.request_id.clone(), "https://channelstore.roku.com/details/9/bad".to_string()));

    eventually("all records persisted", || sink.len() == 9).await;
    cancel.cancel();
    let report = crawler_task.await.unwrap();

    assert_eq!(report.consumer.received, 9);
    assert_eq!(report.consumer.dispatched, 9);
    assert_eq!(report.pool.persisted, 9);

    let records = sink.records();
    let seen: HashSet<_> = records.iter().map(|r| (r.request_id.clone(), r.url.clone())).collect();
    assert_eq!(seen, expected);

    for record in &records {
        assert_eq!(record.success, record.last_error.is_empty());
        assert!(record.stats.waiting.end_at >= record.stats.waiting.start_at);
        assert!(record.stats.collector.end_at >= record.stats.collector.start_at);
        assert!(record.stats.collector_id < 3);
    }

    let failed = records.iter().find(|r| r.request_id == bad.request_id).unwrap();
    assert!(!failed.success);
    assert_eq!(failed.app_name, "");
    assert_eq!(failed.rating, 0.0);
    assert_eq!(failed.rating_count, 0);
}

#[tokio::test]
async fn test_retry_is_never_queued() {
    let broker = Arc::new(MemoryBroker::new());
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let running = crawler(broker.clone(), sink.clone(), 2).subscribe().await.unwrap();
    let crawler_task = tokio::spawn(running.run(cancel.clone()));

    let gateway = gateway(Arc::new(RandomRejectPolicy::new(1.0, Some(1))), broker.clone(), cancel.clone());
    for n in 0..5 {
        let response = gateway
            .process_url(ProcessUrlRequest::new(format!("req-{}", n), url(n)))
            .await
            .unwrap();
        assert_eq!(response.status, AdmissionStatus::Retry);
    }

    cancel.cancel();
    let report = crawler_task.await.unwrap();

    assert_eq!(broker.published_count(), 0);
    assert_eq!(report.consumer.received, 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_competing_crawlers_share_the_group() {
    let broker = Arc::new(MemoryBroker::new());
    let first_sink = Arc::new(MemorySink::new());
    let second_sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let first = crawler(broker.clone(), first_sink.clone(), 2).subscribe().await.unwrap();
    let second = crawler(broker.clone(), second_sink.clone(), 2).subscribe().await.unwrap();
    let first_task = tokio::spawn(first.run(cancel.clone()));
    let second_task = tokio::spawn(second.run(cancel.clone()));

    let gateway = gateway(Arc::new(KillSwitchPolicy::new(false)), broker.clone(), cancel.clone());
    for n in 0..10 {
        gateway
            .process_url(ProcessUrlRequest::new(format!("req-{}", n), url(n)))
            .await
            .unwrap();
    }

    eventually("both crawlers drained the queue", || {
        first_sink.len() + second_sink.len() == 10
    })
    .await;
    cancel.cancel();
    let first_report = first_task.await.unwrap();
    let second_report = second_task.await.unwrap();

    // Each message reaches exactly one member of the group
    assert_eq!(first_report.consumer.received + second_report.consumer.received, 10);
    assert!(first_sink.len() > 0);
    assert!(second_sink.len() > 0);

    let ids: HashSet<_> = first_sink
        .records()
        .into_iter()
        .chain(second_sink.records())
        .map(|r| r.request_id)
        .collect();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_malformed_message_is_skipped() {
    let broker = Arc::new(MemoryBroker::new());
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let running = crawler(broker.clone(), sink.clone(), 1).subscribe().await.unwrap();
    let crawler_task = tokio::spawn(running.run(cancel.clone()));

    broker.publish(TOPIC, b"not json".to_vec()).await.unwrap();
    broker
        .publish(TOPIC, br#"{"request_id":"","url":"https://channelstore.roku.com/details/1/a"}"#.to_vec())
        .await
        .unwrap();
    broker
        .publish(TOPIC, br#"{"request_id":"ok","url":"https://channelstore.roku.com/details/2/b"}"#.to_vec())
        .await
        .unwrap();

    eventually("valid record persisted", || sink.len() == 1).await;
    cancel.cancel();
    let report = crawler_task.await.unwrap();

    assert_eq!(report.consumer.received, 3);
    assert_eq!(report.consumer.malformed, 2);
    assert_eq!(report.consumer.dispatched, 1);
    assert_eq!(sink.records()[0].request_id, "ok");
}

#[tokio::test]
async fn test_cancelled_gateway_stops_admitting() {
    let broker = Arc::new(MemoryBroker::new());
    let cancel = CancellationToken::new();
    let gateway = gateway(Arc::new(KillSwitchPolicy::new(false)), broker.clone(), cancel.clone());

    cancel.cancel();
    let result = gateway.process_url(ProcessUrlRequest::new("late", url(1))).await;

    assert!(result.is_err());
    assert_eq!(broker.published_count(), 0);
}

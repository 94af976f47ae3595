// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use ratingcrawl::application::usecases::process_url::AdmissionGateway;
use ratingcrawl::domain::repositories::result_sink::ResultSink;
use ratingcrawl::domain::services::admission_service::AdmissionPolicy;
use ratingcrawl::engines::traits::{Extraction, ScrapeError, ScrapeStrategy};
use ratingcrawl::queue::bridge::{QueueConsumer, QueuePublisher};
use ratingcrawl::queue::broker::MessageBroker;
use ratingcrawl::workers::{CrawlerManager, PoolOptions};
use tokio_util::sync::CancellationToken;

pub const TOPIC: &str = "crawler.urls";
pub const GROUP: &str = "crawlers";

/// 测试用抓取策略：路径以 `/bad` 结尾的URL失败，其余返回固定评分
pub struct StubStrategy {
    pub delay: Duration,
}

#[async_trait]
impl ScrapeStrategy for StubStrategy {
    async fn extract(&self, url: &str) -> Result<Extraction, ScrapeError> {
        tokio::time::sleep(self.delay).await;
        if url.ends_with("/bad") {
            return Err(ScrapeError::Status(404));
        }
        Ok(Extraction {
            app_name: "Stub Channel".to_string(),
            rating: 4.65,
            rating_count: 12,
        })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn options(lanes: usize) -> PoolOptions {
    PoolOptions {
        lanes,
        scrape_timeout: Duration::from_secs(5),
        persist_timeout: Duration::from_secs(5),
    }
}

pub fn gateway(
    policy: Arc<dyn AdmissionPolicy>,
    broker: Arc<dyn MessageBroker>,
    cancel: CancellationToken,
) -> AdmissionGateway {
    AdmissionGateway::new(policy, QueuePublisher::new(broker, TOPIC), cancel)
}

pub fn crawler(broker: Arc<dyn MessageBroker>, sink: Arc<dyn ResultSink>, lanes: usize) -> CrawlerManager {
    CrawlerManager::new(
        QueueConsumer::new(broker, TOPIC, GROUP),
        Arc::new(StubStrategy {
            delay: Duration::from_millis(5),
        }),
        sink,
        options(lanes),
    )
}

/// 轮询直到条件成立，超时则 panic
pub async fn eventually<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

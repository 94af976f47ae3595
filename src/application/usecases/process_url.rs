// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::process_url_request::ProcessUrlRequest;
use crate::application::dto::process_url_response::ProcessUrlResponse;
use crate::domain::services::admission_service::{AdmissionPolicy, AdmissionStatus};
use crate::queue::bridge::{QueueError, QueuePublisher};
use crate::queue::broker::BrokerError;
use crate::queue::codec::{CodecError, QueueMessage};

// === Section: Errors ===

/// 网关错误
///
/// 传输层错误，与 RETRY / UNAVAILABLE 这类请求级状态不同
#[derive(Error, Debug)]
pub enum GatewayError {
    /// 请求格式错误
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// 编码失败
    #[error("failed to encode message: {0}")]
    Encode(#[source] CodecError),
    /// 发布失败
    #[error("failed to publish message: {0}")]
    Publish(#[source] BrokerError),
    /// 网关正在关闭
    #[error("gateway is shutting down")]
    Cancelled,
}

impl From<QueueError> for GatewayError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Codec(e) => GatewayError::Encode(e),
            QueueError::Broker(e) => GatewayError::Publish(e),
        }
    }
}

// === Section: Use Case Definition ===

/// 准入网关
///
/// 对每个请求执行准入判定，接受的请求发布到队列
pub struct AdmissionGateway {
    policy: Arc<dyn AdmissionPolicy>,
    publisher: QueuePublisher,
    cancel: CancellationToken,
}

// === Section: Implementation ===

impl AdmissionGateway {
    pub fn new(policy: Arc<dyn AdmissionPolicy>, publisher: QueuePublisher, cancel: CancellationToken) -> Self {
        Self {
            policy,
            publisher,
            cancel,
        }
    }

    /// 处理一次抓取请求
    ///
    /// # 参数
    ///
    /// * `request` - 请求ID（可选）与目标URL
    ///
    /// # 返回值
    ///
    /// * `Ok(ProcessUrlResponse)` - ACCEPTED / RETRY / UNAVAILABLE
    /// * `Err(GatewayError)` - 请求格式错误、发布失败或网关关闭
    pub async fn process_url(&self, request: ProcessUrlRequest) -> Result<ProcessUrlResponse, GatewayError> {
        validate_target(&request)?;

        if self.cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let request_id = request
            .request_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let status: AdmissionStatus = self.policy.decide(&request.url).into();
        counter!("ratingcrawl_admission_total", "status" => status.to_string()).increment(1);

        if status != AdmissionStatus::Accepted {
            debug!(request_id = %request_id, url = %request.url, %status, "Request not admitted");
            return Ok(ProcessUrlResponse { request_id, status });
        }

        let message = QueueMessage::new(request_id.clone(), request.url);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(GatewayError::Cancelled),
            published = self.publisher.publish(&message) => published?,
        }

        info!(request_id = %request_id, url = %message.url, topic = self.publisher.topic(), "Request accepted");
        Ok(ProcessUrlResponse { request_id, status })
    }
}

fn validate_target(request: &ProcessUrlRequest) -> Result<(), GatewayError> {
    request
        .validate()
        .map_err(|e| GatewayError::InvalidRequest(format!("url: {}", e)))?;

    let parsed = Url::parse(&request.url).map_err(|e| GatewayError::InvalidRequest(format!("url: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        scheme => Err(GatewayError::InvalidRequest(format!(
            "url must be an absolute http(s) address, got scheme {}",
            scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::admission_service::{KillSwitchPolicy, RandomRejectPolicy};
    use crate::queue::broker::MessageBroker;
    use crate::queue::memory_broker::MemoryBroker;

    const TOPIC: &str = "crawler.urls";
    const URL: &str = "https://channelstore.roku.com/details/abc/slug";

    fn gateway(policy: Arc<dyn AdmissionPolicy>, broker: Arc<MemoryBroker>) -> AdmissionGateway {
        AdmissionGateway::new(
            policy,
            QueuePublisher::new(broker, TOPIC),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_accepted_request_is_published() {
        let broker = Arc::new(MemoryBroker::new());
        let mut subscription = broker.queue_subscribe(TOPIC, "crawlers").await.unwrap();
        let gateway = gateway(Arc::new(RandomRejectPolicy::new(0.0, Some(1))), broker.clone());

        let response = gateway
            .process_url(ProcessUrlRequest::new("req-1", URL))
            .await
            .unwrap();

        assert_eq!(response.status, AdmissionStatus::Accepted);
        assert_eq!(response.request_id, "req-1");

        let delivery = subscription.next().await.unwrap();
        let message = QueueMessage::decode(&delivery.payload).unwrap();
        assert_eq!(message, QueueMessage::new("req-1", URL));
    }

    #[tokio::test]
    async fn test_missing_request_id_is_generated() {
        let broker = Arc::new(MemoryBroker::new());
        let gateway = gateway(Arc::new(RandomRejectPolicy::new(0.0, None)), broker.clone());

        let response = gateway
            .process_url(ProcessUrlRequest {
                request_id: None,
                url: URL.to_string(),
            })
            .await
            .unwrap();

        assert!(Uuid::parse_str(&response.request_id).is_ok());
        assert_eq!(broker.published_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_never_publishes() {
        let broker = Arc::new(MemoryBroker::new());
        let gateway = gateway(Arc::new(RandomRejectPolicy::new(1.0, Some(9))), broker.clone());

        for i in 0..20 {
            let response = gateway
                .process_url(ProcessUrlRequest::new(format!("req-{}", i), URL))
                .await
                .unwrap();
            assert_eq!(response.status, AdmissionStatus::Retry);
        }
        assert_eq!(broker.published_count(), 0);
    }

    #[tokio::test]
    async fn test_seeded_policy_publishes_exactly_accepted() {
        let broker = Arc::new(MemoryBroker::new());
        let gateway = gateway(Arc::new(RandomRejectPolicy::new(0.5, Some(42))), broker.clone());

        let mut accepted = 0;
        for i in 0..50 {
            let response = gateway
                .process_url(ProcessUrlRequest::new(format!("req-{}", i), URL))
                .await
                .unwrap();
            if response.status == AdmissionStatus::Accepted {
                accepted += 1;
            }
        }

        assert_eq!(broker.published_count(), accepted);
    }

    #[tokio::test]
    async fn test_kill_switch_is_unavailable() {
        let broker = Arc::new(MemoryBroker::new());
        let gateway = gateway(Arc::new(KillSwitchPolicy::new(true)), broker.clone());

        let response = gateway
            .process_url(ProcessUrlRequest::new("req-1", URL))
            .await
            .unwrap();

        assert_eq!(response.status, AdmissionStatus::Unavailable);
        assert_eq!(broker.published_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_is_gateway_error() {
        let broker = Arc::new(MemoryBroker::new());
        broker.set_fail_publish(true);
        let gateway = gateway(Arc::new(KillSwitchPolicy::new(false)), broker);

        let result = gateway.process_url(ProcessUrlRequest::new("req-1", URL)).await;
        assert!(matches!(result, Err(GatewayError::Publish(_))));
    }

    #[tokio::test]
    async fn test_malformed_url_is_rejected() {
        let broker = Arc::new(MemoryBroker::new());
        let gateway = gateway(Arc::new(KillSwitchPolicy::new(false)), broker.clone());

        for url in ["not a url", "ftp://example.com/file", "/details/abc/slug"] {
            let result = gateway.process_url(ProcessUrlRequest::new("req", url)).await;
            assert!(matches!(result, Err(GatewayError::InvalidRequest(_))), "{}", url);
        }
        assert_eq!(broker.published_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_gateway_refuses() {
        let broker = Arc::new(MemoryBroker::new());
        let cancel = CancellationToken::new();
        let gateway = AdmissionGateway::new(
            Arc::new(KillSwitchPolicy::new(false)),
            QueuePublisher::new(broker.clone(), TOPIC),
            cancel.clone(),
        );
        cancel.cancel();

        let result = gateway.process_url(ProcessUrlRequest::new("req", URL)).await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));
        assert_eq!(broker.published_count(), 0);
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::application::dto::process_url_request::ProcessUrlRequest;
use crate::application::dto::process_url_response::ProcessUrlResponse;
use crate::config::settings::FeederSettings;
use crate::domain::services::admission_service::AdmissionStatus;
use crate::feeder::csv_reader::{CsvUrlReader, ReadReport};
use crate::feeder::FeedError;

const PROCESS_URL_PATH: &str = "/v1/process-url";

/// 投递统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub read: u64,
    pub invalid: u64,
    pub accepted: u64,
    pub retried: u64,
}

/// 网关 RPC 客户端
#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl GatewayClient {
    /// 创建客户端
    ///
    /// # 参数
    ///
    /// * `gateway_url` - 网关根地址
    /// * `timeout` - 单次请求超时
    pub fn new(gateway_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let endpoint = Url::parse(gateway_url)
            .and_then(|base| base.join(PROCESS_URL_PATH))
            .map_err(|e| FeedError::InvalidEndpoint(format!("{}: {}", gateway_url, e)))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub async fn process_url(&self, request: &ProcessUrlRequest) -> Result<ProcessUrlResponse, FeedError> {
        let response = self.client.post(self.endpoint.clone()).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Rejected(status.as_u16(), body));
        }

        Ok(response.json().await?)
    }
}

/// CSV 投递器
///
/// 读取任务与发送循环通过有界通道连接
pub struct Feeder {
    client: GatewayClient,
    settings: FeederSettings,
}

impl Feeder {
    pub fn new(settings: &FeederSettings) -> Result<Self, FeedError> {
        let client = GatewayClient::new(
            &settings.gateway_url,
            Duration::from_secs(settings.request_timeout_secs),
        )?;
        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    /// 读取文件并逐个发送到网关
    ///
    /// ACCEPTED 继续；RETRY 记录警告后继续；UNAVAILABLE 或传输错误立即停止
    ///
    /// # 参数
    ///
    /// * `path` - CSV 文件路径
    /// * `cancel` - 取消令牌
    ///
    /// # 返回值
    ///
    /// * `Ok(FeedReport)` - 文件发送完毕或被取消
    /// * `Err(FeedError)` - 网关不可用、传输失败或文件读取失败
    pub async fn run(&self, path: &Path, cancel: CancellationToken) -> Result<FeedReport, FeedError> {
        let (tx, mut rx) = mpsc::channel(self.settings.buffer_size.max(1));
        let reader_cancel = cancel.child_token();
        let reader = CsvUrlReader::new(path, self.settings.skip_rows, self.settings.url_domain.clone());
        let reader_task = tokio::spawn(reader.run(tx, reader_cancel.clone()));

        let mut report = FeedReport::default();
        let sent = self.send_all(&mut rx, &cancel, &mut report).await;

        // Stop the reader if sending ended early
        reader_cancel.cancel();
        drop(rx);

        let read: ReadReport = reader_task.await??;
        report.read = read.read;
        report.invalid = read.invalid;

        match sent {
            Ok(()) => {
                info!(?report, "Sender is done");
                Ok(report)
            }
            Err(e) => {
                error!(?report, "Feeding stopped: {}", e);
                Err(e)
            }
        }
    }

    async fn send_all(
        &self,
        rx: &mut mpsc::Receiver<String>,
        cancel: &CancellationToken,
        report: &mut FeedReport,
    ) -> Result<(), FeedError> {
        loop {
            let url = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                url = rx.recv() => match url {
                    Some(url) => url,
                    None => return Ok(()),
                },
            };

            let request = ProcessUrlRequest::new(Uuid::new_v4().to_string(), url);
            let response = self.client.process_url(&request).await?;

            match response.status {
                AdmissionStatus::Accepted => report.accepted += 1,
                AdmissionStatus::Retry => {
                    report.retried += 1;
                    warn!(url = %request.url, "The gateway asked to retry the current URL");
                }
                AdmissionStatus::Unavailable => return Err(FeedError::Unavailable),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(gateway_url: String) -> FeederSettings {
        FeederSettings {
            gateway_url,
            skip_rows: 1,
            buffer_size: 2,
            url_domain: "channelstore.roku.com".to_string(),
            request_timeout_secs: 5,
        }
    }

    fn csv(urls: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "url").unwrap();
        for url in urls {
            writeln!(file, "{}", url).unwrap();
        }
        file
    }

    async fn respond(server: &MockServer, url: &str, status: &str) {
        Mock::given(method("POST"))
            .and(path(PROCESS_URL_PATH))
            .and(body_partial_json(json!({ "url": url })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "echo",
                "status": status
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_retry_continues_and_counts() {
        let server = MockServer::start().await;
        let a = "https://channelstore.roku.com/details/a/one";
        let b = "https://channelstore.roku.com/details/b/two";
        respond(&server, a, "ACCEPTED").await;
        respond(&server, b, "RETRY").await;

        let file = csv(&[a, b, "https://other.com/details/c/three"]);
        let feeder = Feeder::new(&settings(server.uri())).unwrap();
        let report = feeder.run(file.path(), CancellationToken::new()).await.unwrap();

        assert_eq!(
            report,
            FeedReport {
                read: 3,
                invalid: 1,
                accepted: 1,
                retried: 1
            }
        );
    }

    #[tokio::test]
    async fn test_unavailable_stops_sending() {
        let server = MockServer::start().await;
        let a = "https://channelstore.roku.com/details/a/one";
        let b = "https://channelstore.roku.com/details/b/two";
        respond(&server, a, "UNAVAILABLE").await;
        respond(&server, b, "ACCEPTED").await;

        let file = csv(&[a, b]);
        let feeder = Feeder::new(&settings(server.uri())).unwrap();
        let result = feeder.run(file.path(), CancellationToken::new()).await;

        assert!(matches!(result, Err(FeedError::Unavailable)));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_stops_sending() {
        let file = csv(&["https://channelstore.roku.com/details/a/one"]);
        let feeder = Feeder::new(&settings("http://127.0.0.1:1".to_string())).unwrap();
        let result = feeder.run(file.path(), CancellationToken::new()).await;

        assert!(matches!(result, Err(FeedError::Transport(_))));
    }

    #[tokio::test]
    async fn test_gateway_error_status_stops_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid request" })))
            .mount(&server)
            .await;

        let file = csv(&["https://channelstore.roku.com/details/a/one"]);
        let feeder = Feeder::new(&settings(server.uri())).unwrap();

        assert!(matches!(
            feeder.run(file.path(), CancellationToken::new()).await,
            Err(FeedError::Rejected(400, _))
        ));
    }
}

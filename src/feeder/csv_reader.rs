// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fs::File;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::feeder::FeedError;

/// 读取统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadReport {
    /// 跳过表头后读取的记录数
    pub read: u64,
    /// 校验失败的记录数
    pub invalid: u64,
}

/// 校验URL：必须是带主机名的绝对 http(s) 地址，且主机名包含指定域名
pub fn is_valid_url(uri: &str, url_domain: &str) -> bool {
    let Ok(parsed) = Url::parse(uri) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host_str() {
        Some(host) => url_domain.is_empty() || host.contains(url_domain),
        None => false,
    }
}

/// CSV URL 读取器
pub struct CsvUrlReader {
    path: PathBuf,
    skip_rows: usize,
    url_domain: String,
}

impl CsvUrlReader {
    /// 创建读取器
    ///
    /// # 参数
    ///
    /// * `path` - CSV 文件路径
    /// * `skip_rows` - 跳过的表头行数
    /// * `url_domain` - 允许的域名
    pub fn new(path: impl Into<PathBuf>, skip_rows: usize, url_domain: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            skip_rows,
            url_domain: url_domain.into(),
        }
    }

    /// 读取文件，把每条记录第一列中的合法URL写入通道
    ///
    /// 解析在阻塞线程中进行；接收端关闭或收到取消信号时提前结束，返回时发送端被丢弃
    pub async fn run(self, tx: mpsc::Sender<String>, cancel: CancellationToken) -> Result<ReadReport, FeedError> {
        tokio::task::spawn_blocking(move || self.read_records(&tx, &cancel)).await?
    }

    fn read_records(&self, tx: &mpsc::Sender<String>, cancel: &CancellationToken) -> Result<ReadReport, FeedError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut report = ReadReport::default();

        info!(path = %self.path.display(), "Parsing CSV file");

        for (index, record) in reader.records().enumerate() {
            if cancel.is_cancelled() {
                debug!("CSV reader cancelled");
                break;
            }
            let record = record?;
            if index < self.skip_rows || record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            report.read += 1;

            let uri = record.get(0).unwrap_or_default().trim();
            if !is_valid_url(uri, &self.url_domain) {
                report.invalid += 1;
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                warn!(line, "Invalid URL: {}", uri);
                continue;
            }

            if tx.blocking_send(uri.to_string()).is_err() {
                debug!("URL receiver closed, reader stopping");
                break;
            }
        }

        debug!("CSV end of file");
        Ok(report)
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engines::traits::{Extraction, ScrapeError};

/// 工作项
///
/// 从网关流向工作通道的请求单元。`request_id` 在 RPC、队列和存储之间贯穿同一次抓取尝试。
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// 请求ID，创建后不可变
    pub request_id: String,
    /// 待抓取的绝对URL
    pub url: String,
    /// 交给工作通道的时刻，即等待阶段的开始
    pub enqueued_at: DateTime<Utc>,
}

impl WorkItem {
    /// 创建工作项，并以当前时间作为入队时间
    pub fn new(request_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            url: url.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// 单个阶段的时间记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Times {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// 持续时间（毫秒）
    #[serde(rename = "duration")]
    pub duration_ms: i64,
}

impl Times {
    /// 以给定时刻开始一个阶段，结束时间暂与开始时间相同
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            start_at: at,
            end_at: at,
            duration_ms: 0,
        }
    }

    /// 结束阶段
    ///
    /// 墙上时钟可能回拨，结束时间不早于开始时间
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.end_at = at.max(self.start_at);
        self.duration_ms = (self.end_at - self.start_at).num_milliseconds();
    }
}

/// 耗时统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// 处理该工作项的工作通道编号
    pub collector_id: usize,
    /// 排队等待阶段
    pub waiting: Times,
    /// 抓取阶段
    pub collector: Times,
}

/// 抓取结果记录
///
/// 工作通道的输出，持久化层的输入。`success` 为 true 当且仅当 `last_error` 为空。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub request_id: String,
    pub url: String,
    pub app_name: String,
    /// 评分，保留两位小数，范围 0.0 - 5.0
    pub rating: f64,
    pub rating_count: u32,
    pub success: bool,
    pub last_error: String,
    pub stats: Stats,
}

impl ResultRecord {
    /// 工作通道接收工作项时调用：结束等待阶段，开始抓取阶段
    pub fn start_collecting(item: WorkItem, collector_id: usize) -> Self {
        let now = Utc::now();
        let mut waiting = Times::started(item.enqueued_at);
        waiting.close(now);

        Self {
            request_id: item.request_id,
            url: item.url,
            app_name: String::new(),
            rating: 0.0,
            rating_count: 0,
            success: false,
            last_error: String::new(),
            stats: Stats {
                collector_id,
                waiting,
                collector: Times::started(waiting.end_at),
            },
        }
    }

    /// 结束抓取阶段并写入抽取结果
    ///
    /// 失败时不保留任何部分字段
    pub fn finish(mut self, outcome: Result<Extraction, ScrapeError>) -> Self {
        self.stats.collector.close(Utc::now());

        match outcome {
            Ok(extraction) => {
                self.app_name = extraction.app_name;
                self.rating = extraction.rating;
                self.rating_count = extraction.rating_count;
                self.success = true;
                self.last_error.clear();
            }
            Err(err) => {
                self.app_name.clear();
                self.rating = 0.0;
                self.rating_count = 0;
                self.success = false;
                self.last_error = err.to_string();
                // an error type with an empty message would break success/last_error exclusivity
                if self.last_error.is_empty() {
                    self.last_error = "unknown extraction error".to_string();
                }
            }
        }

        self
    }
}

/// 工作项在工作池中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    Queued,
    Dispatched,
    Scraped,
    Persisted,
    PersistFailed,
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ItemStage::Queued => write!(f, "queued"),
            ItemStage::Dispatched => write!(f, "dispatched"),
            ItemStage::Scraped => write!(f, "scraped"),
            ItemStage::Persisted => write!(f, "persisted"),
            ItemStage::PersistFailed => write!(f, "persist_failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn extraction() -> Extraction {
        Extraction {
            app_name: "The Legal Channel".to_string(),
            rating: 4.0,
            rating_count: 120,
        }
    }

    #[test]
    fn test_success_clears_error() {
        let item = WorkItem::new("req-1", "https://example.com/details/abc/x");
        let record = ResultRecord::start_collecting(item, 2).finish(Ok(extraction()));

        assert!(record.success);
        assert!(record.last_error.is_empty());
        assert_eq!(record.app_name, "The Legal Channel");
        assert_eq!(record.rating_count, 120);
        assert_eq!(record.stats.collector_id, 2);
    }

    #[test]
    fn test_failure_drops_partial_fields() {
        let item = WorkItem::new("req-2", "https://example.com/details/abc/x");
        let record = ResultRecord::start_collecting(item, 0)
            .finish(Err(ScrapeError::Parse("invalid digit found in string".to_string())));

        assert!(!record.success);
        assert!(record.last_error.contains("invalid digit"));
        assert!(record.app_name.is_empty());
        assert_eq!(record.rating, 0.0);
        assert_eq!(record.rating_count, 0);
    }

    #[test]
    fn test_stage_times_are_ordered() {
        let mut item = WorkItem::new("req-3", "https://example.com");
        item.enqueued_at = Utc::now() - Duration::milliseconds(25);

        let record = ResultRecord::start_collecting(item, 1).finish(Ok(extraction()));
        let stats = record.stats;

        assert!(stats.waiting.end_at >= stats.waiting.start_at);
        assert!(stats.collector.end_at >= stats.collector.start_at);
        assert!(stats.collector.start_at >= stats.waiting.end_at);
        assert!(stats.waiting.duration_ms >= 25);
        assert!(stats.collector.duration_ms >= 0);
    }

    #[test]
    fn test_clock_going_backwards_is_clamped() {
        let start = Utc::now();
        let mut times = Times::started(start);
        times.close(start - Duration::seconds(5));

        assert_eq!(times.end_at, start);
        assert_eq!(times.duration_ms, 0);
    }

    #[test]
    fn test_stage_labels() {
        let labels: Vec<String> = [
            ItemStage::Queued,
            ItemStage::Dispatched,
            ItemStage::Scraped,
            ItemStage::Persisted,
            ItemStage::PersistFailed,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert_eq!(labels, ["queued", "dispatched", "scraped", "persisted", "persist_failed"]);
    }
}

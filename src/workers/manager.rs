// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::repositories::result_sink::ResultSink;
use crate::engines::traits::ScrapeStrategy;
use crate::queue::bridge::{ActiveConsumer, ConsumerReport, QueueConsumer, QueueError};
use crate::workers::pool::{PoolOptions, PoolReport, WorkerPool};

/// 爬虫管理器
///
/// 把队列消费端与工作池连接起来，并负责有序关闭：
/// 消费端先停止，丢弃派发句柄后等待工作池排空
pub struct CrawlerManager {
    consumer: QueueConsumer,
    strategy: Arc<dyn ScrapeStrategy>,
    sink: Arc<dyn ResultSink>,
    options: PoolOptions,
}

/// 一次运行的汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlerReport {
    pub consumer: ConsumerReport,
    pub pool: PoolReport,
}

impl CrawlerManager {
    pub fn new(
        consumer: QueueConsumer,
        strategy: Arc<dyn ScrapeStrategy>,
        sink: Arc<dyn ResultSink>,
        options: PoolOptions,
    ) -> Self {
        Self {
            consumer,
            strategy,
            sink,
            options,
        }
    }

    /// 加入队列组，返回可运行的爬虫
    ///
    /// 单进程模式下先订阅再启动网关，保证不丢失早期消息
    pub async fn subscribe(self) -> Result<SubscribedCrawler, QueueError> {
        let consumer = self.consumer.subscribe().await?;
        Ok(SubscribedCrawler {
            consumer,
            strategy: self.strategy,
            sink: self.sink,
            options: self.options,
        })
    }

    /// 订阅并运行直到取消
    ///
    /// # 参数
    ///
    /// * `cancel` - 关闭信号
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlerReport)` - 工作池排空后的统计
    /// * `Err(QueueError)` - 订阅失败，此时尚未启动工作池
    pub async fn run(self, cancel: CancellationToken) -> Result<CrawlerReport, QueueError> {
        let crawler = self.subscribe().await.inspect_err(|e| error!("Queue subscription failed: {}", e))?;
        Ok(crawler.run(cancel).await)
    }
}

/// 已加入队列组的爬虫
pub struct SubscribedCrawler {
    consumer: ActiveConsumer,
    strategy: Arc<dyn ScrapeStrategy>,
    sink: Arc<dyn ResultSink>,
    options: PoolOptions,
}

impl SubscribedCrawler {
    /// 启动工作池并消费直到取消或订阅关闭，返回前等待工作池排空
    pub async fn run(self, cancel: CancellationToken) -> CrawlerReport {
        let pool = WorkerPool::new(self.strategy, self.sink, self.options, cancel.clone());
        let (dispatcher, completion) = pool.start();

        let consumer = self.consumer.run(dispatcher, cancel).await;

        info!("Waiting for worker pool to drain");
        let pool = completion.wait().await;
        info!(?consumer, ?pool, "Crawler stopped");

        CrawlerReport { consumer, pool }
    }
}

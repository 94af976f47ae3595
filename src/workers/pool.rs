// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::settings::CrawlerSettings;
use crate::domain::models::{ItemStage, ResultRecord, WorkItem};
use crate::domain::repositories::result_sink::ResultSink;
use crate::engines::traits::{ScrapeError, ScrapeStrategy};

/// 派发错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// 派发过程中收到取消信号，工作项被放弃
    #[error("dispatch cancelled")]
    Cancelled,
    /// 工作通道已关闭
    #[error("work channel closed")]
    Closed,
}

/// 工作池参数
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// 工作通道数量
    pub lanes: usize,
    /// 单次抓取超时
    pub scrape_timeout: Duration,
    /// 单次持久化超时
    pub persist_timeout: Duration,
}

impl PoolOptions {
    pub fn from_settings(settings: &CrawlerSettings) -> Self {
        Self {
            lanes: settings.lane_count(),
            scrape_timeout: settings.scrape_timeout(),
            persist_timeout: settings.persist_timeout(),
        }
    }
}

/// 工作池运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// 被工作通道领取的工作项数
    pub dispatched: u64,
    /// 完成抓取（含失败）的工作项数
    pub scraped: u64,
    /// 成功持久化的记录数
    pub persisted: u64,
    /// 持久化失败的记录数
    pub persist_failed: u64,
}

#[derive(Default)]
struct PoolCounters {
    dispatched: AtomicU64,
    scraped: AtomicU64,
    persisted: AtomicU64,
    persist_failed: AtomicU64,
}

impl PoolCounters {
    fn report(&self) -> PoolReport {
        PoolReport {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            scraped: self.scraped.load(Ordering::SeqCst),
            persisted: self.persisted.load(Ordering::SeqCst),
            persist_failed: self.persist_failed.load(Ordering::SeqCst),
        }
    }
}

/// 向工作池提交工作项的句柄
///
/// 所有 `Dispatcher` 被丢弃后工作通道关闭，各工作通道处理完剩余项后退出
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<WorkItem>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// 提交一个工作项
    ///
    /// 等待空闲工作通道领取，期间与取消信号竞争；取消时工作项被放弃
    ///
    /// # 参数
    ///
    /// * `item` - 工作项
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 已交给工作通道
    /// * `Err(DispatchError)` - 已取消或工作池已关闭
    pub async fn dispatch(&self, item: WorkItem) -> Result<(), DispatchError> {
        if self.cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DispatchError::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| DispatchError::Closed),
        }
    }
}

/// 工作池完成句柄
///
/// `wait` 在所有工作通道和汇聚任务退出后返回
pub struct PoolCompletion {
    tasks: JoinSet<()>,
    counters: Arc<PoolCounters>,
}

impl PoolCompletion {
    pub async fn wait(mut self) -> PoolReport {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!("Worker pool task failed: {}", e);
            }
        }

        let report = self.counters.report();
        info!(?report, "Worker pool drained");
        report
    }
}

/// 扇出/扇入工作池
///
/// N 个工作通道共享一个容量为 1 的工作通道，每个工作通道有独立的输出通道，
/// 由对应的汇聚任务写入持久化层
pub struct WorkerPool {
    strategy: Arc<dyn ScrapeStrategy>,
    sink: Arc<dyn ResultSink>,
    options: PoolOptions,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        strategy: Arc<dyn ScrapeStrategy>,
        sink: Arc<dyn ResultSink>,
        options: PoolOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            strategy,
            sink,
            options,
            cancel,
        }
    }

    /// 启动工作池
    ///
    /// # 返回值
    ///
    /// 返回派发句柄与完成句柄
    pub fn start(self) -> (Dispatcher, PoolCompletion) {
        let lanes = self.options.lanes.max(1);
        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(1);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let counters = Arc::new(PoolCounters::default());
        let mut tasks = JoinSet::new();

        for lane_id in 0..lanes {
            let (out_tx, out_rx) = mpsc::channel::<ResultRecord>(1);

            let lane = Lane {
                id: lane_id,
                strategy: self.strategy.clone(),
                scrape_timeout: self.options.scrape_timeout,
                cancel: self.cancel.clone(),
                counters: counters.clone(),
            };
            tasks.spawn(lane.run(work_rx.clone(), out_tx));

            let fan_in = FanIn {
                lane_id,
                sink: self.sink.clone(),
                persist_timeout: self.options.persist_timeout,
                counters: counters.clone(),
            };
            tasks.spawn(fan_in.run(out_rx));
        }

        info!(lanes, strategy = self.strategy.name(), "Worker pool started");

        let dispatcher = Dispatcher {
            tx: work_tx,
            cancel: self.cancel,
        };

        (dispatcher, PoolCompletion { tasks, counters })
    }
}

struct Lane {
    id: usize,
    strategy: Arc<dyn ScrapeStrategy>,
    scrape_timeout: Duration,
    cancel: CancellationToken,
    counters: Arc<PoolCounters>,
}

impl Lane {
    async fn run(self, work_rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>, out_tx: mpsc::Sender<ResultRecord>) {
        debug!(lane = self.id, "Lane started");

        loop {
            let next = {
                let mut rx = work_rx.lock().await;
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        // Stop accepting new items and drain what is already buffered
                        rx.close();
                        rx.recv().await
                    }
                    item = rx.recv() => item,
                }
            };

            let Some(item) = next else {
                break;
            };

            self.counters.dispatched.fetch_add(1, Ordering::SeqCst);
            let record = self.process(item).await;

            if out_tx.send(record).await.is_err() {
                warn!(lane = self.id, "Output channel closed, lane exiting");
                break;
            }
        }

        debug!(lane = self.id, "Lane stopped");
    }

    #[instrument(skip_all, fields(lane = self.id, request_id = %item.request_id, url = %item.url))]
    async fn process(&self, item: WorkItem) -> ResultRecord {
        let record = ResultRecord::start_collecting(item, self.id);
        debug!(stage = %ItemStage::Dispatched, waiting_ms = record.stats.waiting.duration_ms, "Item claimed");

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScrapeError::Cancelled),
            result = tokio::time::timeout(self.scrape_timeout, self.strategy.extract(&record.url)) => {
                result.unwrap_or(Err(ScrapeError::Timeout(self.scrape_timeout)))
            }
        };

        let record = record.finish(outcome);
        self.counters.scraped.fetch_add(1, Ordering::SeqCst);

        let outcome_label = if record.success { "success" } else { "failure" };
        counter!("ratingcrawl_items_total", "outcome" => outcome_label).increment(1);
        histogram!("ratingcrawl_waiting_duration_ms").record(record.stats.waiting.duration_ms as f64);
        histogram!("ratingcrawl_collector_duration_ms").record(record.stats.collector.duration_ms as f64);

        if record.success {
            debug!(
                stage = %ItemStage::Scraped,
                collector_ms = record.stats.collector.duration_ms,
                app_name = %record.app_name,
                rating = record.rating,
                "Item scraped"
            );
        } else {
            warn!(stage = %ItemStage::Scraped, error = %record.last_error, "Extraction failed");
        }

        record
    }
}

struct FanIn {
    lane_id: usize,
    sink: Arc<dyn ResultSink>,
    persist_timeout: Duration,
    counters: Arc<PoolCounters>,
}

impl FanIn {
    async fn run(self, mut out_rx: mpsc::Receiver<ResultRecord>) {
        while let Some(record) = out_rx.recv().await {
            // Not raced against cancel; bounded by the persist timeout only
            match tokio::time::timeout(self.persist_timeout, self.sink.insert(&record)).await {
                Ok(Ok(())) => {
                    self.counters.persisted.fetch_add(1, Ordering::SeqCst);
                    debug!(lane = self.lane_id, request_id = %record.request_id, stage = %ItemStage::Persisted, "Record persisted");
                }
                Ok(Err(e)) => self.persist_failed(&record, &e.to_string()),
                Err(_) => self.persist_failed(&record, "persist timed out"),
            }
        }

        debug!(lane = self.lane_id, "Fan-in reader stopped");
    }

    fn persist_failed(&self, record: &ResultRecord, reason: &str) {
        self.counters.persist_failed.fetch_add(1, Ordering::SeqCst);
        counter!("ratingcrawl_persist_failures_total").increment(1);
        error!(
            lane = self.lane_id,
            request_id = %record.request_id,
            url = %record.url,
            stage = %ItemStage::PersistFailed,
            "Failed to persist record: {}",
            reason
        );
    }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod tests;

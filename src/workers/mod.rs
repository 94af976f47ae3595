// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供扇出/扇入工作池以及连接队列消费端的爬虫管理器
pub mod manager;
pub mod pool;

pub use manager::{CrawlerManager, CrawlerReport, SubscribedCrawler};
pub use pool::{DispatchError, Dispatcher, PoolCompletion, PoolOptions, PoolReport, WorkerPool};

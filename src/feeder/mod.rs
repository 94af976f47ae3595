// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// CSV 投递模块
///
/// 读取 CSV 文件中的URL并逐个提交给准入网关
pub mod csv_reader;
pub mod sender;

use thiserror::Error;

pub use sender::{FeedReport, Feeder, GatewayClient};

/// 投递错误
#[derive(Error, Debug)]
pub enum FeedError {
    /// 文件读取失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV 解析失败
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// 网关地址无效
    #[error("Invalid gateway endpoint: {0}")]
    InvalidEndpoint(String),
    /// 传输失败
    #[error("Error sending URL to the gateway: {0}")]
    Transport(#[from] reqwest::Error),
    /// 网关返回错误状态码
    #[error("Gateway rejected request with status {0}: {1}")]
    Rejected(u16, String),
    /// 网关不可用
    #[error("The gateway is not available to process requests")]
    Unavailable,
    /// 读取任务异常退出
    #[error("Reader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

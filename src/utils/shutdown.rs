// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 创建进程级取消令牌
///
/// 收到 Ctrl+C 时取消令牌，所有持有该令牌的组件（网关发布、队列消费、工作通道）随之停止
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        trigger.cancel();
    });

    token
}

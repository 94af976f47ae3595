// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod bridge;
pub mod broker;
pub mod codec;
pub mod memory_broker;
pub mod redis_broker;

use std::sync::Arc;

use crate::config::settings::BrokerSettings;
use broker::{BrokerError, MessageBroker};
use memory_broker::MemoryBroker;
use redis_broker::RedisBroker;

/// 根据配置连接消息代理
pub async fn connect_broker(settings: &BrokerSettings) -> Result<Arc<dyn MessageBroker>, BrokerError> {
    if settings.is_memory() {
        tracing::warn!("Using in-process broker; messages do not leave this process");
        return Ok(Arc::new(MemoryBroker::new()));
    }

    Ok(Arc::new(RedisBroker::connect(settings).await?))
}

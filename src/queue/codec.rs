// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::WorkItem;

/// 编解码错误
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode queue message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode queue message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Queue message is missing {0}")]
    MissingField(&'static str),
}

/// 队列消息
///
/// 网关发布、爬虫消费的线上格式，编码为紧凑 JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub request_id: String,
    pub url: String,
}

impl QueueMessage {
    pub fn new(request_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            url: url.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// 解码消息，空的请求ID或URL视为格式错误
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let message: QueueMessage = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
        if message.request_id.is_empty() {
            return Err(CodecError::MissingField("request_id"));
        }
        if message.url.is_empty() {
            return Err(CodecError::MissingField("url"));
        }
        Ok(message)
    }

    /// 转换为工作项，入队时间取当前时刻
    pub fn into_work_item(self) -> WorkItem {
        WorkItem::new(self.request_id, self.url)
    }
}

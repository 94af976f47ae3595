// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 抓取准入请求
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ProcessUrlRequest {
    /// 请求ID，缺省时由网关生成
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// 目标页面URL，必须是绝对 http(s) 地址
    #[validate(url)]
    pub url: String,
}

impl ProcessUrlRequest {
    pub fn new(request_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            url: url.into(),
        }
    }
}

// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 抓取错误类型
///
/// 错误消息会原样写入结果记录的 `last_error` 字段
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// 页面导航失败
    #[error("navigation failed: {0}")]
    Navigation(String),
    /// 等待页面标记失败
    #[error("wait for {0} failed")]
    Wait(String),
    /// 字段解析失败
    #[error("parse failed: {0}")]
    Parse(String),
    /// 请求失败
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// 非 200 响应
    #[error("unexpected status code: {0}")]
    Status(u16),
    /// 响应体不符合预期结构
    #[error("unexpected response body: {0}")]
    Schema(String),
    /// URL 无法映射为抓取目标
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// 超时
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// 被取消
    #[error("operation cancelled")]
    Cancelled,
    /// 浏览器连接或会话错误
    #[error("browser error: {0}")]
    Browser(String),
}

/// 抽取结果
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// 应用名称
    pub app_name: String,
    /// 评分（0.0 - 5.0，两位小数）
    pub rating: f64,
    /// 评分人数
    pub rating_count: u32,
}

/// 保留两位小数
pub fn round_rating(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 抓取策略特质
///
/// 每次调用相互独立，实现内部不得在调用之间保留可变状态（共享连接除外）
#[async_trait]
pub trait ScrapeStrategy: Send + Sync {
    /// 从给定URL抽取应用名称与评分
    ///
    /// # 参数
    ///
    /// * `url` - 目标页面的绝对URL
    ///
    /// # 返回值
    ///
    /// * `Ok(Extraction)` - 抽取到的字段
    /// * `Err(ScrapeError)` - 失败原因
    async fn extract(&self, url: &str) -> Result<Extraction, ScrapeError>;

    /// 策略名称
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: ScrapeStrategy + ?Sized> ScrapeStrategy for Arc<T> {
    async fn extract(&self, url: &str) -> Result<Extraction, ScrapeError> {
        (**self).extract(url).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_rating() {
        assert_eq!(round_rating(80.0 * 5.0 / 100.0), 4.0);
        assert_eq!(round_rating(3.14159), 3.14);
        assert_eq!(round_rating(93.0 * 5.0 / 100.0), 4.65);
    }

    #[test]
    fn test_cancelled_message() {
        assert_eq!(ScrapeError::Cancelled.to_string(), "operation cancelled");
    }
}

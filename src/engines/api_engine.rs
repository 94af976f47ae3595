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

use crate::engines::traits::{round_rating, Extraction, ScrapeError, ScrapeStrategy};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const DETAILS_SEGMENT: &str = "details";

/// 频道详情接口的响应结构
#[derive(Debug, Deserialize)]
pub struct DetailsUnionResponse {
    #[serde(rename = "feedChannel")]
    pub feed_channel: FeedChannel,
}

/// 频道信息
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedChannel {
    pub name: String,
    /// 百分制评分
    pub star_rating: f64,
    pub star_rating_count: Option<f64>,
}

impl From<FeedChannel> for Extraction {
    fn from(channel: FeedChannel) -> Self {
        let rating_count = channel
            .star_rating_count
            .map(|count| count.max(0.0).min(u32::MAX as f64) as u32)
            .unwrap_or(0);

        Extraction {
            app_name: channel.name,
            rating: round_rating(channel.star_rating * 5.0 / 100.0),
            rating_count,
        }
    }
}

/// 将频道页面URL映射为详情接口地址
///
/// 支持两种路径形式：
/// - `/details/<id>/<slug>`
/// - `/<lang>-<country>/details/<id>/<slug>`，附加 `country` 与 `language` 查询参数
///
/// # 参数
///
/// * `page_url` - 频道页面URL
///
/// # 返回值
///
/// * `Ok(Url)` - 详情接口地址，协议、主机与端口沿用输入URL
/// * `Err(ScrapeError)` - 路径形式不受支持
pub fn build_endpoint(page_url: &str) -> Result<Url, ScrapeError> {
    let parsed = Url::parse(page_url).map_err(|e| ScrapeError::InvalidUrl(format!("{}: {}", page_url, e)))?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let (channel_id, locale) = match segments.as_slice() {
        [DETAILS_SEGMENT, id, _slug] => (*id, None),
        [locale, DETAILS_SEGMENT, id, _slug] => {
            let (language, country) = locale
                .split_once('-')
                .filter(|(l, c)| !l.is_empty() && !c.is_empty())
                .ok_or_else(|| ScrapeError::InvalidUrl(format!("unsupported locale segment: {}", locale)))?;
            (*id, Some((language, country)))
        }
        _ => {
            return Err(ScrapeError::InvalidUrl(format!(
                "unsupported path shape: {}",
                parsed.path()
            )))
        }
    };

    let mut endpoint = parsed.clone();
    endpoint.set_path(&format!("/api/v6/channels/detailsunion/{}", channel_id));
    endpoint.set_query(None);
    endpoint.set_fragment(None);

    if let Some((language, country)) = locale {
        endpoint
            .query_pairs_mut()
            .append_pair("country", country)
            .append_pair("language", language);
    }

    Ok(endpoint)
}

/// API 抓取策略
///
/// 直接调用频道详情接口，不经过浏览器
pub struct ApiEngine {
    client: reqwest::Client,
}

impl ApiEngine {
    /// 创建 API 抓取策略
    ///
    /// # 参数
    ///
    /// * `timeout` - 单次请求超时时间
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ratingcrawl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ScrapeStrategy for ApiEngine {
    async fn extract(&self, url: &str) -> Result<Extraction, ScrapeError> {
        let endpoint = build_endpoint(url)?;
        tracing::debug!(%endpoint, "Requesting channel details");

        let response = self.client.get(endpoint).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ScrapeError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let details: DetailsUnionResponse =
            serde_json::from_slice(&body).map_err(|e| ScrapeError::Schema(e.to_string()))?;

        Ok(details.feed_channel.into())
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

#[cfg(test)]
#[path = "api_engine_test.rs"]
mod tests;

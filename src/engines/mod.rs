// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod api_engine;
pub mod browser_engine;
pub mod traits;

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::config::settings::CrawlerSettings;
use api_engine::ApiEngine;
use browser_engine::BrowserEngine;
use traits::{ScrapeError, ScrapeStrategy};

/// 抓取策略类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// 浏览器渲染后读取页面节点
    Browser,
    /// 直接调用详情接口
    Api,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrategyKind::Browser => write!(f, "browser"),
            StrategyKind::Api => write!(f, "api"),
        }
    }
}

/// 根据配置构建抓取策略
///
/// 策略在启动时选定，工作池内部只依赖特质对象
pub fn build_strategy(settings: &CrawlerSettings) -> Result<Arc<dyn ScrapeStrategy>, ScrapeError> {
    let strategy: Arc<dyn ScrapeStrategy> = match settings.strategy {
        StrategyKind::Browser => Arc::new(BrowserEngine::new(
            settings.browser_endpoint.clone(),
            settings.wait_timeout(),
        )),
        StrategyKind::Api => Arc::new(ApiEngine::new(settings.scrape_timeout())?),
    };

    tracing::info!(strategy = strategy.name(), "Scrape strategy selected");
    Ok(strategy)
}

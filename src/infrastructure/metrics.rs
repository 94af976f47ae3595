// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::describe_counter;
use metrics::describe_histogram;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;

/// 安装 Prometheus 导出器
///
/// 未启用时直接返回，`metrics` 宏在没有记录器时是空操作
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        return;
    }

    let addr: SocketAddr = match settings.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics listen address {}: {}", settings.listen, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!("ratingcrawl_admission_total", "Admission decisions by status");
    describe_counter!("ratingcrawl_items_total", "Scraped items by outcome");
    describe_counter!("ratingcrawl_persist_failures_total", "Records that could not be persisted");
    describe_histogram!("ratingcrawl_waiting_duration_ms", "Time an item waited for a free lane");
    describe_histogram!("ratingcrawl_collector_duration_ms", "Time spent extracting an item");

    info!("Metrics exporter listening on {}", addr);
}

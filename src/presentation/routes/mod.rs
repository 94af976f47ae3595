// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::usecases::process_url::AdmissionGateway;
use crate::domain::services::admission_service::KillSwitchPolicy;
use crate::presentation::handlers::{admin_handler, process_url_handler};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// # 参数
///
/// * `gateway` - 准入网关
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(gateway: Arc<AdmissionGateway>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let rpc_routes = Router::new()
        .route("/v1/process-url", post(process_url_handler::process_url))
        .layer(Extension(gateway));

    Router::new()
        .merge(public_routes)
        .merge(rpc_routes)
        .layer(TraceLayer::new_for_http())
}

/// 运维路由：读取与切换准入开关
pub fn admin_routes(kill_switch: Arc<KillSwitchPolicy>) -> Router {
    Router::new()
        .route(
            "/v1/admin/availability",
            get(admin_handler::get_availability).put(admin_handler::set_availability),
        )
        .layer(Extension(kill_switch))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;

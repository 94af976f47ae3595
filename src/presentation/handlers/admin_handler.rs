// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::{Extension, Json};
use std::sync::Arc;
use tracing::warn;

use crate::application::dto::availability::Availability;
use crate::domain::services::admission_service::KillSwitchPolicy;

/// 查询准入开关
pub async fn get_availability(Extension(kill_switch): Extension<Arc<KillSwitchPolicy>>) -> Json<Availability> {
    Json(Availability {
        unavailable: kill_switch.is_unavailable(),
    })
}

/// 设置准入开关
///
/// 打开后网关对所有请求返回 UNAVAILABLE，关闭后恢复正常准入
pub async fn set_availability(
    Extension(kill_switch): Extension<Arc<KillSwitchPolicy>>,
    Json(payload): Json<Availability>,
) -> Json<Availability> {
    kill_switch.set_unavailable(payload.unavailable);
    warn!(unavailable = payload.unavailable, "Kill switch updated");
    Json(payload)
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::{Extension, Json};
use std::sync::Arc;

use crate::application::dto::process_url_request::ProcessUrlRequest;
use crate::application::dto::process_url_response::ProcessUrlResponse;
use crate::application::usecases::process_url::AdmissionGateway;
use crate::presentation::errors::AppError;

/// 抓取准入端点
///
/// 返回 200 与 ACCEPTED / RETRY / UNAVAILABLE 之一；请求格式错误、发布失败等以 HTTP 错误返回
pub async fn process_url(
    Extension(gateway): Extension<Arc<AdmissionGateway>>,
    Json(payload): Json<ProcessUrlRequest>,
) -> Result<Json<ProcessUrlResponse>, AppError> {
    let response = gateway.process_url(payload).await?;
    Ok(Json(response))
}

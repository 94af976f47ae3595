// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::domain::services::admission_service::AdmissionStatus;

/// 抓取准入响应
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProcessUrlResponse {
    pub request_id: String,
    pub status: AdmissionStatus,
}

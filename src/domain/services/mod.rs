// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含准入控制策略：随机拒绝、令牌桶限流、运维开关及其组合
pub mod admission_service;

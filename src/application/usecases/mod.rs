// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用用例模块
///
/// 准入网关：校验请求、执行准入策略并发布已接受的请求
pub mod process_url;

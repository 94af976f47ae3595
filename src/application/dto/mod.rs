// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据传输对象模块
///
/// 定义网关 RPC 的请求与响应结构，投递器也复用这些结构
pub mod availability;
pub mod process_url_request;
pub mod process_url_response;

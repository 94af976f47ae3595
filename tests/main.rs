// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 测试主模块
///
/// 集成测试串联网关、内存代理、消费端、工作池和持久化层；
/// 单元测试覆盖只能从 crate 外部验证的行为
mod integration;

// === Unit Tests ===
mod unit;

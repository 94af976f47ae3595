// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含准入用例、传输对象以及各运行模式的启动流程
pub mod commands;
pub mod dto;
pub mod usecases;

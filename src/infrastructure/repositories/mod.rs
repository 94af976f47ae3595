// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供结果存储接口的数据库实现与内存实现
pub mod memory_sink;
pub mod url_info_repo_impl;

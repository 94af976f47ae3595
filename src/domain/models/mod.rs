// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体：
/// - 工作项（WorkItem）：从网关流向工作池的请求单元
/// - 抓取结果（ResultRecord）：工作池输出、持久化层输入，附带各阶段耗时
pub mod url_info;

pub use url_info::{ItemStage, ResultRecord, Stats, Times, WorkItem};

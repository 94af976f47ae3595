// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含准入用例和各运行模式的启动流程
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含结果记录、准入策略和持久化接口
pub mod domain;

/// 引擎模块
///
/// 实现浏览器与接口两种抓取策略
pub mod engines;

/// 投递模块
///
/// 读取 CSV 文件并把URL提交给网关
pub mod feeder;

/// 基础设施模块
///
/// 提供数据库、指标导出和持久化实现
pub mod infrastructure;

/// 表示层模块
///
/// 处理 HTTP RPC 请求和响应
pub mod presentation;

/// 队列模块
///
/// 消息代理抽象、编解码以及发布/消费桥接
pub mod queue;

/// 工具模块
pub mod utils;

/// 工作器模块
///
/// 扇出/扇入工作池与爬虫管理
pub mod workers;

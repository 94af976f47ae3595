// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::ResultRecord;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use std::sync::Arc;

/// 结果写入特质
///
/// 实现方自行负责并发安全（例如连接池），工作池不对写入加锁
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 写入一条完成的抓取结果
    async fn insert(&self, record: &ResultRecord) -> Result<(), RepositoryError>;
}

#[async_trait]
impl<T: ResultSink + ?Sized> ResultSink for Arc<T> {
    async fn insert(&self, record: &ResultRecord) -> Result<(), RepositoryError> {
        (**self).insert(record).await
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::models::ResultRecord;
use crate::domain::repositories::result_sink::ResultSink;
use crate::utils::errors::RepositoryError;

/// 内存结果存储
///
/// 用于试运行和测试，可模拟写入失败
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
    fail: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入记录的快照
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// 让后续写入全部失败
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn insert(&self, record: &ResultRecord) -> Result<(), RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseError("sink unavailable".to_string()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

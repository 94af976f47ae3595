// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::ResultRecord;
use crate::domain::repositories::result_sink::ResultSink;
use crate::infrastructure::database::entities::url_info as url_info_entity;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use sea_orm::*;
use std::sync::Arc;

/// 抓取结果仓库实现
///
/// 只追加写入，`created_at` 由数据库生成
pub struct UrlInfoRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl UrlInfoRepositoryImpl {
    /// 创建新的抓取结果仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 按请求ID查询记录，按写入顺序返回
    pub async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Vec<url_info_entity::Model>, RepositoryError> {
        let models = url_info_entity::Entity::find()
            .filter(url_info_entity::Column::RequestId.eq(request_id))
            .order_by_asc(url_info_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(models)
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(url_info_entity::Entity::find().count(self.db.as_ref()).await?)
    }
}

#[async_trait]
impl ResultSink for UrlInfoRepositoryImpl {
    async fn insert(&self, record: &ResultRecord) -> Result<(), RepositoryError> {
        let active_model = url_info_entity::ActiveModel {
            request_id: Set(record.request_id.clone()),
            url: Set(record.url.clone()),
            app_name: Set(record.app_name.clone()),
            rating: Set(record.rating),
            rating_count: Set(i64::from(record.rating_count)),
            success: Set(record.success),
            last_error: Set(record.last_error.clone()),
            stats: Set(serde_json::to_value(record.stats)?),
            ..Default::default()
        };

        url_info_entity::Entity::insert(active_model)
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }
}

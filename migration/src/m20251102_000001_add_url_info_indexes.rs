// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

use crate::m20251101_000001_create_url_info::UrlInfo;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // request_id is not unique: at-least-once delivery may persist the same attempt twice
        manager
            .create_index(
                Index::create()
                    .name("idx_url_info_request_id")
                    .table(UrlInfo::Table)
                    .col(UrlInfo::RequestId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_url_info_created_at")
                    .table(UrlInfo::Table)
                    .col(UrlInfo::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_url_info_created_at")
                    .table(UrlInfo::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_url_info_request_id")
                    .table(UrlInfo::Table)
                    .to_owned(),
            )
            .await
    }
}

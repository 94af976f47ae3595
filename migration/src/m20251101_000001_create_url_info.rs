// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 创建抓取结果表 url_info
///
/// 每条记录对应一次完成的抓取尝试，只追加写入
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UrlInfo::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UrlInfo::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UrlInfo::RequestId).string().not_null())
                    .col(ColumnDef::new(UrlInfo::Url).text().not_null())
                    .col(
                        ColumnDef::new(UrlInfo::AppName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(UrlInfo::Rating)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(UrlInfo::RatingCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UrlInfo::Success).boolean().not_null())
                    .col(
                        ColumnDef::new(UrlInfo::LastError)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(UrlInfo::Stats).json().not_null())
                    .col(
                        ColumnDef::new(UrlInfo::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UrlInfo::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum UrlInfo {
    Table,
    Id,
    RequestId,
    Url,
    AppName,
    Rating,
    RatingCount,
    Success,
    LastError,
    Stats,
    CreatedAt,
}

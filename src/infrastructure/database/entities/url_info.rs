// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "url_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub request_id: String,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub app_name: String,
    #[sea_orm(column_type = "Double")]
    pub rating: f64,
    pub rating_count: i64,
    pub success: bool,
    #[sea_orm(column_type = "Text")]
    pub last_error: String,
    pub stats: Json,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Converted imagery catalog entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "imagery")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub original_name: String,
    pub base_name: String,
    pub cog_name: String,
    pub width: i32,
    pub height: i32,
    pub band_count: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub projection: Option<String>,
    pub storage_path: String,
    pub sequence: i32,
    pub file_size: i64,
    pub created_at: i64,      // Unix seconds
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

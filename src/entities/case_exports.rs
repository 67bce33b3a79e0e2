use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "case_exports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub file_name: String,
    /// Relative to `bulk.exports_root`
    pub file_path: String,
    pub export_date: Date,
    /// "text", "xml", "html" or "metadata"
    pub body_format: String,
    /// "jurisdiction" or "reporter"
    pub filter_type: String,
    pub filter_slug: String,
    pub public: bool,
    pub owner_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

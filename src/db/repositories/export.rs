use anyhow::{Context, Result};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::entities::case_exports;

pub use crate::entities::case_exports::Model as CaseExport;

#[derive(Debug, Clone)]
pub struct NewCaseExport {
    pub file_name: String,
    pub file_path: String,
    pub export_date: NaiveDate,
    pub body_format: String,
    pub filter_type: String,
    pub filter_slug: String,
    pub public: bool,
    pub owner_id: Option<i32>,
}

pub struct ExportRepository {
    conn: DatabaseConnection,
}

impl ExportRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<CaseExport>> {
        case_exports::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query case export")
    }

    pub async fn list_all(&self) -> Result<Vec<CaseExport>> {
        case_exports::Entity::find()
            .order_by_asc(case_exports::Column::FilterType)
            .order_by_asc(case_exports::Column::FilterSlug)
            .order_by_desc(case_exports::Column::ExportDate)
            .all(&self.conn)
            .await
            .context("Failed to list case exports")
    }

    pub async fn add(&self, export: NewCaseExport) -> Result<CaseExport> {
        let active = case_exports::ActiveModel {
            file_name: Set(export.file_name),
            file_path: Set(export.file_path),
            export_date: Set(export.export_date),
            body_format: Set(export.body_format),
            filter_type: Set(export.filter_type),
            filter_slug: Set(export.filter_slug),
            public: Set(export.public),
            owner_id: Set(export.owner_id),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert case export")
    }
}

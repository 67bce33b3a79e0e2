use crate::entities::{case_exports, prelude::*};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(CaseExports)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Cases)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Listing filters on visibility first
        manager
            .create_index(
                Index::create()
                    .name("idx_case_exports_public")
                    .table(CaseExports)
                    .col(case_exports::Column::Public)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Cases).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CaseExports).to_owned())
            .await?;

        Ok(())
    }
}

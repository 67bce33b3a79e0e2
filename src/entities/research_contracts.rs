use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "research_contracts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub institution: String,
    pub title: String,
    pub area_of_interest: String,
    /// "pending", "approved" or "denied"
    pub status: String,
    pub approver_id: Option<i32>,
    pub approver_signature_date: Option<DateTimeUtc>,
    pub approver_notes: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub contract_html: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

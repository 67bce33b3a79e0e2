use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Address as entered at registration
    #[sea_orm(unique)]
    pub email: String,

    /// Canonical form used for uniqueness checks (lowercase, sub-address stripped)
    #[sea_orm(unique)]
    pub normalized_email: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub email_verified: bool,

    pub agreed_to_tos: bool,

    /// Verification token embedded in the emailed link
    pub activation_nonce: Option<String>,

    pub nonce_expires: Option<DateTimeUtc>,

    pub total_case_allowance: i32,

    pub case_allowance_remaining: i32,

    pub case_allowance_last_updated: DateTimeUtc,

    pub unlimited_access: bool,

    pub unlimited_access_until: Option<DateTimeUtc>,

    pub harvard_access: bool,

    pub is_contract_approver: bool,

    pub deactivated_by_user: bool,

    pub deactivated_date: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

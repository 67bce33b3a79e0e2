pub use super::api_tokens::Entity as ApiTokens;
pub use super::case_exports::Entity as CaseExports;
pub use super::cases::Entity as Cases;
pub use super::email_blocklist::Entity as EmailBlocklist;
pub use super::harvard_contracts::Entity as HarvardContracts;
pub use super::research_contracts::Entity as ResearchContracts;
pub use super::users::Entity as Users;

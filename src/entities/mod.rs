pub mod prelude;

pub mod api_tokens;
pub mod case_exports;
pub mod cases;
pub mod email_blocklist;
pub mod harvard_contracts;
pub mod research_contracts;
pub mod users;

mod blocklist;
mod contract;
mod export;
mod init;
mod user;

pub use blocklist::{cmd_blocklist_add, cmd_blocklist_list, cmd_blocklist_remove};
pub use contract::{cmd_contract_list, cmd_contract_reset};
pub use export::{cmd_export_add, cmd_export_list};
pub use init::cmd_init;
pub use user::{cmd_user_approver, cmd_user_create};

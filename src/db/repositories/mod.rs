pub mod blocklist;
pub mod case;
pub mod contract;
pub mod export;
pub mod token;
pub mod user;

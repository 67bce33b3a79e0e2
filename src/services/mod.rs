pub mod access_service;
pub mod access_service_impl;
pub use access_service::{AccessError, AccessService, AuthorizedExport, CaseBody, CaseView};
pub use access_service_impl::SeaOrmAccessService;

pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountError, AccountService, RegistrationInput};
pub use account_service_impl::SeaOrmAccountService;

pub mod research_service;
pub mod research_service_impl;
pub use research_service::{
    ContractReview, HarvardRequestInput, ResearchError, ResearchRequestInput, ResearchService,
};
pub use research_service_impl::SeaOrmResearchService;

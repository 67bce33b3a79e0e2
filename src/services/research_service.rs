//! Domain service for research access agreements.

use thiserror::Error;

use crate::db::{HarvardContract, ResearchContract, User};
use crate::domain::ContractDecision;
use crate::domain::forms::FormErrors;

pub const MSG_NOT_HARVARD: &str = "You are not currently using a harvard.edu email address. \
     Please update your account email, or apply for research access through the general research request form.";

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Account email is not a Harvard address")]
    NotHarvard,

    #[error("Validation failed: {0:?}")]
    Validation(FormErrors),

    #[error("Only contract approvers may review research requests")]
    NotApprover,

    #[error("Research contract {0} not found")]
    ContractNotFound(i32),

    #[error("Research contract already {0}")]
    AlreadyDecided(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ResearchError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct HarvardRequestInput {
    pub name: String,
    pub title: String,
    pub area_of_interest: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResearchRequestInput {
    pub name: String,
    pub institution: String,
    pub title: String,
    pub area_of_interest: String,
}

/// A contract together with the account that requested it.
#[derive(Debug, Clone)]
pub struct ContractReview {
    pub contract: ResearchContract,
    pub requester: User,
}

#[async_trait::async_trait]
pub trait ResearchService: Send + Sync {
    /// True when the user's email is on the Harvard domain.
    async fn is_harvard_user(&self, user: &User) -> bool;

    /// Records a signed Harvard agreement and grants Harvard access.
    async fn submit_harvard_request(
        &self,
        user: &User,
        input: HarvardRequestInput,
    ) -> Result<HarvardContract, ResearchError>;

    /// Records a pending contract and asks the approvers to review it.
    async fn submit_research_request(
        &self,
        user: &User,
        input: ResearchRequestInput,
    ) -> Result<ResearchContract, ResearchError>;

    /// Loads a contract for an approver.
    async fn review(&self, approver: &User, contract_id: i32)
    -> Result<ContractReview, ResearchError>;

    /// Approves or denies a pending contract and notifies the requester.
    ///
    /// # Errors
    ///
    /// [`ResearchError::AlreadyDecided`] if the contract is not pending.
    async fn decide(
        &self,
        approver: &User,
        contract_id: i32,
        decision: ContractDecision,
        notes: Option<String>,
    ) -> Result<ContractReview, ResearchError>;
}

//! Domain rules for accounts and research access.
//!
//! Everything in here is pure: no database, no clock reads. Callers pass in
//! the current time so the rules can be tested directly.

pub mod access;
pub mod email;
pub mod forms;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a research contract.
///
/// A contract starts `Pending` and is decided exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl ContractStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    /// Returns true if an approver may still act on the contract.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            other => Err(format!("unknown contract status: {other}")),
        }
    }
}

/// Decision an approver posts for a pending contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractDecision {
    Approve,
    Deny,
}

impl ContractDecision {
    /// Status the contract moves to once this decision is applied.
    #[must_use]
    pub const fn resulting_status(self) -> ContractStatus {
        match self {
            Self::Approve => ContractStatus::Approved,
            Self::Deny => ContractStatus::Denied,
        }
    }

    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Approve => "approved",
            Self::Deny => "denied",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_status_round_trips_through_str() {
        for status in [
            ContractStatus::Pending,
            ContractStatus::Approved,
            ContractStatus::Denied,
        ] {
            assert_eq!(status.as_str().parse::<ContractStatus>(), Ok(status));
        }
        assert!("revoked".parse::<ContractStatus>().is_err());
    }

    #[test]
    fn only_pending_is_actionable() {
        assert!(ContractStatus::Pending.is_pending());
        assert!(!ContractStatus::Approved.is_pending());
        assert!(!ContractStatus::Denied.is_pending());
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(
            ContractDecision::Approve.resulting_status(),
            ContractStatus::Approved
        );
        assert_eq!(
            ContractDecision::Deny.resulting_status(),
            ContractStatus::Denied
        );
        assert_eq!(ContractDecision::Deny.past_tense(), "denied");
    }
}

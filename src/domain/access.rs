//! Access gate for restricted content and bulk exports.

use chrono::{DateTime, Duration, Utc};

/// The parts of a user record that access decisions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessProfile {
    pub user_id: i32,
    pub email_verified: bool,
    pub unlimited_access: bool,
    pub unlimited_access_until: Option<DateTime<Utc>>,
    pub total_case_allowance: i32,
    pub case_allowance_remaining: i32,
    pub case_allowance_last_updated: DateTime<Utc>,
}

impl AccessProfile {
    /// Unlimited access is in effect while the flag is set and the expiry,
    /// if any, lies in the future.
    #[must_use]
    pub fn unlimited_access_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.unlimited_access && self.unlimited_access_until.is_none_or(|until| until > now)
    }

    /// Allowance left today, counting a pending daily reset.
    #[must_use]
    pub fn effective_allowance_remaining(&self, now: DateTime<Utc>) -> i32 {
        if now - self.case_allowance_last_updated >= Duration::hours(24) {
            self.total_case_allowance
        } else {
            self.case_allowance_remaining
        }
    }
}

/// Outcome of a bulk export download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportAccess {
    Allowed,
    /// No credentials were presented (401).
    AuthenticationRequired,
    /// Credentials were presented but do not grant access (403).
    Forbidden,
}

/// Decides whether `viewer` may download an export.
///
/// Public exports are open to everyone. Private exports need the owner or a
/// viewer with unlimited access in effect.
#[must_use]
pub fn export_access(
    viewer: Option<&AccessProfile>,
    export_public: bool,
    export_owner_id: Option<i32>,
    now: DateTime<Utc>,
) -> ExportAccess {
    if export_public {
        return ExportAccess::Allowed;
    }

    let Some(viewer) = viewer else {
        return ExportAccess::AuthenticationRequired;
    };

    if export_owner_id == Some(viewer.user_id) || viewer.unlimited_access_in_effect(now) {
        ExportAccess::Allowed
    } else {
        ExportAccess::Forbidden
    }
}

/// Outcome of a full-text case request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseAccess {
    /// Content may be shown without touching the allowance.
    Open,
    /// Content may be shown and one unit of allowance is consumed.
    ConsumesAllowance,
    AuthenticationRequired,
    LimitExceeded,
}

impl CaseAccess {
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Open | Self::ConsumesAllowance => "ok",
            Self::AuthenticationRequired => "error_auth_required",
            Self::LimitExceeded => "error_limit_exceeded",
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Open | Self::ConsumesAllowance)
    }
}

#[must_use]
pub fn case_access(
    viewer: Option<&AccessProfile>,
    case_restricted: bool,
    now: DateTime<Utc>,
) -> CaseAccess {
    if !case_restricted {
        return CaseAccess::Open;
    }

    let Some(viewer) = viewer else {
        return CaseAccess::AuthenticationRequired;
    };

    if viewer.unlimited_access_in_effect(now) {
        return CaseAccess::Open;
    }

    if viewer.email_verified && viewer.effective_allowance_remaining(now) > 0 {
        CaseAccess::ConsumesAllowance
    } else {
        CaseAccess::LimitExceeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(now: DateTime<Utc>) -> AccessProfile {
        AccessProfile {
            user_id: 7,
            email_verified: true,
            unlimited_access: false,
            unlimited_access_until: None,
            total_case_allowance: 500,
            case_allowance_remaining: 500,
            case_allowance_last_updated: now,
        }
    }

    #[test]
    fn unlimited_access_requires_future_expiry() {
        let now = Utc::now();
        let mut p = profile(now);
        assert!(!p.unlimited_access_in_effect(now));

        p.unlimited_access = true;
        p.unlimited_access_until = Some(now + Duration::hours(24));
        assert!(p.unlimited_access_in_effect(now));

        p.unlimited_access_until = Some(now - Duration::seconds(1));
        assert!(!p.unlimited_access_in_effect(now));

        p.unlimited_access_until = None;
        assert!(p.unlimited_access_in_effect(now));
    }

    #[test]
    fn export_access_table() {
        let now = Utc::now();
        let plain = profile(now);
        let mut unlimited = profile(now);
        unlimited.unlimited_access = true;
        unlimited.unlimited_access_until = Some(now + Duration::days(1));

        assert_eq!(export_access(None, true, None, now), ExportAccess::Allowed);
        assert_eq!(
            export_access(None, false, None, now),
            ExportAccess::AuthenticationRequired
        );
        assert_eq!(
            export_access(Some(&plain), true, None, now),
            ExportAccess::Allowed
        );
        assert_eq!(
            export_access(Some(&plain), false, None, now),
            ExportAccess::Forbidden
        );
        assert_eq!(
            export_access(Some(&plain), false, Some(plain.user_id), now),
            ExportAccess::Allowed
        );
        assert_eq!(
            export_access(Some(&unlimited), false, Some(99), now),
            ExportAccess::Allowed
        );
    }

    #[test]
    fn restricted_case_consumes_allowance() {
        let now = Utc::now();
        let mut p = profile(now);

        assert_eq!(case_access(None, false, now), CaseAccess::Open);
        assert_eq!(
            case_access(None, true, now),
            CaseAccess::AuthenticationRequired
        );
        assert_eq!(
            case_access(Some(&p), true, now),
            CaseAccess::ConsumesAllowance
        );

        p.case_allowance_remaining = 0;
        assert_eq!(case_access(Some(&p), true, now), CaseAccess::LimitExceeded);
        assert_eq!(case_access(Some(&p), true, now).status(), "error_limit_exceeded");

        p.unlimited_access = true;
        assert_eq!(case_access(Some(&p), true, now), CaseAccess::Open);
    }

    #[test]
    fn allowance_resets_after_a_day() {
        let now = Utc::now();
        let mut p = profile(now - Duration::hours(25));
        p.case_allowance_remaining = 0;
        assert_eq!(p.effective_allowance_remaining(now), 500);
        assert_eq!(case_access(Some(&p), true, now), CaseAccess::ConsumesAllowance);
    }

    #[test]
    fn unverified_user_has_no_allowance() {
        let now = Utc::now();
        let mut p = profile(now);
        p.email_verified = false;
        p.total_case_allowance = 0;
        p.case_allowance_remaining = 0;
        assert_eq!(case_access(Some(&p), true, now), CaseAccess::LimitExceeded);
    }
}

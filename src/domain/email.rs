//! Email address checks used at registration.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email regex is valid")
});

/// Providers that ignore dots in the local part.
const DOTLESS_DOMAINS: &[&str] = &["gmail.com", "googlemail.com"];

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Lowercased domain part of an address, if it has one.
#[must_use]
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    if domain.is_empty() {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

/// Canonical form of an address for duplicate detection.
///
/// `New_User+stuff@Gmail.com` and `new.user@googlemail.com` both become
/// `newuser@gmail.com`.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    let lowered = email.trim().to_lowercase();
    let Some((local, domain)) = lowered.rsplit_once('@') else {
        return lowered;
    };

    let mut local = local.split('+').next().unwrap_or(local).to_string();
    let mut domain = domain.to_string();

    if DOTLESS_DOMAINS.contains(&domain.as_str()) {
        local.retain(|c| c != '.');
        domain = "gmail.com".to_string();
    }

    format!("{local}@{domain}")
}

/// True if `domain` equals a blocked domain or is a subdomain of one.
#[must_use]
pub fn domain_is_blocked<S: AsRef<str>>(domain: &str, blocked: &[S]) -> bool {
    let domain = domain.to_ascii_lowercase();
    blocked.iter().any(|entry| {
        let entry = entry.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
        !entry.is_empty()
            && (domain == entry
                || domain
                    .strip_suffix(&entry)
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}

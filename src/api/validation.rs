use super::ApiError;

pub fn validate_id(kind: &str, id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid {} ID: {}. ID must be a positive integer",
            kind, id
        )));
    }
    Ok(id)
}

/// Accepts a post-login redirect target only if it stays on this site.
///
/// Local paths start with a single `/`; `//host` and `/\host` are
/// protocol-relative in browsers and rejected.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let rest = next.strip_prefix('/')?;
    if rest.starts_with('/') || rest.starts_with('\\') || next.contains(['\r', '\n']) {
        return None;
    }
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("export", 1).is_ok());
        assert!(validate_id("export", 0).is_err());
        assert!(validate_id("case", -5).is_err());
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/user/details")), Some("/user/details"));
        assert_eq!(safe_next(Some("/bulk/download/?x=1")), Some("/bulk/download/?x=1"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }
}

//! Secret resolution.
//!
//! Credential rows carry a reference, not a secret. The reference names an
//! environment variable holding the actual value; in production that env
//! is populated from the deployment's secret store.

/// Resolves a secret reference to its value. Falls back to the reference
/// itself when nothing is configured under it, so a misconfigured
/// environment fails authentication at the CRM rather than crashing the
/// submission.
pub fn resolve_secret(reference: &str) -> String {
    if reference.is_empty() {
        tracing::warn!("resolve_secret called with empty reference");
        return String::new();
    }
    match std::env::var(reference) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(reference, "no secret configured under reference");
            reference.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_from_environment() {
        std::env::set_var("CLAIMFLOW_TEST_SECRET_REF", "s3cret");
        assert_eq!(resolve_secret("CLAIMFLOW_TEST_SECRET_REF"), "s3cret");
        std::env::remove_var("CLAIMFLOW_TEST_SECRET_REF");
    }

    #[test]
    fn test_unknown_reference_falls_back_to_itself() {
        assert_eq!(resolve_secret("CLAIMFLOW_NO_SUCH_REF"), "CLAIMFLOW_NO_SUCH_REF");
    }

    #[test]
    fn test_empty_reference_is_empty() {
        assert_eq!(resolve_secret(""), "");
    }
}

//! Request and response bodies shared by the HTTP services
//!
//! All bodies are camelCase JSON. Requests derive `Validate` and are
//! checked by [`ValidatedJson`](crate::extract::ValidatedJson) before a
//! handler runs.

mod admin;
mod app;

pub use admin::*;
pub use app::*;

use validator::ValidationError;

/// Lowercase letters, digits and single inner hyphens
pub(crate) fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let well_formed = !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("slug")
            .with_message("use lowercase letters, digits and single hyphens".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        for good in ["acme", "acme-2", "a1-b2-c3"] {
            assert!(validate_slug(good).is_ok(), "{}", good);
        }
        for bad in ["Acme", "-acme", "acme-", "ac--me", "ac me", "acmé"] {
            assert!(validate_slug(bad).is_err(), "{}", bad);
        }
    }
}

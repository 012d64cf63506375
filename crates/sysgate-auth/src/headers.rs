//! HTTP header utilities for authentication.
//!
//! Kept free of any HTTP framework types: callers pass raw header values.

/// The standard HTTP Authorization header name.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Header carrying an admin session token.
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// Header carrying a read-only API key.
pub const X_API_KEY_HEADER: &str = "X-API-Key";

/// Credentials presented by a request. Blank header values count as absent.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Admin session token from `X-Session-Token` or `Authorization: Bearer`.
    pub session_token: Option<String>,
    /// Read-only key from `X-API-Key`.
    pub api_key: Option<String>,
}

impl Credentials {
    /// Extracts credentials from raw header values.
    ///
    /// `X-Session-Token` wins over `Authorization` when both carry a token.
    /// Non-bearer `Authorization` schemes are ignored.
    #[must_use]
    pub fn from_headers(
        session_token: Option<&str>,
        authorization: Option<&str>,
        api_key: Option<&str>,
    ) -> Self {
        let session_token = non_blank(session_token).or_else(|| {
            authorization
                .map(str::trim)
                .and_then(|auth| auth.strip_prefix("Bearer "))
                .and_then(|token| non_blank(Some(token)))
        });

        Self {
            session_token,
            api_key: non_blank(api_key),
        }
    }

    /// Returns true if neither credential is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.session_token.is_none() && self.api_key.is_none()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Some("abc"), None, Some("abc") ; "session header")]
    #[test_case(None, Some("Bearer abc"), Some("abc") ; "bearer")]
    #[test_case(None, Some("  Bearer   abc  "), Some("abc") ; "bearer with whitespace")]
    #[test_case(Some("abc"), Some("Bearer xyz"), Some("abc") ; "session header wins")]
    #[test_case(Some("   "), Some("Bearer xyz"), Some("xyz") ; "blank session header falls back")]
    #[test_case(None, Some("Basic dXNlcjpwdw=="), None ; "basic ignored")]
    #[test_case(None, Some("Bearer "), None ; "empty bearer")]
    #[test_case(None, None, None ; "none")]
    fn session_token_extraction(
        session: Option<&str>,
        authorization: Option<&str>,
        expected: Option<&str>,
    ) {
        let creds = Credentials::from_headers(session, authorization, None);
        assert_eq!(creds.session_token.as_deref(), expected);
    }

    #[test]
    fn api_key_is_trimmed_and_blank_is_absent() {
        let creds = Credentials::from_headers(None, None, Some(" key "));
        assert_eq!(creds.api_key.as_deref(), Some("key"));
        assert!(!creds.is_empty());

        let creds = Credentials::from_headers(None, None, Some(""));
        assert!(creds.is_empty());
    }

    #[test]
    fn debug_redacts_values() {
        let creds = Credentials::from_headers(Some("tok"), None, Some("key"));
        let debug = format!("{creds:?}");
        assert!(!debug.contains("tok\""));
        assert!(!debug.contains("\"key\""));
        assert!(debug.contains("[REDACTED]"));
    }
}

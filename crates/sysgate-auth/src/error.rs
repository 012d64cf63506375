//! Error types for authentication and credential management.

use thiserror::Error;

/// Errors that can occur in the authentication system.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid credential.
    ///
    /// Deliberately carries no detail so callers cannot tell an unknown key
    /// from an expired session.
    #[error("authentication required")]
    Unauthorized,

    /// The credential is valid but the request origin is not allowed.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// The reason the request was refused.
        reason: String,
    },

    /// The operating system random source failed.
    #[error("randomness error: {reason}")]
    Randomness {
        /// The reason the random source failed.
        reason: String,
    },

    /// Password hashing failed.
    #[error("hashing error: {reason}")]
    Hashing {
        /// The reason hashing failed.
        reason: String,
    },

    /// A read-only key with this name already exists.
    #[error("api key already exists: {name}")]
    DuplicateKey {
        /// The conflicting key name.
        name: String,
    },

    /// No read-only key with this name exists.
    #[error("api key not found: {name}")]
    KeyNotFound {
        /// The requested key name.
        name: String,
    },

    /// The key name is not acceptable.
    #[error("invalid api key name: {reason}")]
    InvalidKeyName {
        /// The reason the name was rejected.
        reason: String,
    },
}

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_message_is_uniform() {
        assert_eq!(Error::Unauthorized.to_string(), "authentication required");
    }

    #[test]
    fn error_display_formats_correctly() {
        let err = Error::DuplicateKey {
            name: "grafana".to_string(),
        };
        assert_eq!(err.to_string(), "api key already exists: grafana");

        let err = Error::Forbidden {
            reason: "not a loopback address".to_string(),
        };
        assert_eq!(err.to_string(), "forbidden: not a loopback address");
    }
}

//! Error types for at-rest secret handling.

use thiserror::Error;

/// Errors that can occur while encrypting or decrypting stored secrets.
#[derive(Debug, Error)]
pub enum Error {
    /// The operating system random source failed.
    #[error("randomness error: {reason}")]
    Randomness {
        /// The reason the random source failed.
        reason: String,
    },

    /// Encryption failed.
    #[error("encryption error: {reason}")]
    Encryption {
        /// The reason encryption failed.
        reason: String,
    },

    /// Decryption or authentication failed.
    #[error("decryption error: {reason}")]
    Decryption {
        /// The reason decryption failed.
        reason: String,
    },

    /// The stored value could not be decoded.
    #[error("encoding error: {reason}")]
    Encoding {
        /// The reason decoding failed.
        reason: String,
    },

    /// No host identity could be determined.
    #[error("host identity error: {reason}")]
    Identity {
        /// The reason the identity is unavailable.
        reason: String,
    },
}

/// Result type alias for secret operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats_correctly() {
        let err = Error::Decryption {
            reason: "tag mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "decryption error: tag mismatch");

        let err = Error::Identity {
            reason: "no machine id".to_string(),
        };
        assert_eq!(err.to_string(), "host identity error: no machine id");
    }
}

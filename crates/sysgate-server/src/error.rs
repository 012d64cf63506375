//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sysgate_query::{ApiError, ErrorCode};
use thiserror::Error;
use tracing::{error, warn};

use crate::config::ConfigError;
use crate::db::RepositoryError;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a request or starting up.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A client-facing error, returned as-is.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The database failed. Detail is logged, not returned.
    #[error("{message}: {source}")]
    Database {
        /// Client-facing summary.
        message: String,
        /// The underlying error.
        #[source]
        source: RepositoryError,
    },

    /// Any other server-side failure. Detail is logged, not returned.
    #[error("{message}: {reason}")]
    Internal {
        /// Client-facing summary.
        message: String,
        /// What actually went wrong.
        reason: String,
    },

    /// Configuration could not be loaded or saved.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// The HTTP server stopped with an error.
    #[error("server error: {0}")]
    Serve(String),
}

impl ServerError {
    /// Wraps a repository failure with a client-facing summary.
    pub fn database(message: impl Into<String>, source: RepositoryError) -> Self {
        Self::Database {
            message: message.into(),
            source,
        }
    }

    /// Wraps an internal failure with a client-facing summary.
    pub fn internal(message: impl Into<String>, reason: impl ToString) -> Self {
        Self::Internal {
            message: message.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds the client-facing body, logging whatever it hides.
    fn into_api_error(self) -> ApiError {
        match self {
            Self::Api(err) => err,
            Self::Database { message, source } => {
                error!(error = %source, "{message}");
                ApiError::new(ErrorCode::DatabaseError, message)
            }
            Self::Internal { message, reason } => {
                error!(reason = %reason, "{message}");
                ApiError::new(ErrorCode::InternalError, message)
            }
            Self::Config(err) => {
                error!(error = %err, "configuration error");
                ApiError::new(ErrorCode::InternalError, "Failed to save configuration")
            }
            other @ (Self::BindFailed(..) | Self::Serve(_)) => {
                error!(error = %other, "server error");
                ApiError::new(ErrorCode::InternalError, "Internal server error")
            }
        }
    }
}

/// HTTP status for an error code.
#[must_use]
pub const fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidParameter
        | ErrorCode::MissingParameter
        | ErrorCode::InvalidColumn
        | ErrorCode::InvalidDateRange
        | ErrorCode::InvalidSeverity
        | ErrorCode::InvalidFacility => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = self.into_api_error();
        let status = status_for(body.code);

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"code":"INTERNAL_ERROR","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

impl From<sysgate_auth::Error> for ServerError {
    fn from(err: sysgate_auth::Error) -> Self {
        use sysgate_auth::Error as Auth;
        match err {
            Auth::Unauthorized => ApiError::new(ErrorCode::Unauthorized, "Authentication required").into(),
            Auth::Forbidden { reason } => ApiError::new(ErrorCode::Forbidden, reason).into(),
            Auth::DuplicateKey { .. } => {
                ApiError::new(ErrorCode::Conflict, "A key with this name already exists").into()
            }
            Auth::KeyNotFound { name } => {
                ApiError::new(ErrorCode::NotFound, format!("Key not found: {name}")).into()
            }
            Auth::InvalidKeyName { reason } => {
                warn!(reason = %reason, "rejected key name");
                ApiError::validation("name", "Key name is required").into()
            }
            err @ Auth::Randomness { .. } => Self::internal("Failed to generate key", err),
            err @ Auth::Hashing { .. } => Self::internal("Failed to hash password", err),
        }
    }
}

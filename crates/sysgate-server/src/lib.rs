//! # sysgate-server
//!
//! HTTP API over rsyslog's MySQL `SystemEvents` table, built on axum.
//!
//! ## Features
//!
//! - **Filtered reads**: date range, severity, facility, host, tag and
//!   message filters compiled to parameterized SQL
//! - **Two credential kinds**: read-only API keys and admin sessions
//! - **Key management**: admins create and revoke keys; changes are saved
//!   back to `config.toml`
//! - **Retention**: optional disk-usage based cleanup of the oldest events,
//!   adjustable at runtime by admins
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sysgate_server::ServerError> {
//!     sysgate_server::server::run(
//!         Path::new("/etc/sysgate/config.toml"),
//!         sysgate_server::server::shutdown_signal(),
//!     )
//!     .await
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Access |
//! |----------|--------|--------|
//! | `/` | GET | public |
//! | `/health` | GET | public |
//! | `/api/admin/login` | POST | public |
//! | `/api/admin/logout` | POST | admin |
//! | `/api/admin/keys` | GET, POST | admin |
//! | `/api/admin/keys/{name}` | DELETE | admin |
//! | `/api/admin/config` | GET, PATCH | admin |
//! | `/api/bootstrap/admin-password` | POST | localhost |
//! | `/api/logs` | GET | read-only |
//! | `/api/meta` | GET | read-only |
//! | `/api/meta/{column}` | GET | read-only |

#![forbid(unsafe_code)]

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
mod testing;

pub use cleanup::{CleanupService, DiskProbe, Fs2Probe};
pub use config::{AppConfig, CleanupConfig, ConfigError, DatabaseConfig, ServerConfig};
pub use db::{LogRepository, MySqlRepository, RepositoryError};
pub use error::{ServerError, ServerResult};
pub use routes::create_router;
pub use server::Server;
pub use state::{AppState, SharedState};

//! # sysgate-auth
//!
//! Authentication for the sysgate log API.
//!
//! Two credential kinds map onto three access tiers:
//!
//! - **Admin session token**: issued at password login, held in memory for
//!   eight hours, sent as `X-Session-Token` or `Authorization: Bearer`
//! - **Read-only API key**: long-lived, stored only as a SHA-256 digest, sent
//!   as `X-API-Key`
//!
//! [`AuthResolver`] turns presented [`Credentials`] into a [`Role`] and
//! implements the read-only and admin gates. [`require_localhost`] guards
//! bootstrap operations that run before any credential exists.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sysgate_auth::{AuthConfig, AuthResolver, CredentialManager, Credentials, Role, SessionStore};
//!
//! let credentials = Arc::new(CredentialManager::new(AuthConfig::default()));
//! let resolver = AuthResolver::new(credentials.clone(), Arc::new(SessionStore::new()));
//!
//! let key = credentials.add_key("grafana")?;
//! let creds = Credentials::from_headers(None, None, Some(key.expose()));
//! assert_eq!(resolver.resolve_role(&creds), Role::ReadOnly);
//! assert!(resolver.require_admin(&creds).is_err());
//! # Ok::<(), sysgate_auth::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod apikey;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod headers;
pub mod resolver;
pub mod session;
pub mod types;

pub use apikey::{ApiKeySecret, generate_read_only_key, hash_key};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialManager, HashCost, hash_admin_password, hash_admin_password_with};
pub use error::{Error, Result};
pub use headers::{AUTHORIZATION_HEADER, Credentials, SESSION_TOKEN_HEADER, X_API_KEY_HEADER};
pub use resolver::{AuthResolver, is_loopback_peer, require_localhost};
pub use session::{SESSION_TTL, SWEEP_INTERVAL, Session, SessionStore, SweeperHandle};
pub use types::{AuthConfig, ReadOnlyKeyRecord, Role};

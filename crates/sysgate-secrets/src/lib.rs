//! # sysgate-secrets
//!
//! At-rest encryption for configuration secrets such as the database password.
//!
//! - **Host-bound key**: the AES-256-GCM key is `SHA-256(host identity || salt)`
//! - **Migration friendly**: values without the `enc:` prefix pass through
//! - **Pluggable identity**: [`IdentityProvider`] lets tests avoid the filesystem
//!
//! ## Example
//!
//! ```rust
//! use sysgate_secrets::{SecretCodec, StaticIdentity};
//!
//! let codec = SecretCodec::from_provider(&StaticIdentity::new("host-1"))?;
//! let stored = codec.encrypt("s3cret")?;
//! assert!(stored.starts_with("enc:"));
//! assert_eq!(codec.decrypt(&stored)?, "s3cret");
//! # Ok::<(), sysgate_secrets::Error>(())
//! ```
//!
//! Moving an encrypted config to another host without its identity file makes
//! the secret unrecoverable.

pub mod codec;
pub mod encryption;
pub mod error;
pub mod identity;

pub use codec::{ENC_PREFIX, SecretCodec};
pub use encryption::SecretKey;
pub use error::{Error, Result};
pub use identity::{HostIdentity, IdentityProvider, StaticIdentity};

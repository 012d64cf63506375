//! Access-tier resolution and the request gates built on it.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tracing::debug;

use crate::credentials::CredentialManager;
use crate::error::{Error, Result};
use crate::headers::Credentials;
use crate::session::SessionStore;
use crate::types::Role;

/// Combines the credential registry and the session store into access decisions.
#[derive(Debug, Clone)]
pub struct AuthResolver {
    credentials: Arc<CredentialManager>,
    sessions: Arc<SessionStore>,
}

impl AuthResolver {
    /// Creates a resolver over shared credential and session state.
    #[must_use]
    pub fn new(credentials: Arc<CredentialManager>, sessions: Arc<SessionStore>) -> Self {
        Self {
            credentials,
            sessions,
        }
    }

    /// Returns the credential registry.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Returns the session store.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Determines the caller's role. A valid session token is checked first,
    /// so a request carrying both credentials resolves to [`Role::Admin`].
    #[must_use]
    pub fn resolve_role(&self, creds: &Credentials) -> Role {
        if let Some(token) = creds.session_token.as_deref() {
            if self.sessions.validate(token) {
                return Role::Admin;
            }
        }
        if let Some(key) = creds.api_key.as_deref() {
            if let Some(name) = self.credentials.verify_read_only_key(key) {
                debug!(key_name = %name, "read-only key accepted");
                return Role::ReadOnly;
            }
        }
        Role::None
    }

    /// Allows any authenticated caller.
    pub fn require_read_only(&self, creds: &Credentials) -> Result<Role> {
        let role = self.resolve_role(creds);
        if role.can_read() {
            Ok(role)
        } else {
            Err(Error::Unauthorized)
        }
    }

    /// Allows only callers holding a live session token. API keys never pass.
    pub fn require_admin(&self, creds: &Credentials) -> Result<()> {
        match creds.session_token.as_deref() {
            Some(token) if self.sessions.validate(token) => Ok(()),
            _ => Err(Error::Unauthorized),
        }
    }
}

/// Returns true if `peer` is one of the loopback literals `127.0.0.1`,
/// `::1` or `localhost`.
///
/// Accepts `ip:port` socket addresses and bare IPs (bracketed or not).
/// `::ffff:127.0.0.1` counts as `127.0.0.1`, as a dual-stack listener
/// reports it. Other `127.0.0.0/8` addresses do not.
#[must_use]
pub fn is_loopback_peer(peer: &str) -> bool {
    let peer = peer.trim();
    let ip = if let Ok(addr) = peer.parse::<SocketAddr>() {
        addr.ip()
    } else if let Ok(ip) = peer.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        ip
    } else {
        let host = peer.rsplit_once(':').map_or(peer, |(host, _)| host);
        return host.eq_ignore_ascii_case("localhost") || peer.eq_ignore_ascii_case("localhost");
    };

    match ip {
        IpAddr::V4(v4) => v4 == Ipv4Addr::LOCALHOST,
        IpAddr::V6(v6) => v6 == Ipv6Addr::LOCALHOST || v6.to_ipv4_mapped() == Some(Ipv4Addr::LOCALHOST),
    }
}

/// Allows only requests whose peer address is loopback.
pub fn require_localhost(peer: Option<&str>) -> Result<()> {
    match peer {
        Some(peer) if is_loopback_peer(peer) => Ok(()),
        _ => Err(Error::Forbidden {
            reason: "This endpoint is only accessible from localhost".to_string(),
        }),
    }
}

//! Shared state for request handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sysgate_auth::{AuthResolver, CredentialManager, SessionStore};
use sysgate_query::ColumnSet;
use tracing::info;

use crate::cleanup::CleanupService;
use crate::config::{AppConfig, ConfigError};
use crate::db::LogRepository;

/// State shared by every handler, behind an `Arc`.
pub type SharedState = Arc<AppState>;

/// Service name reported at `/`.
pub const SERVICE_NAME: &str = "sysgate";

/// Handler state.
pub struct AppState {
    resolver: AuthResolver,
    repo: Arc<dyn LogRepository>,
    columns: ColumnSet,
    /// Last saved config; auth changes are written back through it.
    config: Mutex<AppConfig>,
    /// `None` keeps changes in memory only.
    config_path: Option<PathBuf>,
    cleanup: Option<Arc<CleanupService>>,
    version: String,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("columns", &self.columns.names().len())
            .field("config_path", &self.config_path)
            .field("cleanup", &self.cleanup.is_some())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds state from a loaded config.
    ///
    /// Credentials start from `config.auth`; sessions start empty.
    pub fn new(config: AppConfig, repo: Arc<dyn LogRepository>, columns: ColumnSet) -> Self {
        let credentials = Arc::new(CredentialManager::new(config.auth.clone()));
        let resolver = AuthResolver::new(credentials, Arc::new(SessionStore::new()));
        Self::with_resolver(config, repo, columns, resolver)
    }

    /// Builds state around an existing resolver.
    pub fn with_resolver(
        config: AppConfig,
        repo: Arc<dyn LogRepository>,
        columns: ColumnSet,
        resolver: AuthResolver,
    ) -> Self {
        Self {
            resolver,
            repo,
            columns,
            config: Mutex::new(config),
            config_path: None,
            cleanup: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Persists auth changes to `path`.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Attaches the retention loop so config changes can restart it.
    #[must_use]
    pub fn with_cleanup(mut self, cleanup: Arc<CleanupService>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Overrides the reported version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Credential and session checks.
    pub fn resolver(&self) -> &AuthResolver {
        &self.resolver
    }

    /// Log storage.
    pub fn repo(&self) -> &Arc<dyn LogRepository> {
        &self.repo
    }

    /// Queryable columns.
    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Reported version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The retention loop, if one is attached.
    pub fn cleanup(&self) -> Option<&Arc<CleanupService>> {
        self.cleanup.as_ref()
    }

    /// Where auth changes are saved, if anywhere.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Copies the current credentials into the config and saves it.
    ///
    /// Writers are serialized by the config lock.
    pub fn persist_auth(&self) -> Result<(), ConfigError> {
        let mut config = self.config.lock();
        config.auth = self.resolver.credentials().snapshot();
        if let Some(path) = &self.config_path {
            config.save(path)?;
            info!(path = %path.display(), keys = config.auth.read_only_keys.len(), "saved credentials");
        }
        Ok(())
    }

    /// Applies `edit` to a copy of the config, saves it and makes it current.
    ///
    /// On a failed save the current config is left unchanged. Returns the
    /// new config.
    pub fn update_config<F>(&self, edit: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut current = self.config.lock();
        let mut next = current.clone();
        edit(&mut next);
        next.auth = self.resolver.credentials().snapshot();
        next.validate()?;
        if let Some(path) = &self.config_path {
            next.save(path)?;
            info!(path = %path.display(), "saved configuration");
        }
        *current = next.clone();
        Ok(next)
    }

    /// A copy of the current config.
    pub fn config(&self) -> AppConfig {
        self.config.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRepository;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.user = "rsyslog".to_string();
        config.database.password = "secret".to_string();
        config
    }

    #[test]
    fn persist_writes_new_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let state = AppState::new(config(), Arc::new(MemoryRepository::default()), ColumnSet::builtin())
            .with_config_path(&path);

        state.resolver().credentials().add_key("grafana").expect("add key");
        state.persist_auth().expect("persist");

        let saved = AppConfig::load(&path).expect("load saved config");
        assert_eq!(saved.auth.read_only_keys.len(), 1);
        assert_eq!(saved.auth.read_only_keys[0].name, "grafana");
        assert_eq!(state.config(), saved);
    }

    #[test]
    fn update_config_saves_before_applying() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let state = AppState::new(config(), Arc::new(MemoryRepository::default()), ColumnSet::builtin())
            .with_config_path(&path);
        state.resolver().credentials().add_key("grafana").expect("add key");

        let updated = state
            .update_config(|c| c.server.auto_refresh_interval = 10)
            .expect("update config");
        assert_eq!(updated.server.auto_refresh_interval, 10);
        assert_eq!(updated.auth.read_only_keys.len(), 1);
        assert_eq!(AppConfig::load(&path).expect("load saved config"), updated);

        let err = state
            .update_config(|c| c.database.user.clear())
            .expect_err("empty user is invalid");
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert_eq!(state.config(), updated);
    }

    #[test]
    fn persist_without_path_only_updates_memory() {
        let state = AppState::new(config(), Arc::new(MemoryRepository::default()), ColumnSet::builtin());
        state.resolver().credentials().add_key("grafana").expect("add key");
        state.persist_auth().expect("persist");

        assert!(state.config_path().is_none());
        assert_eq!(state.config().auth.read_only_keys.len(), 1);
    }
}

//! Server startup and lifecycle.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use sysgate_auth::SWEEP_INTERVAL;
use sysgate_query::ColumnSet;
use sysgate_secrets::{HostIdentity, SecretCodec};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cleanup::CleanupService;
use crate::config::{AppConfig, ConfigError};
use crate::db::{LogRepository, MySqlRepository};
use crate::error::{ServerError, ServerResult};
use crate::routes::create_router;
use crate::state::{AppState, SharedState};

/// HTTP server for the log API.
#[derive(Debug, Clone)]
pub struct Server {
    state: SharedState,
}

impl Server {
    /// Create a server around prepared state.
    #[must_use]
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Get the shared state.
    #[must_use]
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Bind `addr` and serve until `shutdown` completes.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    ///
    /// Peer addresses are attached to every request for the loopback gate.
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "sysgate listening");
        }

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("sysgate shut down");
        Ok(())
    }
}

/// Loads the config at `config_path`, connects to the database and serves
/// until `shutdown` completes. Background tasks are stopped before returning.
pub async fn run<F>(config_path: &Path, shutdown: F) -> ServerResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let config = AppConfig::load(config_path)?;
    info!(path = %config_path.display(), "configuration loaded");
    if config.auth.admin_password_hash.is_empty() {
        warn!("no admin password configured; set one with POST /api/bootstrap/admin-password from localhost");
    }

    let codec = SecretCodec::from_provider(&HostIdentity::new()).map_err(ConfigError::from)?;
    let options = config.database.connect_options(&codec)?;
    let addr = config.server.bind_addr()?;

    let mysql = Arc::new(
        MySqlRepository::connect(options)
            .await
            .map_err(|e| ServerError::database("Failed to connect to database", e))?,
    );
    info!(host = %config.database.host, database = %config.database.name, "database connected");

    let columns = match mysql.load_columns().await {
        Ok(columns) => columns,
        Err(err) => {
            warn!(error = %err, "could not read table schema; using built-in column list");
            ColumnSet::builtin()
        }
    };

    let repo: Arc<dyn LogRepository> = mysql.clone();
    let cleanup = Arc::new(CleanupService::new(repo.clone(), config.cleanup.clone()));
    let state = Arc::new(
        AppState::new(config, repo, columns)
            .with_config_path(config_path)
            .with_cleanup(Arc::clone(&cleanup)),
    );

    let sweeper = state.resolver().sessions().spawn_sweeper(SWEEP_INTERVAL);
    cleanup.start();

    let result = Server::new(state).serve_with_shutdown(addr, shutdown).await;

    cleanup.stop().await;
    sweeper.shutdown().await;
    mysql.close().await;
    result
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRepository;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn make_test_server() -> Server {
        let mut config = AppConfig::default();
        config.database.user = "rsyslog".to_string();
        config.database.password = "secret".to_string();
        let state = AppState::new(config, Arc::new(MemoryRepository::default()), ColumnSet::builtin());
        Server::new(Arc::new(state))
    }

    async fn raw_request(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream.write_all(request.as_bytes()).await.expect("write request");
        let mut response = String::new();
        stream.read_to_string(&mut response).await.expect("read response");
        response
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();

        let server = make_test_server();
        let task = tokio::spawn(async move {
            server
                .serve_listener(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        let response = raw_request(addr, "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"healthy\""));

        // Reaching the handler, not the 403 gate, proves the peer address is attached.
        let body = r#"{"password":"short"}"#;
        let request = format!(
            "POST /api/bootstrap/admin-password HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let response = raw_request(addr, &request).await;
        assert!(response.starts_with("HTTP/1.1 400"));

        tx.send(()).expect("signal shutdown");
        task.await.expect("join").expect("serve");
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = taken.local_addr().expect("local addr");

        let err = make_test_server()
            .serve_with_shutdown(addr, async {})
            .await
            .expect_err("port is taken");
        assert!(matches!(err, ServerError::BindFailed(a, _) if a == addr));
    }

    #[tokio::test]
    async fn test_run_reports_missing_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run(&dir.path().join("absent.toml"), async {}).await.expect_err("config is missing");
        assert!(matches!(err, ServerError::Config(ConfigError::NotFound { .. })));
    }
}

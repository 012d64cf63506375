//! HTTP request handlers.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sysgate_query::{
    ApiError, ErrorCode, LogFilter, LogsResponse, MetaResponse, MetaValues, QueryParams,
    validate_pagination,
};
use tracing::{info, warn};

use crate::config::{AppConfig, CleanupConfig};
use crate::error::{ServerError, ServerResult};
use crate::middleware::credentials_from;
use crate::state::{SERVICE_NAME, SharedState};

/// Shortest admin password accepted at bootstrap.
pub const MIN_ADMIN_PASSWORD_CHARS: usize = 12;

/// Shown once alongside a newly created key.
pub const KEY_CREATED_MESSAGE: &str = "Store this key securely — it will not be shown again.";

/// Shortest UI refresh period accepted, in seconds.
pub const MIN_AUTO_REFRESH_SECS: i64 = 5;

/// Shortest cleanup period accepted, in seconds.
pub const MIN_CLEANUP_INTERVAL_SECS: i64 = 60;

const META_USAGE: &str = "GET /api/meta/{column} to get distinct values for a column";

/// Body of `GET /`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// Public entry points.
    pub endpoints: BTreeMap<String, String>,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// `connected` or `disconnected`.
    pub database: String,
    /// Service version.
    pub version: String,
    /// RFC 3339 check time.
    pub timestamp: String,
}

/// A `{password}` body.
#[derive(Deserialize)]
pub struct PasswordRequest {
    /// Plaintext password.
    pub password: String,
}

/// Body of a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Admin session token.
    pub token: String,
    /// When the token stops working.
    pub expires_at: DateTime<Utc>,
}

/// A `{message}` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// A read-only key as listed. Hashes are never returned.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyResponse {
    /// Key name.
    pub name: String,
}

/// Body of `POST /api/admin/keys`.
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    /// Name for the new key.
    #[serde(default)]
    pub name: String,
}

/// Body returned once for a created key.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateKeyResponse {
    /// Key name.
    pub name: String,
    /// Plaintext key.
    pub key: String,
    /// Storage reminder.
    pub message: String,
}

/// Body of `GET /api/admin/config`. Passwords and hashes are left out.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigView {
    /// HTTP settings.
    pub server: ServerView,
    /// Database location, without the password.
    pub database: DatabaseView,
    /// Retention settings.
    pub cleanup: CleanupConfig,
}

/// `server` part of [`ConfigView`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerView {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// CORS origins.
    pub allowed_origins: Vec<String>,
    /// Suggested UI refresh period, in seconds.
    pub auto_refresh_interval: u32,
}

/// `database` part of [`ConfigView`].
#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseView {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Schema name.
    pub name: String,
    /// Login user.
    pub user: String,
}

impl From<&AppConfig> for ConfigView {
    fn from(config: &AppConfig) -> Self {
        Self {
            server: ServerView {
                host: config.server.host.clone(),
                port: config.server.port,
                allowed_origins: config.server.allowed_origins.clone(),
                auto_refresh_interval: config.server.auto_refresh_interval,
            },
            database: DatabaseView {
                host: config.database.host.clone(),
                port: config.database.port,
                name: config.database.name.clone(),
                user: config.database.user.clone(),
            },
            cleanup: config.cleanup.clone(),
        }
    }
}

/// Body of `PATCH /api/admin/config`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdateRequest {
    /// HTTP settings to change.
    pub server: Option<ServerUpdate>,
    /// Retention settings to change.
    pub cleanup: Option<CleanupUpdate>,
}

/// `server` part of [`ConfigUpdateRequest`].
#[derive(Debug, Default, Deserialize)]
pub struct ServerUpdate {
    /// New CORS origins; an empty list is ignored. Applied on restart.
    pub allowed_origins: Option<Vec<String>>,
    /// New UI refresh period, at least 5 seconds.
    pub auto_refresh_interval: Option<i64>,
}

/// `cleanup` part of [`ConfigUpdateRequest`].
#[derive(Debug, Default, Deserialize)]
pub struct CleanupUpdate {
    /// Turn retention on or off.
    pub enabled: Option<bool>,
    /// New measured mount point; an empty path is ignored.
    pub disk_path: Option<PathBuf>,
    /// New threshold, in `(0, 100]`.
    pub threshold_percent: Option<f64>,
    /// New batch size, above 0.
    pub batch_size: Option<i64>,
    /// New check period, at least 60 seconds.
    pub interval_secs: Option<i64>,
}

/// Checked integer setting: at least `min` and representable as `T`.
fn at_least<T: TryFrom<i64>>(field: &str, value: i64, min: i64, message: &str) -> Result<T, ApiError> {
    if value < min {
        return Err(ApiError::validation(field, message));
    }
    T::try_from(value).map_err(|_| ApiError::validation(field, "Value is too large"))
}

impl ConfigUpdateRequest {
    /// Validates every field, then returns a function applying them.
    ///
    /// Nothing is applied unless the whole request is valid.
    fn into_edit(self) -> Result<impl FnOnce(&mut AppConfig), ApiError> {
        let server = self.server.unwrap_or_default();
        let cleanup = self.cleanup.unwrap_or_default();

        let origins = server.allowed_origins.filter(|o| !o.is_empty());
        let refresh: Option<u32> = server
            .auto_refresh_interval
            .map(|v| at_least("auto_refresh_interval", v, MIN_AUTO_REFRESH_SECS, "Minimum interval is 5 seconds"))
            .transpose()?;
        if cleanup
            .threshold_percent
            .is_some_and(|t| !(t > 0.0 && t <= 100.0))
        {
            return Err(ApiError::validation("threshold_percent", "Must be between 1 and 100"));
        }
        let batch_size: Option<u32> = cleanup
            .batch_size
            .map(|v| at_least("batch_size", v, 1, "Must be greater than 0"))
            .transpose()?;
        let interval_secs: Option<u64> = cleanup
            .interval_secs
            .map(|v| {
                at_least("interval_secs", v, MIN_CLEANUP_INTERVAL_SECS, "Minimum interval is 60 seconds")
            })
            .transpose()?;
        let disk_path = cleanup.disk_path.filter(|p| !p.as_os_str().is_empty());
        let enabled = cleanup.enabled;
        let threshold = cleanup.threshold_percent;

        Ok(move |config: &mut AppConfig| {
            if let Some(origins) = origins {
                config.server.allowed_origins = origins;
            }
            if let Some(refresh) = refresh {
                config.server.auto_refresh_interval = refresh;
            }
            if let Some(enabled) = enabled {
                config.cleanup.enabled = enabled;
            }
            if let Some(path) = disk_path {
                config.cleanup.disk_path = path;
            }
            if let Some(threshold) = threshold {
                config.cleanup.threshold_percent = threshold;
            }
            if let Some(batch_size) = batch_size {
                config.cleanup.batch_size = batch_size;
            }
            if let Some(interval_secs) = interval_secs {
                config.cleanup.interval_secs = interval_secs;
            }
        })
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ServerResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        warn!(error = %rejection, "rejected request body");
        ApiError::new(ErrorCode::InvalidParameter, "Invalid JSON body").into()
    })
}

/// Handle GET / - service identity.
pub async fn root(State(state): State<SharedState>) -> Json<RootResponse> {
    let endpoints = [("health", "/health"), ("logs", "/api/logs"), ("meta", "/api/meta")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Json(RootResponse {
        name: SERVICE_NAME.to_string(),
        version: state.version().to_string(),
        endpoints,
    })
}

/// Handle GET /health - database connectivity.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, healthy, database) = match state.repo().ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(err) => {
            warn!(error = %err, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };
    let body = HealthResponse {
        status: healthy.to_string(),
        database: database.to_string(),
        version: state.version().to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    (status, Json(body))
}

/// Handle POST /api/admin/login - exchange the admin password for a session.
pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> ServerResult<Json<LoginResponse>> {
    let PasswordRequest { password } = json_body(payload)?;

    let credentials = Arc::clone(state.resolver().credentials());
    let verified = tokio::task::spawn_blocking(move || credentials.verify_admin_password(&password))
        .await
        .map_err(|err| ServerError::internal("Failed to verify credentials", err))?;
    if !verified {
        warn!("admin login failed");
        return Err(ApiError::new(ErrorCode::Unauthorized, "Invalid credentials").into());
    }

    let session = state
        .resolver()
        .sessions()
        .create()
        .map_err(|err| ServerError::internal("Failed to create session", err))?;
    info!(expires_at = %session.expires_at, "admin login successful");

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
    }))
}

/// Handle POST /api/admin/logout - revoke the presented session.
pub async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Json<MessageResponse> {
    if let Some(token) = credentials_from(&headers).session_token {
        state.resolver().sessions().revoke(&token);
        info!("admin logged out");
    }
    MessageResponse::new("Logged out")
}

/// Handle GET /api/admin/keys - list key names.
pub async fn list_keys(State(state): State<SharedState>) -> Json<Vec<KeyResponse>> {
    let keys = state
        .resolver()
        .credentials()
        .list_keys()
        .into_iter()
        .map(|name| KeyResponse { name })
        .collect();
    Json(keys)
}

/// Handle POST /api/admin/keys - create a read-only key.
pub async fn create_key(
    State(state): State<SharedState>,
    payload: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<CreateKeyResponse>)> {
    let request = json_body(payload)?;
    let name = request.name.trim().to_string();

    let credentials = state.resolver().credentials();
    let secret = credentials.add_key(&name)?;

    if let Err(err) = state.persist_auth() {
        // Roll back: the caller never receives this key.
        if let Err(rollback) = credentials.remove_key(&name) {
            warn!(key_name = %name, error = %rollback, "failed to roll back unsaved key");
        }
        return Err(err.into());
    }
    info!(key_name = %name, "read-only key created");

    Ok((
        StatusCode::CREATED,
        Json(CreateKeyResponse {
            name,
            key: secret.expose().to_string(),
            message: KEY_CREATED_MESSAGE.to_string(),
        }),
    ))
}

/// Handle DELETE /api/admin/keys/{name} - revoke a read-only key.
pub async fn delete_key(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ServerResult<Json<MessageResponse>> {
    let name = name.trim();
    state.resolver().credentials().remove_key(name)?;
    state.persist_auth()?;
    info!(key_name = %name, "read-only key deleted");
    Ok(MessageResponse::new("Key deleted"))
}

/// Handle GET /api/admin/config - current settings without secrets.
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigView> {
    Json(ConfigView::from(&state.config()))
}

/// Handle PATCH /api/admin/config - change UI, CORS and retention settings.
///
/// The file is saved before the change takes effect. A changed `cleanup`
/// section restarts the retention loop.
pub async fn patch_config(
    State(state): State<SharedState>,
    payload: Result<Json<ConfigUpdateRequest>, JsonRejection>,
) -> ServerResult<Json<ConfigView>> {
    let edit = json_body(payload)?.into_edit()?;

    let before = state.config().cleanup;
    let updated = state.update_config(edit)?;
    info!("configuration updated");

    if let Some(cleanup) = state.cleanup().filter(|_| updated.cleanup != before) {
        let running = cleanup.reconfigure(updated.cleanup.clone()).await;
        info!(running, "retention cleanup reconfigured");
    }

    Ok(Json(ConfigView::from(&updated)))
}

/// Handle POST /api/bootstrap/admin-password - first admin password.
pub async fn bootstrap_admin_password(
    State(state): State<SharedState>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<MessageResponse>)> {
    let PasswordRequest { password } = json_body(payload)?;

    let credentials = Arc::clone(state.resolver().credentials());
    if credentials.has_admin_password() {
        return Err(ApiError::new(ErrorCode::Conflict, "Admin password is already set").into());
    }
    if password.chars().count() < MIN_ADMIN_PASSWORD_CHARS {
        return Err(ApiError::validation(
            "password",
            format!("Admin password must be at least {MIN_ADMIN_PASSWORD_CHARS} characters"),
        )
        .into());
    }

    let hash = tokio::task::spawn_blocking(move || sysgate_auth::hash_admin_password(&password))
        .await
        .map_err(|err| ServerError::internal("Failed to hash password", err))??;

    // A concurrent bootstrap may have won while hashing.
    if !credentials.set_admin_password_hash_if_unset(hash.clone()) {
        return Err(ApiError::new(ErrorCode::Conflict, "Admin password is already set").into());
    }

    if let Err(err) = state.persist_auth() {
        if !credentials.clear_admin_password_hash_if(&hash) {
            warn!("admin password changed before rollback; leaving it in place");
        }
        return Err(err.into());
    }
    info!("admin password set via localhost bootstrap");

    Ok((StatusCode::CREATED, MessageResponse::new("Admin password set")))
}

/// Handle GET /api/logs - filtered, paginated events.
pub async fn get_logs(
    State(state): State<SharedState>,
    RawQuery(query): RawQuery,
) -> ServerResult<Json<LogsResponse>> {
    let params = QueryParams::parse(query.as_deref().unwrap_or_default());
    let filter = LogFilter::from_params(&params, Utc::now())?;
    let page = validate_pagination(params.first("limit"), params.first("offset"))?;
    let predicate = filter.predicate(true);

    let total = state
        .repo()
        .count_logs(&predicate)
        .await
        .map_err(|err| ServerError::database("Failed to count logs", err))?;
    let rows = state
        .repo()
        .query_logs(&predicate, page)
        .await
        .map_err(|err| ServerError::database("Failed to query logs", err))?;

    Ok(Json(LogsResponse {
        total,
        offset: page.offset,
        limit: page.limit,
        rows,
    }))
}

/// Handle GET /api/meta - queryable columns.
pub async fn list_columns(State(state): State<SharedState>) -> Json<MetaResponse> {
    Json(MetaResponse {
        available_columns: state.columns().names().to_vec(),
        usage: META_USAGE.to_string(),
    })
}

/// Handle GET /api/meta/{column} - distinct values under the request filters.
///
/// The date band applies only when `start_date` or `end_date` was given.
pub async fn column_values(
    State(state): State<SharedState>,
    Path(column): Path<String>,
    RawQuery(query): RawQuery,
) -> ServerResult<Json<MetaValues>> {
    let column = state.columns().resolve(&column)?;
    let params = QueryParams::parse(query.as_deref().unwrap_or_default());
    let filter = LogFilter::from_params(&params, Utc::now())?;
    let predicate = filter.predicate(false);

    let values = state
        .repo()
        .distinct_values(&column, &predicate)
        .await
        .map_err(|err| ServerError::database("Failed to query metadata", err))?;
    Ok(Json(values))
}

//! ZoraH Web Server
//!
//! Axum-based REST API for the ZoraH clinic back office.
//!
//! Security features:
//! - API key authentication with per-key role and identity (secure by default,
//!   use --no-auth for local dev)
//! - Role checks per endpoint; prestadores only ever see their own figures
//! - Restrictive CORS policy
//! - Input validation (upload size and pagination limits)
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use zorah_core::db::Database;
use zorah_core::models::Role;

mod handlers;

pub use handlers::PendingUploads;

/// Maximum spreadsheet upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Identity used when authentication is disabled
pub const LOCAL_DEV_USER: &str = "local-dev";

/// An API key bound to a user identity and role
#[derive(Clone)]
pub struct ApiKey {
    pub key: String,
    pub role: Role,
    pub email: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"<redacted>")
            .field("role", &self.role)
            .field("email", &self.email)
            .finish()
    }
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// Accepted API keys, sent as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<ApiKey>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Parse a comma-separated list of `key:role:email` entries
///
/// Examples:
/// - "s3cret:master:ana@clinic.com"
/// - "k1:admin:ops@clinic.com,k2:prestador:bia@x.com"
///
/// Malformed entries are skipped with a warning.
pub fn parse_api_keys(input: &str) -> Vec<ApiKey> {
    input
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let mut parts = entry.splitn(3, ':');
            let (Some(key), Some(role), Some(email)) = (parts.next(), parts.next(), parts.next())
            else {
                warn!("Ignoring API key entry without key:role:email");
                return None;
            };

            let key = key.trim();
            let email = email.trim().to_lowercase();
            if key.is_empty() || email.is_empty() {
                warn!("Ignoring API key entry with an empty key or email");
                return None;
            }

            match role.parse::<Role>() {
                Ok(role) => Some(ApiKey {
                    key: key.to_string(),
                    role,
                    email,
                }),
                Err(e) => {
                    warn!(email = %email, "Ignoring API key entry: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// The authenticated caller, attached to every request by the auth middleware
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub email: String,
    pub role: Role,
}

impl Session {
    /// Session used when authentication is disabled
    pub fn local_dev() -> Self {
        Self {
            email: LOCAL_DEV_USER.to_string(),
            role: Role::Master,
        }
    }

    /// Only master and admin users may manage uploads and the roster
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::forbidden("This action requires an admin or master role"))
        }
    }

    pub fn require_master(&self) -> Result<(), AppError> {
        if self.role == Role::Master {
            Ok(())
        } else {
            Err(AppError::forbidden("This action requires the master role"))
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Previews awaiting confirmation, keyed by upload id
    pub pending: PendingUploads,
}

/// Authentication middleware - resolves the caller's session from an API key
///
/// # Security Notes
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
/// Each key carries the role and email of its holder, so handlers never trust
/// client-supplied identity.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        request.extensions_mut().insert(Session::local_dev());
        return next.run(request).await;
    }

    let session = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .and_then(|key| validate_api_key(key, &state.config.api_keys))
        .map(|api_key| Session {
            email: api_key.email.clone(),
            role: api_key.role,
        });

    match session {
        Some(session) => {
            debug!(user = %session.email, role = %session.role, path = %request.uri().path(), "Authenticated via API key");
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Authentication required"
                })),
            )
                .into_response()
        }
    }
}

/// Find the configured key matching `provided` using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key<'a>(provided: &str, valid_keys: &'a [ApiKey]) -> Option<&'a ApiKey> {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    let mut found = None;
    for api_key in valid_keys {
        let key_bytes = api_key.key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len()
            && bool::from(provided_bytes.ct_eq(key_bytes))
            && found.is_none()
        {
            found = Some(api_key);
        }
    }
    found
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        pending: PendingUploads::new(),
    });

    let api_routes = Router::new()
        // Auth
        .route("/me", get(handlers::get_me))
        // Uploads (preview, then commit or discard)
        .route(
            "/uploads/preview",
            // leave room for the multipart framing around the file
            post(handlers::preview_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024)),
        )
        .route(
            "/uploads/:upload_id",
            get(handlers::get_pending_upload).delete(handlers::discard_upload),
        )
        .route("/uploads/:upload_id/commit", post(handlers::commit_upload))
        .route("/uploads/history", get(handlers::list_upload_history))
        // Roster
        .route("/providers", get(handlers::list_providers))
        .route("/providers/:id", get(handlers::get_provider))
        .route("/providers/:id/archive", post(handlers::archive_provider))
        .route("/providers/:id/unarchive", post(handlers::unarchive_provider))
        // Reports
        .route("/reports/custom", get(handlers::report_custom))
        .route("/reports/custom/export", get(handlers::export_report_custom))
        // Audit log
        .route("/audit", get(handlers::list_audit_log));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // Security headers
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!("⚠️  No API keys configured (set ZORAH_API_KEYS); every request will be rejected");
    } else {
        info!("{} API key(s) configured", config.api_keys.len());
    }

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::with_status(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        use zorah_core::Error as CoreError;

        let err = err.into();

        // Domain errors carry messages that are safe to show
        if let Some(core) = err.downcast_ref::<CoreError>() {
            match core {
                CoreError::NotFound(_) => return Self::not_found(&core.to_string()),
                CoreError::Conflict(_) => return Self::conflict(&core.to_string()),
                CoreError::Import(_) | CoreError::InvalidData(_) => {
                    return Self::bad_request(&core.to_string())
                }
                _ => {}
            }
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

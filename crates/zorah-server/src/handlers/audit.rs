//! Audit log handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, Session, MAX_PAGE_LIMIT};
use zorah_core::models::Page;
use zorah_core::AuditEntry;

/// Query parameters for audit log
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    100
}

/// GET /api/audit - List audit log entries (master only)
pub async fn list_audit_log(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Page<AuditEntry>>, AppError> {
    session.require_master()?;
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let entries = state.db.list_audit_log(limit)?;
    let total = state.db.count_audit_log()?;

    // Audit log - viewing the audit log itself
    state.db.log_audit(
        &session.email,
        "list",
        Some("audit_log"),
        None,
        Some(&format!("limit={}", limit)),
    )?;

    Ok(Json(Page {
        items: entries,
        total,
    }))
}

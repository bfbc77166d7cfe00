//! Provider roster handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{AppError, AppState, Session};
use zorah_core::models::{Page, Provider, ProviderWithLinks};

/// GET /api/providers - List the roster
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Page<Provider>>, AppError> {
    session.require_staff()?;

    let providers = state.db.list_providers()?;

    state.db.log_audit(
        &session.email,
        "list",
        Some("provider"),
        None,
        Some(&format!("count={}", providers.len())),
    )?;

    Ok(Json(Page::from_items(providers)))
}

/// GET /api/providers/:id - A provider with its links
pub async fn get_provider(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<Json<ProviderWithLinks>, AppError> {
    session.require_staff()?;

    let provider = state
        .db
        .get_provider_with_links(id)?
        .ok_or_else(|| AppError::not_found("Provider not found"))?;

    state
        .db
        .log_audit(&session.email, "view", Some("provider"), Some(id), None)?;

    Ok(Json(provider))
}

/// POST /api/providers/:id/archive - Mark a provider inactive
///
/// Archived providers keep their history and still match on re-uploads.
pub async fn archive_provider(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<Json<Provider>, AppError> {
    set_active(&state, &session, id, false)
}

/// POST /api/providers/:id/unarchive - Mark a provider active again
pub async fn unarchive_provider(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<Json<Provider>, AppError> {
    set_active(&state, &session, id, true)
}

fn set_active(
    state: &AppState,
    session: &Session,
    id: i64,
    active: bool,
) -> Result<Json<Provider>, AppError> {
    session.require_staff()?;

    state.db.set_provider_active(id, active)?;
    let provider = state
        .db
        .get_provider(id)?
        .ok_or_else(|| AppError::not_found("Provider not found"))?;

    let action = if active { "unarchive" } else { "archive" };
    state
        .db
        .log_audit(&session.email, action, Some("provider"), Some(id), None)?;

    Ok(Json(provider))
}

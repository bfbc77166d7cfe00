//! Authentication-related handlers

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{AppState, Session};
use zorah_core::models::Role;

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    /// The authenticated user's email or identifier
    pub user: String,
    pub role: Role,
    /// How the user was authenticated
    pub auth_method: String,
}

/// Get the currently authenticated user
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Json<MeResponse> {
    let auth_method = if state.config.require_auth {
        "api_key"
    } else {
        "none"
    };

    Json(MeResponse {
        user: session.email,
        role: session.role,
        auth_method: auth_method.to_string(),
    })
}

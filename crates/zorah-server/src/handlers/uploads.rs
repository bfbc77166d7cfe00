//! Upload handlers - preview a monthly spreadsheet, then commit or discard it
//!
//! A preview is kept in memory under an upload id until it is committed,
//! discarded or expires. Nothing is written to the roster before commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{AppError, AppState, Session, SuccessResponse, MAX_PAGE_LIMIT, MAX_UPLOAD_SIZE};
use zorah_core::{
    build_preview,
    import::{parse_roster_csv, upload_fingerprint},
    models::{CommitResult, Page, ReconciliationPreview, ReferenceMonth},
    Error as CoreError, UploadBatch,
};

/// Pending previews expire after 30 minutes
const PENDING_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A preview awaiting confirmation
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub fingerprint: String,
    pub created_by: String,
    pub created_at: Instant,
    pub preview: ReconciliationPreview,
}

impl PendingUpload {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > PENDING_TIMEOUT
    }
}

/// In-memory store of pending previews
#[derive(Debug, Default)]
pub struct PendingUploads {
    uploads: RwLock<HashMap<String, PendingUpload>>,
    counter: AtomicU64,
}

impl PendingUploads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a preview and return its upload id
    pub async fn insert(
        &self,
        fingerprint: &str,
        created_by: &str,
        preview: ReconciliationPreview,
    ) -> String {
        // Unique per insert even when the same file is previewed twice
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        hasher.update(timestamp.to_le_bytes());
        hasher.update(seq.to_le_bytes());
        let upload_id = format!("upl_{:x}", hasher.finalize())[..28].to_string();

        let mut uploads = self.uploads.write().await;

        // Clean up expired previews while we're here
        uploads.retain(|_, u| !u.is_expired());

        uploads.insert(
            upload_id.clone(),
            PendingUpload {
                fingerprint: fingerprint.to_string(),
                created_by: created_by.to_string(),
                created_at: Instant::now(),
                preview,
            },
        );
        upload_id
    }

    /// Get a pending preview (None if not found or expired)
    pub async fn get(&self, upload_id: &str) -> Option<PendingUpload> {
        let uploads = self.uploads.read().await;
        uploads
            .get(upload_id)
            .filter(|u| !u.is_expired())
            .cloned()
    }

    /// Remove a pending preview
    pub async fn remove(&self, upload_id: &str) -> bool {
        let mut uploads = self.uploads.write().await;
        uploads.remove(upload_id).is_some()
    }
}

/// Response for the preview endpoint
#[derive(Serialize)]
pub struct PreviewResponse {
    pub upload_id: String,
    pub preview: ReconciliationPreview,
    /// The same file was already committed for this month; commit will fail
    pub already_committed: bool,
}

/// POST /api/uploads/preview - Diff a monthly spreadsheet against the roster
///
/// Expects multipart form with:
/// - file: CSV export of the monthly sheet (required, max 10MB)
/// - month: reference month, 1-12 (required)
/// - year: reference year (required)
pub async fn preview_upload(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> Result<Json<PreviewResponse>, AppError> {
    session.require_staff()?;

    let mut file_data: Option<Vec<u8>> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;

    // Extract fields from multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;

                // Check file size limit
                if bytes.len() > MAX_UPLOAD_SIZE {
                    return Err(AppError::bad_request(&format!(
                        "File too large. Maximum size is {} MB",
                        MAX_UPLOAD_SIZE / 1024 / 1024
                    )));
                }

                file_data = Some(bytes.to_vec());
            }
            "month" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read month"))?;
                month = Some(value.trim().parse().map_err(|_| {
                    AppError::bad_request(&format!("Invalid month: {}", value))
                })?);
            }
            "year" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read year"))?;
                year = Some(value.trim().parse().map_err(|_| {
                    AppError::bad_request(&format!("Invalid year: {}", value))
                })?);
            }
            _ => {}
        }
    }

    // Validate required fields
    let file_data = file_data.ok_or_else(|| AppError::bad_request("Missing file field"))?;
    let month = month.ok_or_else(|| AppError::bad_request("Missing month field"))?;
    let year = year.ok_or_else(|| AppError::bad_request("Missing year field"))?;
    let reference_month =
        ReferenceMonth::new(month, year).map_err(|e| AppError::bad_request(&e))?;

    let rows = parse_roster_csv(file_data.as_slice()).map_err(|e| match e {
        CoreError::Import(msg) => AppError::bad_request(&msg),
        other => AppError::bad_request(&format!("Invalid spreadsheet: {}", other)),
    })?;

    let roster = state.db.load_roster()?;
    let preview = build_preview(&rows, &roster, reference_month);
    let fingerprint = upload_fingerprint(&file_data, reference_month);
    let already_committed = state.db.is_upload_committed(&fingerprint)?;

    debug!(
        rows = rows.len(),
        new = preview.summary.new_count,
        existing = preview.summary.existing_count,
        errors = preview.summary.error_count,
        "Built upload preview for {}",
        reference_month
    );

    state.db.log_audit(
        &session.email,
        "upload_preview",
        Some("upload"),
        None,
        Some(&format!(
            "month={}, rows={}, new={}, existing={}, errors={}",
            reference_month,
            rows.len(),
            preview.summary.new_count,
            preview.summary.existing_count,
            preview.summary.error_count
        )),
    )?;

    let upload_id = state
        .pending
        .insert(&fingerprint, &session.email, preview.clone())
        .await;

    Ok(Json(PreviewResponse {
        upload_id,
        preview,
        already_committed,
    }))
}

/// Response for a pending preview lookup
#[derive(Serialize)]
pub struct PendingUploadResponse {
    pub upload_id: String,
    pub created_by: String,
    pub preview: ReconciliationPreview,
}

/// GET /api/uploads/:upload_id - Show a pending preview again
pub async fn get_pending_upload(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(upload_id): Path<String>,
) -> Result<Json<PendingUploadResponse>, AppError> {
    session.require_staff()?;

    let pending = state
        .pending
        .get(&upload_id)
        .await
        .ok_or_else(|| AppError::not_found("Upload preview not found or expired"))?;

    Ok(Json(PendingUploadResponse {
        upload_id,
        created_by: pending.created_by,
        preview: pending.preview,
    }))
}

/// POST /api/uploads/:upload_id/commit - Commit a confirmed preview
pub async fn commit_upload(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(upload_id): Path<String>,
) -> Result<Json<CommitResult>, AppError> {
    session.require_staff()?;

    let pending = state
        .pending
        .get(&upload_id)
        .await
        .ok_or_else(|| AppError::not_found("Upload preview not found or expired"))?;

    let result = match state
        .db
        .commit_preview(&pending.preview, &pending.fingerprint, &session.email)
    {
        Ok(result) => result,
        Err(CoreError::Conflict(msg)) => {
            // A stale or duplicate preview can never succeed; force a new one
            state.pending.remove(&upload_id).await;
            return Err(AppError::conflict(&msg));
        }
        Err(e) => return Err(e.into()),
    };

    state.pending.remove(&upload_id).await;

    info!(
        batch_id = result.batch_id,
        user = %session.email,
        "Upload {} committed",
        upload_id
    );

    state.db.log_audit(
        &session.email,
        "upload_commit",
        Some("upload_batch"),
        Some(result.batch_id),
        Some(&format!(
            "month={}, providers_created={}, links_created={}, entries_recorded={}",
            pending.preview.summary.reference_month,
            result.providers_created,
            result.links_created,
            result.entries_recorded
        )),
    )?;

    Ok(Json(result))
}

/// DELETE /api/uploads/:upload_id - Discard a pending preview
pub async fn discard_upload(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(upload_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    session.require_staff()?;

    if !state.pending.remove(&upload_id).await {
        return Err(AppError::not_found("Upload preview not found or expired"));
    }

    state.db.log_audit(
        &session.email,
        "upload_discard",
        Some("upload"),
        None,
        Some(&upload_id),
    )?;

    Ok(Json(SuccessResponse { success: true }))
}

/// Query parameters for upload history
#[derive(Debug, Deserialize)]
pub struct UploadHistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

/// GET /api/uploads/history - Committed uploads, newest first
pub async fn list_upload_history(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<UploadHistoryQuery>,
) -> Result<Json<Page<UploadBatch>>, AppError> {
    session.require_staff()?;
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let batches = state.db.list_upload_batches(limit)?;

    state.db.log_audit(
        &session.email,
        "list",
        Some("upload_batch"),
        None,
        Some(&format!("limit={}, count={}", limit, batches.len())),
    )?;

    Ok(Json(Page::from_items(batches)))
}

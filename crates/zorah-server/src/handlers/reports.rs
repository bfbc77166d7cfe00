//! Custom report handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Response, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, Session};
use zorah_core::{
    compute_totals, export_report_csv, group_providers,
    models::{ProviderGroup, ProviderGroupReport, ReferenceMonth, ReportPeriod, TotalsSummary},
};

/// Query parameters for the custom report
#[derive(Debug, Deserialize)]
pub struct CustomReportQuery {
    /// First month (YYYY-MM)
    pub from: Option<String>,
    /// Last month (YYYY-MM), defaults to `from`
    pub to: Option<String>,
    /// Merge every link sharing an email into one row
    #[serde(default)]
    pub group_by_email: bool,
    /// Restrict to one provider (staff only)
    pub email: Option<String>,
}

/// Custom report response
#[derive(Serialize)]
pub struct CustomReportResponse {
    pub period: ReportPeriod,
    pub grouped: bool,
    pub groups: Vec<ProviderGroupReport>,
    pub totals: TotalsSummary,
}

fn parse_month(value: &str, name: &str) -> Result<ReferenceMonth, AppError> {
    value.parse().map_err(|e: String| {
        AppError::bad_request(&format!("Invalid '{}' month ({}); use YYYY-MM", name, e))
    })
}

/// Resolve the period and the email filter, then load and aggregate
fn build_report(
    state: &AppState,
    session: &Session,
    params: &CustomReportQuery,
) -> Result<(ReportPeriod, Vec<ProviderGroup>, TotalsSummary), AppError> {
    let from = params
        .from
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Missing 'from' month (YYYY-MM)"))?;
    let from = parse_month(from, "from")?;
    let to = match params.to.as_deref() {
        Some(to) => parse_month(to, "to")?,
        None => from,
    };
    let period = ReportPeriod::new(from, to).map_err(|e| AppError::bad_request(&e))?;

    // Prestadores only ever see their own figures
    let email = if session.role.is_staff() {
        params.email.clone().filter(|e| !e.trim().is_empty())
    } else {
        Some(session.email.clone())
    };

    let groups = state.db.load_report_groups(&period, email.as_deref())?;
    let groups = group_providers(groups, params.group_by_email);
    let totals = compute_totals(&groups);

    Ok((period, groups, totals))
}

/// GET /api/reports/custom - Payments and billing per provider over a period
pub async fn report_custom(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<CustomReportQuery>,
) -> Result<Json<CustomReportResponse>, AppError> {
    let (period, groups, totals) = build_report(&state, &session, &params)?;

    state.db.log_audit(
        &session.email,
        "report",
        Some("custom_report"),
        None,
        Some(&format!(
            "from={}, to={}, group_by_email={}, email={:?}, groups={}",
            period.from,
            period.to,
            params.group_by_email,
            params.email,
            groups.len()
        )),
    )?;

    Ok(Json(CustomReportResponse {
        period,
        grouped: params.group_by_email,
        groups: groups.into_iter().map(ProviderGroupReport::from).collect(),
        totals,
    }))
}

/// GET /api/reports/custom/export - The custom report as CSV
pub async fn export_report_custom(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<CustomReportQuery>,
) -> Result<Response<Body>, AppError> {
    let (period, groups, totals) = build_report(&state, &session, &params)?;

    let mut csv = Vec::new();
    export_report_csv(&groups, &totals, &mut csv)?;
    info!("Exported custom report with {} rows", groups.len());

    state.db.log_audit(
        &session.email,
        "export_report",
        Some("custom_report"),
        None,
        Some(&format!(
            "from={}, to={}, group_by_email={}, groups={}",
            period.from,
            period.to,
            params.group_by_email,
            groups.len()
        )),
    )?;

    let filename = format!(
        "report_{}-{:02}_{}-{:02}.csv",
        period.from.year, period.from.month, period.to.year, period.to.month
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(csv))
        .map_err(|e| AppError::internal(&e.to_string()))
}

use crate::backend::BackendError;
use crate::report::{render_monthly_page, render_today_page};
use crate::server::SharedState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ReportRouteError {
    #[error("Failed to load report: {0}")]
    Backend(#[from] BackendError),
}

impl IntoResponse for ReportRouteError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, self.to_string()).into_response()
    }
}

/// One-shot fetch-and-render; no retry, a failure surfaces as-is.
#[instrument(skip(state))]
pub async fn today_report(
    State(state): State<SharedState>,
) -> Result<Html<String>, ReportRouteError> {
    let report = state.backend.fetch_today_report().await?;
    Ok(Html(render_today_page(&report)))
}

#[derive(Debug, Deserialize)]
pub struct MonthlyParams {
    year: Option<u16>,
    month: Option<u8>,
}

#[instrument(skip(state))]
pub async fn monthly_report(
    State(state): State<SharedState>,
    Query(params): Query<MonthlyParams>,
) -> Result<Html<String>, ReportRouteError> {
    let report = state
        .backend
        .fetch_monthly_report(params.year, params.month)
        .await?;
    Ok(Html(render_monthly_page(&report)))
}

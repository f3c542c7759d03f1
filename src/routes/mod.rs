mod detections;
mod enroll;
mod health;
mod metrics;
mod report;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api/detections", get(detections::current_detections))
        .route("/api/enroll/register", post(enroll::register))
        .route("/api/enroll/capture", post(enroll::capture))
        .route("/api/enroll/session", get(enroll::session_status))
        .route("/reports/today", get(report::today_report))
        .route("/reports/monthly", get(report::monthly_report))
}

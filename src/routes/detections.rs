use crate::reconcile::{DetectionRecord, DetectionView};
use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::Serialize;
use std::time::Instant;

#[derive(Serialize)]
pub struct DetectionsResponse {
    detected: Vec<DetectionRecord>,
}

/// The current detection view. An empty `detected` list means no one is
/// present (after the hold window has lapsed), matching the recognition
/// endpoint's own wire shape.
pub async fn current_detections(State(state): State<SharedState>) -> Json<DetectionsResponse> {
    let view = state.engine.lock().current_view(Instant::now());

    let detected = match view {
        DetectionView::Empty => vec![],
        DetectionView::Detected { records, .. } => records,
    };

    Json(DetectionsResponse { detected })
}

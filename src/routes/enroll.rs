use crate::backend::BackendError;
use crate::camera::CameraError;
use crate::enrollment::{EnrollmentError, FacultyId, RegistrationForm};
use crate::server::SharedState;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum EnrollRouteError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error("Camera is not ready")]
    CameraNotReady,
    #[error("Camera failed: {0}")]
    Camera(#[from] CameraError),
    #[error("Backend failed: {0}")]
    Backend(#[from] BackendError),
}

impl IntoResponse for EnrollRouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            EnrollRouteError::Enrollment(EnrollmentError::Validation { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EnrollRouteError::Enrollment(EnrollmentError::NotRegistered) => StatusCode::CONFLICT,
            EnrollRouteError::CameraNotReady | EnrollRouteError::Camera(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            EnrollRouteError::Backend(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    faculty_id: FacultyId,
}

#[derive(Serialize)]
pub struct CaptureResponse {
    captured: u32,
}

#[derive(Serialize)]
pub struct SessionResponse {
    registered: bool,
    faculty_id: Option<FacultyId>,
    captured: u32,
}

/// Phase one: validate locally, register upstream, store the returned id as
/// the only valid capture target. Invalid forms never reach the backend.
#[instrument(skip(state, form), fields(faculty_code = %form.faculty_code))]
pub async fn register(
    State(state): State<SharedState>,
    Form(form): Form<RegistrationForm>,
) -> Result<Json<RegisterResponse>, EnrollRouteError> {
    let registration = form.validate()?;

    let faculty_id = state.backend.register(&registration).await?;
    state.session.lock().begin(faculty_id);
    tracing::info!(%faculty_id, "Registered new faculty");

    Ok(Json(RegisterResponse { faculty_id }))
}

/// Phase two: one frame per user action, tagged with the stored identity.
/// Rejected outright when no registration happened yet.
#[instrument(skip(state))]
pub async fn capture(
    State(state): State<SharedState>,
) -> Result<Json<CaptureResponse>, EnrollRouteError> {
    let faculty_id = state.session.lock().capture_target()?;

    let frame = state
        .camera
        .current_frame()
        .await?
        .ok_or(EnrollRouteError::CameraNotReady)?;

    state.backend.upload_reference_image(faculty_id, frame).await?;

    let captured = state.session.lock().record_capture();
    tracing::info!(%faculty_id, captured, "Stored reference image");

    Ok(Json(CaptureResponse { captured }))
}

pub async fn session_status(State(state): State<SharedState>) -> Json<SessionResponse> {
    let session = state.session.lock();
    Json(SessionResponse {
        registered: session.faculty_id().is_some(),
        faculty_id: session.faculty_id(),
        captured: session.captured(),
    })
}

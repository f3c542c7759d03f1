use crate::camera::Frame;
use crate::config::BackendConfig;
use crate::enrollment::{FacultyId, ValidRegistration};
use crate::reconcile::DetectionRecord;
use crate::report::{MonthlyReport, TodayReport};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request to attendance backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Attendance backend rejected the request: {0}")]
    Rejected(String),
    #[error("Attendance backend returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// The one call the sampling loop depends on, kept behind a trait so the
/// loop can be driven by a scripted recognizer in tests.
#[async_trait]
pub trait RecognitionApi: Send + Sync + 'static {
    async fn recognize(&self, frame: Frame) -> Result<Vec<DetectionRecord>, BackendError>;
}

/// HTTP client for the remote recognition/attendance service.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    detected: Vec<DetectionRecord>,
}

#[derive(Deserialize)]
struct RegisterResponse {
    faculty_id: FacultyId,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.get_base_url(),
        }
    }

    async fn rejection(response: reqwest::Response) -> BackendError {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => BackendError::Rejected(body.error),
            Err(_) => BackendError::Rejected(format!("status {}", status)),
        }
    }

    fn frame_part(frame: Frame) -> reqwest::multipart::Part {
        reqwest::multipart::Part::bytes(frame.bytes.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .expect("static mime type is valid")
    }

    /// Registers a new identity; the returned id is the only valid target
    /// for subsequent reference image uploads.
    #[instrument(skip(self, registration), fields(faculty_code = %registration.faculty_code))]
    pub async fn register(
        &self,
        registration: &ValidRegistration,
    ) -> Result<FacultyId, BackendError> {
        let form = reqwest::multipart::Form::new()
            .text("faculty_code", registration.faculty_code.clone())
            .text("name", registration.name.clone())
            .text("department", registration.department.clone())
            .text("email", registration.email.clone())
            .text("phone", registration.phone.clone());

        let response = self
            .client
            .post(format!("{}/api/faculty/register", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(body.faculty_id)
    }

    /// Attaches one reference image to a registered identity.
    /// Acknowledgement only; the backend may reject the image (e.g. no face
    /// found in it), which surfaces as `Rejected`.
    #[instrument(skip(self, frame))]
    pub async fn upload_reference_image(
        &self,
        faculty_id: FacultyId,
        frame: Frame,
    ) -> Result<(), BackendError> {
        let form = reqwest::multipart::Form::new().part("image", Self::frame_part(frame));

        let response = self
            .client
            .post(format!(
                "{}/api/faculty/{}/upload_image",
                self.base_url, faculty_id
            ))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch_today_report(&self) -> Result<TodayReport, BackendError> {
        let response = self
            .client
            .get(format!("{}/api/reports/today", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    /// Omitted parameters default to the current year/month on the backend.
    #[instrument(skip(self))]
    pub async fn fetch_monthly_report(
        &self,
        year: Option<u16>,
        month: Option<u8>,
    ) -> Result<MonthlyReport, BackendError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }
        if let Some(month) = month {
            query.push(("month", month.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/api/reports/monthly", self.base_url))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RecognitionApi for BackendClient {
    /// Submits one frame for recognition. An empty `detected` list is a
    /// normal outcome, not an error.
    #[instrument(skip(self, frame))]
    async fn recognize(&self, frame: Frame) -> Result<Vec<DetectionRecord>, BackendError> {
        let form = reqwest::multipart::Form::new().part("frame", Self::frame_part(frame));

        let response = self
            .client
            .post(format!("{}/api/recognize", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(body.detected)
    }
}

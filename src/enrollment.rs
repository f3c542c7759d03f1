use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identity handle returned by the registration endpoint. Phase two
/// operations take it explicitly; nothing else identifies an enrollee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacultyId(pub i64);

impl fmt::Display for FacultyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum EnrollmentError {
    #[error("Required fields missing: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },
    #[error("No identity registered yet; register before capturing images")]
    NotRegistered,
}

/// Raw registration input as submitted by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub faculty_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// A registration that passed client-side validation and may be submitted.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub faculty_code: String,
    pub name: String,
    pub department: String,
    pub email: String,
    pub phone: String,
}

impl RegistrationForm {
    /// Validates required fields before any request is sent. Code, name and
    /// department are mandatory; email and phone are optional.
    pub fn validate(&self) -> Result<ValidRegistration, EnrollmentError> {
        let mut missing = Vec::new();
        if self.faculty_code.trim().is_empty() {
            missing.push("faculty_code");
        }
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.department.trim().is_empty() {
            missing.push("department");
        }
        if !missing.is_empty() {
            return Err(EnrollmentError::Validation { missing });
        }

        Ok(ValidRegistration {
            faculty_code: self.faculty_code.trim().to_string(),
            name: self.name.trim().to_string(),
            department: self.department.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        })
    }
}

/// State of the enrollment screen: which identity captures are attached to,
/// and how many reference images were accepted so far. The server remains
/// the source of truth for the count; this is display bookkeeping only.
#[derive(Debug, Default)]
pub struct EnrollmentSession {
    faculty_id: Option<FacultyId>,
    captured: u32,
}

impl EnrollmentSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh registration replaces any previous one; the capture counter
    /// starts over for the new identity.
    pub fn begin(&mut self, faculty_id: FacultyId) {
        self.faculty_id = Some(faculty_id);
        self.captured = 0;
    }

    /// Capture is rejected, not queued, until an identity is registered.
    pub fn capture_target(&self) -> Result<FacultyId, EnrollmentError> {
        self.faculty_id.ok_or(EnrollmentError::NotRegistered)
    }

    pub fn record_capture(&mut self) -> u32 {
        self.captured += 1;
        self.captured
    }

    pub fn faculty_id(&self) -> Option<FacultyId> {
        self.faculty_id
    }

    pub fn captured(&self) -> u32 {
        self.captured
    }
}

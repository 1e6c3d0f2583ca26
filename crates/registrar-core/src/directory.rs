//! Directory service port.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::EnrollmentError;
use crate::ids::StudentId;

/// Errors surfaced by a directory client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Network failure, timeout, or 5xx.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    /// Whether retrying the same lookup may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<DirectoryError> for EnrollmentError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unavailable(msg) => Self::DirectoryUnavailable(msg),
        }
    }
}

/// Read-only view onto the student directory.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Returns whether the directory knows `student_id`.
    async fn student_exists(&self, student_id: &StudentId) -> Result<bool, DirectoryError>;
}

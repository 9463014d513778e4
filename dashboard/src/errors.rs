//! Error types for the deployment dashboard

use thiserror::Error;

/// Outcome of a failed deployment submission.
///
/// Returned to the caller of a submission and never thrown past it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Enter repo URL")]
    EmptyInput,

    #[error("Deployment failed: {reason}")]
    SubmissionFailed { reason: String },
}

impl SubmissionError {
    pub fn failed(reason: impl Into<String>) -> Self {
        SubmissionError::SubmissionFailed {
            reason: reason.into(),
        }
    }

    /// The backend-supplied or transport-derived reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            SubmissionError::EmptyInput => None,
            SubmissionError::SubmissionFailed { reason } => Some(reason),
        }
    }
}

/// Main error type for the dashboard
#[derive(Error, Debug)]
pub enum DashError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

//! Advisory collaborator error types

use thiserror::Error;

/// Errors raised while consulting the advisory collaborator
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("Advisor is disabled (no API key configured)")]
    Disabled,

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdvisorError {
    /// Whether the advisor is simply not configured, as opposed to broken
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AdvisorError::Disabled)
    }
}

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Tool error: {tool} - {message}")]
    ToolError {
        tool: String,
        message: String,
    },

    #[error("No tools could be registered")]
    NoToolsRegistered,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid session transition for {session_id}: {message}")]
    InvalidTransition {
        session_id: String,
        message: String,
    },

    #[error("Run cancelled before completion: {session_id}")]
    Cancelled {
        session_id: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("External tool error: {tool} - {message}")]
    ExternalToolError {
        tool: String,
        message: String,
    },

    #[error("Timed out after {timeout:?}")]
    TimeoutError {
        tool: String,
        timeout: Duration,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl From<anyhow::Error> for ReconError {
    fn from(error: anyhow::Error) -> Self {
        ReconError::UnexpectedError(format!("{:#}", error))
    }
}

pub type ReconResult<T> = std::result::Result<T, ReconError>;

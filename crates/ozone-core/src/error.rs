//! Error types for the Ozone shell core.
//!
//! Each collaborator boundary gets its own enum so callers can tell a missing
//! panel module apart from an unreachable backend. None of these are allowed to
//! escape `handle_submit` or a poller iteration; they are logged or converted
//! into a visible transcript entry instead.

use thiserror::Error;

use crate::registry::PipelineId;

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failure of any request/response call across the backend boundary.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("pipeline {pipeline_id} failed: {message}")]
    Pipeline {
        pipeline_id: PipelineId,
        message: String,
    },

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("orchestration entry point unavailable")]
    OrchestrationUnavailable,

    #[error("orchestration failed: {0}")]
    Orchestration(String),
}

impl BackendError {
    /// Human-readable message suitable for a transcript entry.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Unreachable(_) => {
                "I couldn't reach the backend. Please check the connection and try again.".to_string()
            }
            BackendError::Rejected { message, .. }
            | BackendError::Pipeline { message, .. }
            | BackendError::Orchestration(message) => {
                format!("Something went wrong: {}", message)
            }
            BackendError::Decode(_) => "The backend sent a response I couldn't read.".to_string(),
            BackendError::OrchestrationUnavailable => {
                "The orchestration service is not available right now.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BackendError::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// Failure to resolve or instantiate a panel module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("no UI module registered for pipeline {0}")]
    NotFound(PipelineId),

    #[error("module for pipeline {pipeline_id} is malformed: {reason}")]
    Malformed {
        pipeline_id: PipelineId,
        reason: String,
    },

    #[error("module for pipeline {pipeline_id} failed to instantiate: {reason}")]
    Instantiation {
        pipeline_id: PipelineId,
        reason: String,
    },
}

/// Result type alias for voice operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Failure inside the voice bridge (capture or playback).
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("audio playback error: {0}")]
    Playback(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Top-level error for shell construction.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("core panel for pipeline {pipeline_id} could not be mounted: {reason}")]
    CorePanel {
        pipeline_id: PipelineId,
        reason: String,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

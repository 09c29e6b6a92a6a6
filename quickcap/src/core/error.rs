//! QuickCap Error Definitions
//!
//! Defines the aggregate error type of the caption pipeline.

use thiserror::Error;

use super::captions::{TranscriptError, WhisperError};
use super::ffmpeg::FFmpegError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // =========================================================================
    // Transcription Errors
    // =========================================================================
    #[error("Transcription failed: {0}")]
    Transcription(String),

    // =========================================================================
    // Render Errors
    // =========================================================================
    #[error("Caption render failed: {0}")]
    RenderFailed(String),

    #[error(transparent)]
    Compositor(#[from] FFmpegError),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl From<WhisperError> for CoreError {
    fn from(err: WhisperError) -> Self {
        CoreError::Transcription(err.to_string())
    }
}

impl From<TranscriptError> for CoreError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::NotFound(path) => CoreError::FileNotFound(path),
            other => CoreError::Transcription(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::TaskJoin(err.to_string())
    }
}

impl CoreError {
    /// Returns true for errors caused by the caller's input rather than the system
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidInput(_)
                | CoreError::FileNotFound(_)
                | CoreError::Compositor(FFmpegError::InvalidInput(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compositor_error_is_transparent() {
        let err: CoreError = FFmpegError::Timeout.into();
        assert!(err.to_string().contains("Timeout"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_input_errors() {
        assert!(CoreError::InvalidInput("no video".into()).is_input_error());
        let probe_rejection: CoreError = FFmpegError::InvalidInput("corrupt".into()).into();
        assert!(probe_rejection.is_input_error());
        assert!(!CoreError::Transcription("model".into()).is_input_error());
    }
}

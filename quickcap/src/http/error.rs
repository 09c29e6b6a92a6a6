use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::core::CoreError;

/// Error body returned by every route: `{"error": message}`
#[derive(Debug)]
pub enum HttpError {
    Validation { message: String },
    Rejected { status: StatusCode, message: String },
    Upstream { message: String },
    Internal { message: String },
}

impl HttpError {
    pub fn validation(message: impl Into<String>) -> Self {
        HttpError::Validation {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HttpError::Rejected { status, .. } => *status,
            HttpError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            HttpError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            HttpError::Validation { message }
            | HttpError::Rejected { message, .. }
            | HttpError::Upstream { message }
            | HttpError::Internal { message } => message,
        };

        (
            status,
            Json(json!({
                "error": message,
            })),
        )
            .into_response()
    }
}

impl From<CoreError> for HttpError {
    fn from(error: CoreError) -> Self {
        if error.is_input_error() {
            return HttpError::Validation {
                message: error.to_string(),
            };
        }
        match error {
            CoreError::Transcription(_) => HttpError::Upstream {
                message: error.to_string(),
            },
            _ => HttpError::Internal {
                message: error.to_string(),
            },
        }
    }
}

impl From<MultipartError> for HttpError {
    fn from(error: MultipartError) -> Self {
        HttpError::Rejected {
            status: error.status(),
            message: error.body_text(),
        }
    }
}

impl From<std::io::Error> for HttpError {
    fn from(error: std::io::Error) -> Self {
        CoreError::from(error).into()
    }
}

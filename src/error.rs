use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{BytesRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error};

use crate::engine::EngineError;

/// Everything a route handler can fail with, mapped onto a status code.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request itself is unusable: missing body, field or parameter.
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("image worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl AppError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::Decode(_) | EngineError::FontNotFound(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Engine(_) | Self::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        Self::BadRequest(format!(
            "Failed to read image data from request: {}",
            rejection.body_text()
        ))
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "image request failed");
        } else {
            debug!(error = %self, "rejected image request");
        }
        (status, self.to_string()).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{config::ConfigError, labels::LabelError, model::ModelError, utils::DownloadError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No file uploaded.")]
    MissingUpload,
    #[error("Invalid image: {0}")]
    InvalidImage(#[source] image::ImageError),
    #[error("Image too large.")]
    TooLarge,
    #[error("Malformed multipart request: {0}")]
    Multipart(String),
    #[error("Inference failed: {0}")]
    Inference(#[from] ModelError),
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingUpload | AppError::InvalidImage(_) | AppError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Inference(_) | AppError::Encode(_) | AppError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "rejected upload");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Anything that stops the service from coming up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Labels(#[from] LabelError),
    #[error("failed to load model: {0}")]
    Model(#[from] ModelError),
    #[error("static asset directory {0} not found")]
    MissingStaticDir(String),
    #[error("server error: {0}")]
    Server(String),
}

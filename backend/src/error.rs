use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use shared::{ErrorResponse, ImageExtension, ProcessingErrorResponse};
use std::path::PathBuf;

use crate::detector::runner::DetectorError;
use crate::storage::staging::StagingError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file format. Only {} are allowed.", ImageExtension::allowed())]
    InvalidFormat,
    #[error("Uploaded file exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
    #[error("Invalid detection id: {0}")]
    InvalidDetectionId(String),
    #[error("Error occurred during processing.")]
    Detection { stderr: String, stdout: String },
    #[error("Detector timed out after {0} seconds")]
    DetectorTimeout(u64),
    #[error("Detector could not be started: {0}")]
    DetectorUnavailable(String),
    #[error("Detector produced no annotated image")]
    MissingOutput(PathBuf),
    #[error("No pending detection results")]
    NoPendingResults,
    #[error("No pending results for detection {0}")]
    UnknownDetection(uuid::Uuid),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StagingError> for GatewayError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::InvalidFormat => GatewayError::InvalidFormat,
            StagingError::FileTooLarge(limit) => GatewayError::PayloadTooLarge(limit),
            StagingError::Io(e) => GatewayError::Io(e),
        }
    }
}

impl From<DetectorError> for GatewayError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Failed { stderr, stdout, .. } => GatewayError::Detection { stderr, stdout },
            DetectorError::Timeout(secs) => GatewayError::DetectorTimeout(secs),
            other => GatewayError::DetectorUnavailable(other.to_string()),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoFilePart
            | GatewayError::NoSelectedFile
            | GatewayError::InvalidFormat
            | GatewayError::MalformedUpload(_)
            | GatewayError::InvalidDetectionId(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NoPendingResults | GatewayError::UnknownDetection(_) => StatusCode::NOT_FOUND,
            GatewayError::DetectorTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Detection { .. }
            | GatewayError::DetectorUnavailable(_)
            | GatewayError::MissingOutput(_)
            | GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        match self {
            GatewayError::Detection { stderr, stdout } => {
                HttpResponse::build(status).json(ProcessingErrorResponse {
                    message: self.to_string(),
                    error: stderr.clone(),
                    output: stdout.clone(),
                })
            }
            GatewayError::MissingOutput(path) => {
                error!("Expected detector output at {}", path.display());
                HttpResponse::build(status).json(ErrorResponse::new(self.to_string()))
            }
            // Filesystem details stay in the log.
            GatewayError::Io(_) => {
                HttpResponse::build(status).json(ErrorResponse::new("Internal server error"))
            }
            _ => HttpResponse::build(status).json(ErrorResponse::new(self.to_string())),
        }
    }
}

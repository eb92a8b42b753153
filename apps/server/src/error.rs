use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use uppe_service::{IngestError, StoreError, ValidationError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(#[from] uppe_service::config::Error),
    #[error("Startup failed: {0:#}")]
    Startup(#[from] anyhow::Error),
}

/// Errors a request handler answers with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { field: Option<&'static str>, message: String },
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    field: Option<&'a str>,
}

impl ApiError {
    pub fn bad_request(field: &'static str, message: impl ToString) -> Self {
        Self::BadRequest { field: Some(field), message: message.to_string() }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest { field: Some(err.field), message: err.to_string() }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(e) => e.into(),
            IngestError::Store(e) => e.into(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let field = match self {
            ApiError::BadRequest { field, .. } => *field,
            ApiError::Unavailable(e) => {
                tracing::warn!("Request failed on storage: {}", e);
                None
            }
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { error: &self.to_string(), field })
    }
}

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;
use tracing::error;

use crate::blob_store::BlobError;
use crate::db::StoreError;
use crate::models::ImageSlot;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Failed to upload {slot} image: {source}")]
    UploadFailed {
        slot: ImageSlot,
        #[source]
        source: BlobError,
    },

    #[error("Failed to persist program: {0}")]
    PersistFailed(#[source] StoreError),

    #[error("Failed to persist pricing plans: {0}")]
    PlanPersistFailed(#[source] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email error: {0}")]
    Email(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvalidSignature => "invalid_signature",
            AppError::NotFound(_) => "not_found",
            AppError::UploadFailed { .. } => "upload_failed",
            AppError::PersistFailed(_) => "persist_failed",
            AppError::PlanPersistFailed(_) => "plan_persist_failed",
            AppError::Database(_) => "database_error",
            AppError::Email(_) => "email_failed",
            AppError::Serialization(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UploadFailed { .. } | AppError::Email(_) => StatusCode::BAD_GATEWAY,
            AppError::PersistFailed(_)
            | AppError::PlanPersistFailed(_)
            | AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Store and internal failures are logged where they happen; callers get a generic message.
        let message = match self {
            AppError::Database(_) | AppError::Serialization(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.code(),
            message,
        })
    }
}

pub trait TraceErr<T, E> {
    #[track_caller]
    fn trace_err(self, context: &'static str) -> std::result::Result<T, E>;
}

impl<T, E: Display> TraceErr<T, E> for std::result::Result<T, E> {
    #[track_caller]
    fn trace_err(self, context: &'static str) -> std::result::Result<T, E> {
        if let Err(ref e) = self {
            let location = std::panic::Location::caller();
            error!(
                "{}:{}: error in {}: {}",
                location.file(),
                location.line(),
                context,
                e
            );
        }
        self
    }
}

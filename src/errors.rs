use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Uniform `{message}` body every action answers with.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ActionMessage {
    pub message: String,
}

impl ActionMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Please login first")]
    Unauthenticated,

    #[error("Access denied")]
    Forbidden,

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Password error: {0}")]
    PasswordError(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] SqlxError),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, detail)
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join(", "))
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::Validation(format!("Invalid form data: {}", err))
    }
}

impl AppError {
    /// Message that is safe to show the caller. Collaborator failures keep
    /// their details in the log only.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_)
            | AppError::Unauthenticated
            | AppError::Forbidden => self.to_string(),
            _ => "An error occurred".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated | AppError::Forbidden => StatusCode::SEE_OTHER,
            AppError::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::PasswordError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Payment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SqlxError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MigrateError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            // authorization failures send the caller back to a safe page
            AppError::Unauthenticated | AppError::Forbidden => {
                log::warn!("Redirecting unauthorized request: {}", self);
                HttpResponse::SeeOther()
                    .append_header(("Location", "/"))
                    .json(ActionMessage::new(self.public_message()))
            }
            _ => {
                if self.status_code().is_server_error() {
                    log::error!("{}", self);
                }
                HttpResponse::build(self.status_code())
                    .json(ActionMessage::new(self.public_message()))
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

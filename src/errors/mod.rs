use std::io::Error as IoError;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub mod config;
pub mod generator;
pub mod repository;
pub mod service;

pub use config::ConfigError;
pub use generator::{AllocationError, GeneratorError};
pub use repository::RepositoryError;
pub use service::ServiceError;

#[derive(Debug, Error)]
pub enum AppError {
    // Service-level domain errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found error: {0}")]
    NotFound(String),
    #[error("Unavailable error: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
    // Infrastructure/system errors
    #[error("Server error: {0}")]
    Server(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Logger error: {0}")]
    Logger(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<crate::db::DatabaseError> for AppError {
    fn from(e: crate::db::DatabaseError) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Conflict(msg) => AppError::Internal(msg),
            RepositoryError::InvalidData(msg) => AppError::Validation(msg),
            RepositoryError::Database(msg) => AppError::Internal(msg.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MalformedInput(msg) => AppError::Validation(msg),
            ServiceError::NotFoundOrExpired => {
                AppError::NotFound("Short URL not found or expired".to_string())
            }
            ServiceError::NotFound(msg) => AppError::NotFound(msg),
            ServiceError::AllocationExhausted { attempts } => AppError::Unavailable(format!(
                "Could not allocate a free short code after {} attempts",
                attempts
            )),
            ServiceError::Generator(e) => AppError::Internal(e.to_string()),
            ServiceError::Repository(e) => AppError::from(e),
            ServiceError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(flatten_validation_errors(&errors))
    }
}

/// Flatten field errors into a single string
pub fn flatten_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let reasons = errs
                .iter()
                .map(|e| {
                    e.message
                        .clone()
                        .unwrap_or_else(|| e.code.clone())
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: {}", field, reasons)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_)
            | AppError::Server(_)
            | AppError::Config(_)
            | AppError::Logger(_)
            | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_string = self.to_string();
        let (error_type, message) = error_string
            .split_once(':')
            .map(|(t, m)| (t.trim(), m.trim()))
            .unwrap_or(("Error", "An error occurred"));

        let error_message = if message.is_empty() {
            "An error occurred"
        } else {
            message
        };

        let code = self.status_code().as_u16();
        HttpResponse::build(self.status_code()).json(json!({
            "type": error_type.to_uppercase(),
            "message": error_message,
            "status_code": code,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_http_status() {
        let cases = [
            (
                AppError::from(ServiceError::MalformedInput("bad url".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ServiceError::NotFoundOrExpired),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(ServiceError::AllocationExhausted { attempts: 8 }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(ServiceError::Generator(GeneratorError::ClockRegression {
                    last_ms: 10,
                    now_ms: 9,
                })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{}", error);
        }
    }

    #[test]
    fn expired_and_missing_share_one_message() {
        let err = AppError::from(ServiceError::NotFoundOrExpired);
        assert_eq!(err.to_string(), "Not found error: Short URL not found or expired");
    }
}

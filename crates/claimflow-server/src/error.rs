//! Error types for the claimflow server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use claimflow_core::FieldError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation failed with {} error(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Unknown step id: {0}")]
    UnknownStep(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An upstream collaborator (address provider, object store) failed.
    /// Reported with the `{error}` wire shape the lookup endpoints use.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// `{errors: [{field, message}]}` with message keys, the shape every form
/// endpoint reports failures in.
fn errors_body(errors: &[FieldError]) -> Json<serde_json::Value> {
    Json(json!({ "errors": errors }))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                let errors = vec![FieldError {
                    field: "server".into(),
                    message: "Internal server error".into(),
                }];
                (StatusCode::INTERNAL_SERVER_ERROR, errors_body(&errors)).into_response()
            }
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, errors_body(&errors)).into_response()
            }
            AppError::UnknownStep(step) => {
                tracing::debug!("Rejected unknown step id: {}", step);
                let errors = vec![FieldError {
                    field: "stepId".into(),
                    message: "stepId.unknown".into(),
                }];
                (StatusCode::BAD_REQUEST, errors_body(&errors)).into_response()
            }
            AppError::MissingField(field) => {
                let errors = vec![FieldError {
                    field: field.into(),
                    message: format!("{field}.required"),
                }];
                (StatusCode::BAD_REQUEST, errors_body(&errors)).into_response()
            }
            AppError::NotFound(msg) => {
                let errors = vec![FieldError {
                    field: "formId".into(),
                    message: msg,
                }];
                (StatusCode::NOT_FOUND, errors_body(&errors)).into_response()
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": msg })),
                )
                    .into_response()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                let errors = vec![FieldError {
                    field: "server".into(),
                    message: "Internal server error".into(),
                }];
                (StatusCode::INTERNAL_SERVER_ERROR, errors_body(&errors)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let err = AppError::Validation(vec![FieldError {
            field: "phone".into(),
            message: "phone.format".into(),
        }]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_is_sanitized() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unknown_step_is_client_error() {
        let response = AppError::UnknownStep("checkout".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

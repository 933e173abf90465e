//! Address lookup endpoint.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub postcode: String,
}

/// POST /api/address/lookup
///
/// Returns candidate addresses for a postcode. An empty list is a valid
/// answer (the visitor types the address manually); only a provider or
/// transport failure is an error.
pub async fn lookup(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<Value>, AppError> {
    let postcode = request.postcode.trim().to_uppercase();
    if postcode.is_empty() {
        return Err(AppError::Validation(vec![claimflow_core::FieldError {
            field: "postcode".into(),
            message: "currentPostcode.required".into(),
        }]));
    }

    let addresses = state
        .lookup
        .find(&postcode)
        .await
        .map_err(|e| AppError::Upstream(format!("address lookup failed: {e}")))?;

    Ok(Json(json!({ "addresses": addresses })))
}

//! Signature upload endpoint.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use claimflow_core::signature::{object_key, parse_data_url, SignatureError};
use claimflow_core::FieldError;

use crate::error::AppError;
use crate::routes::AppState;
use crate::store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub signature_base64: String,
    pub form_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_url: Option<String>,
}

fn signature_error_key(error: &SignatureError) -> &'static str {
    match error {
        SignatureError::Empty => "signature.required",
        SignatureError::TooLarge(_) => "signature.tooLarge",
        SignatureError::NotAnImage | SignatureError::MalformedBase64 => "signature.invalid",
    }
}

/// POST /api/upload/signature
///
/// Decodes the inline signature, stores a durable copy in the object store
/// and writes both references onto the Form Record. With no object store
/// configured the inline copy is persisted alone and `fileUrl` stays null —
/// the submission pipeline treats that the same as an upload failure and
/// carries on.
pub async fn upload_signature(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    let image = parse_data_url(&request.signature_base64).map_err(|e| {
        AppError::Validation(vec![FieldError {
            field: "signatureBase64".into(),
            message: signature_error_key(&e).into(),
        }])
    })?;

    let file_url = match (&state.signatures, request.form_id) {
        (Some(signatures), form_id) => {
            let key_owner = form_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let key = object_key(&key_owner, Utc::now(), &image.format);
            match signatures.store(&key, image.bytes, &image.format).await {
                Ok(url) => Some(url),
                Err(e) => {
                    return Err(AppError::Upstream(format!("signature upload failed: {e}")))
                }
            }
        }
        (None, _) => {
            tracing::warn!("no signature store configured; keeping signature inline only");
            None
        }
    };

    if let Some(form_id) = request.form_id {
        store::set_signature(
            &state.pool,
            form_id,
            &request.signature_base64,
            file_url.as_deref(),
        )
        .await?;
    } else {
        tracing::warn!("signature upload without form id; skipping record update");
    }

    Ok(Json(UploadResponse {
        success: true,
        file_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_keys() {
        assert_eq!(
            signature_error_key(&SignatureError::Empty),
            "signature.required"
        );
        assert_eq!(
            signature_error_key(&SignatureError::TooLarge(200_000)),
            "signature.tooLarge"
        );
        assert_eq!(
            signature_error_key(&SignatureError::MalformedBase64),
            "signature.invalid"
        );
    }
}

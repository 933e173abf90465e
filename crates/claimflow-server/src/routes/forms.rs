//! Step validation, progress saves and final submission.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use claimflow_core::error::to_field_errors;
use claimflow_core::mapper::{map_lead, DeliveryMeta};
use claimflow_core::schema::contract_for;
use claimflow_core::{StepId, StoragePath};

use crate::error::AppError;
use crate::models::{ConsentRecord, CrmStatus, FormRecord};
use crate::routes::{request_client, AppState};
use crate::services::{resolve_affiliate, DeliveryOutcome};
use crate::store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateStepRequest {
    pub step_id: String,
    pub data: Value,
    pub form_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateStepResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub form_id: Option<Uuid>,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub form_id: Option<Uuid>,
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct FormResponse {
    pub success: bool,
    pub form: FormRecord,
}

/// POST /api/forms/validate-step
///
/// Validates one step's data against its contract and persists it at the
/// step's storage path. Nothing is written on a validation failure. A call
/// without a form id only mints a record once the configured
/// record-creation step is reached, so abandoned postcode-only sessions
/// leave no rows behind.
pub async fn validate_step(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ValidateStepRequest>,
) -> Result<Json<ValidateStepResponse>, AppError> {
    if request.data.is_null() {
        return Err(AppError::MissingField("data"));
    }
    let step = StepId::parse(&request.step_id)
        .ok_or_else(|| AppError::UnknownStep(request.step_id.clone()))?;

    let today = Utc::now().date_naive();
    let mut normalized = contract_for(step)
        .validate(&request.data, today)
        .map_err(|violations| AppError::Validation(to_field_errors(&violations)))?;

    let (ip, user_agent) = request_client(&headers);
    expand_consent(&mut normalized, &ip, &user_agent);

    let meta = json!({ "ip": ip, "userAgent": user_agent, "source": "web" });
    let persisted = store::persist_step(
        &state.pool,
        request.form_id,
        step.storage_path(),
        normalized,
        &meta,
        state.config.may_create_record(step),
    )
    .await?;

    Ok(Json(ValidateStepResponse {
        valid: true,
        form_id: persisted.map(|record| record.id),
    }))
}

/// POST /api/forms/save
///
/// Upserts a `{steps?, final?}` envelope into the record.
pub async fn save_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SaveRequest>,
) -> Result<Json<FormResponse>, AppError> {
    let Value::Object(mut envelope) = request.data else {
        return Err(AppError::Validation(vec![claimflow_core::FieldError {
            field: "data".into(),
            message: "field.invalid".into(),
        }]));
    };
    envelope.retain(|key, _| key == "steps" || key == "final");
    strip_raw_consent(&mut envelope);

    let (ip, user_agent) = request_client(&headers);
    let meta = json!({ "ip": ip, "userAgent": user_agent, "source": "web" });
    let form = store::merge_save(
        &state.pool,
        request.form_id,
        &Value::Object(envelope),
        &meta,
    )
    .await?;

    Ok(Json(FormResponse { success: true, form }))
}

/// POST /api/forms/submit
///
/// Validates the full lead, persists it, then runs the delivery pipeline:
/// affiliate resolution, payload mapping, CRM POST and status write-back.
/// The response reports on the local record — a queued or failed CRM
/// outcome is still a successful submission for the visitor, because the
/// lead is durably captured either way.
pub async fn submit_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<FormResponse>, AppError> {
    let form_id = request.form_id.ok_or(AppError::MissingField("formId"))?;

    let today = Utc::now().date_naive();
    let mut normalized = contract_for(StepId::Final)
        .validate(&request.data, today)
        .map_err(|violations| AppError::Validation(to_field_errors(&violations)))?;

    let (ip, user_agent) = request_client(&headers);
    expand_consent(&mut normalized, &ip, &user_agent);

    let meta = json!({ "ip": ip, "userAgent": user_agent, "source": "web" });
    let record = store::persist_step(
        &state.pool,
        Some(form_id),
        StoragePath::Final,
        normalized,
        &meta,
        true,
    )
    .await?
    .ok_or_else(|| AppError::Internal("submit produced no record".to_string()))?;

    let incoming_aff_id = request
        .data
        .get("aff_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let resolution = resolve_affiliate(
        &state.pool,
        record.aff_id.as_deref(),
        incoming_aff_id,
        &state.config.default_aff_id,
    )
    .await?;

    let attribution_aff_id = resolution
        .requested
        .clone()
        .unwrap_or_else(|| resolution.resolved.clone());
    store::set_affiliate_usage(
        &state.pool,
        record.id,
        &attribution_aff_id,
        resolution.requested.as_deref(),
        &resolution.resolved,
        resolution.was_defaulted,
        resolution.api_id.as_deref(),
        resolution.api_password_ref.as_deref(),
    )
    .await?;

    store::set_crm_status(&state.pool, record.id, CrmStatus::Pending, None).await?;

    let optin_url = request
        .data
        .get("optinurl")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let delivery_meta = DeliveryMeta {
        aff_id: attribution_aff_id,
        user_ip: ip,
        user_agent,
        optin_url,
        landing_at: Some(record.created_at),
        signature_at: None,
        submitted_at: Some(Utc::now()),
        ..DeliveryMeta::default()
    };
    let payload = map_lead(&record.lead_snapshot(), &delivery_meta);

    let outcome = match (&resolution.api_id, &resolution.api_password_ref) {
        (Some(api_id), Some(password_ref)) => {
            state.crm.deliver(&payload, api_id, password_ref).await
        }
        _ => {
            tracing::error!(
                form_id = %record.id,
                attempted = %resolution.resolved,
                "no affiliate credentials, marking delivery failed"
            );
            DeliveryOutcome {
                status: CrmStatus::Failed,
                response: json!({
                    "error": "no affiliate credentials",
                    "attemptedAffId": resolution.resolved,
                }),
            }
        }
    };

    let form = store::set_crm_status(
        &state.pool,
        record.id,
        outcome.status,
        Some(&outcome.response),
    )
    .await?;

    Ok(Json(FormResponse { success: true, form }))
}

/// Replaces a validated boolean consent with the full consent record. A
/// granted consent captures when and from where it was given; a declined
/// one is stored with null acceptance fields, never as a bare boolean.
fn expand_consent(normalized: &mut Map<String, Value>, ip: &str, user_agent: &str) {
    if let Some(Value::Bool(accepted)) = normalized.get("consent").cloned() {
        let consent = ConsentRecord::from_submission(accepted, ip, user_agent, Utc::now());
        normalized.insert(
            "consent".to_string(),
            serde_json::to_value(consent).expect("consent record serializes"),
        );
    }
}

/// Drops a raw-boolean consent from a save envelope: consent records are
/// minted by validate-step, and the stored shape must never be a bare
/// boolean.
fn strip_raw_consent(envelope: &mut Map<String, Value>) {
    if let Some(details) = envelope
        .get_mut("steps")
        .and_then(|steps| steps.get_mut("personalDetails"))
        .and_then(Value::as_object_mut)
    {
        if details.get("consent").map(Value::is_boolean).unwrap_or(false) {
            details.remove("consent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_consent_granted() {
        let mut normalized = Map::new();
        normalized.insert("consent".into(), Value::Bool(true));
        expand_consent(&mut normalized, "203.0.113.9", "UA/1.0");

        let consent = normalized["consent"].as_object().unwrap();
        assert!(consent["acceptedAt"].is_string());
        assert_eq!(consent["ip"], "203.0.113.9");
        assert_eq!(consent["userAgent"], "UA/1.0");
    }

    #[test]
    fn test_expand_consent_declined_has_null_fields() {
        let mut normalized = Map::new();
        normalized.insert("consent".into(), Value::Bool(false));
        expand_consent(&mut normalized, "203.0.113.9", "UA/1.0");

        let consent = normalized["consent"].as_object().unwrap();
        assert!(consent["acceptedAt"].is_null());
        assert!(consent["ip"].is_null());
        assert!(consent["userAgent"].is_null());
    }

    #[test]
    fn test_expand_consent_leaves_records_alone() {
        let mut normalized = Map::new();
        normalized.insert("consent".into(), json!({"text": "accepted"}));
        expand_consent(&mut normalized, "ip", "ua");
        assert_eq!(normalized["consent"], json!({"text": "accepted"}));
    }

    #[test]
    fn test_strip_raw_consent_from_save_envelope() {
        let mut envelope = json!({
            "steps": {"personalDetails": {"firstName": "John", "consent": true}},
        })
        .as_object()
        .unwrap()
        .clone();
        strip_raw_consent(&mut envelope);
        assert!(envelope["steps"]["personalDetails"].get("consent").is_none());
        assert_eq!(envelope["steps"]["personalDetails"]["firstName"], "John");
    }

    #[test]
    fn test_strip_raw_consent_keeps_consent_records() {
        let mut envelope = json!({
            "steps": {"personalDetails": {"consent": {"text": "accepted"}}},
        })
        .as_object()
        .unwrap()
        .clone();
        strip_raw_consent(&mut envelope);
        assert!(envelope["steps"]["personalDetails"]["consent"].is_object());
    }
}

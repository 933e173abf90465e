//! Form Record persistence.
//!
//! Every mutation is one transaction: the row is read `FOR UPDATE`, merged
//! in memory and written back, so a call either lands whole or not at all.
//! There is deliberately no version column — two sessions editing the same
//! form id is an accepted last-write-wins race.

use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use claimflow_core::StoragePath;

use crate::error::AppError;
use crate::models::{CrmStatus, FormRecord};

const RETURNING: &str = "id, steps, final, aff_id, original_aff_id, used_aff_id, \
     aff_id_defaulted, api_id_used, api_password_ref_used, crm_status, crm_response, \
     meta, created_at, updated_at";

/// Recursively merges `patch` into `base`. Objects merge key-wise, anything
/// else (including null) overwrites.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                deep_merge(base_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base_slot, _) => *base_slot = patch.clone(),
    }
}

/// Wraps step data in the `{steps, final}` envelope its storage path
/// dictates.
fn envelope_for(path: StoragePath, data: Map<String, Value>) -> Value {
    match path {
        StoragePath::Step(section) | StoragePath::StepField(section, _) => {
            serde_json::json!({ "steps": { (section): data } })
        }
        StoragePath::Final => serde_json::json!({ "final": data }),
    }
}

pub async fn get_form(pool: &PgPool, id: Uuid) -> Result<Option<FormRecord>, AppError> {
    let record = sqlx::query_as::<_, FormRecord>(&format!(
        "SELECT {RETURNING} FROM forms WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

async fn fetch_for_update(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<FormRecord>, AppError> {
    let record = sqlx::query_as::<_, FormRecord>(&format!(
        "SELECT {RETURNING} FROM forms WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(record)
}

async fn insert_form(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    steps: &Value,
    final_data: &Value,
    meta: &Value,
) -> Result<FormRecord, AppError> {
    let record = sqlx::query_as::<_, FormRecord>(&format!(
        "INSERT INTO forms (id, steps, final, meta) VALUES ($1, $2, $3, $4) RETURNING {RETURNING}"
    ))
    .bind(id)
    .bind(steps)
    .bind(final_data)
    .bind(meta)
    .fetch_one(&mut **tx)
    .await?;
    Ok(record)
}

async fn write_merged(
    tx: &mut Transaction<'_, Postgres>,
    record: &FormRecord,
) -> Result<FormRecord, AppError> {
    let updated = sqlx::query_as::<_, FormRecord>(&format!(
        "UPDATE forms SET steps = $2, final = $3, meta = $4, updated_at = NOW() \
         WHERE id = $1 RETURNING {RETURNING}"
    ))
    .bind(record.id)
    .bind(&record.steps)
    .bind(&record.final_data)
    .bind(&record.meta)
    .fetch_one(&mut **tx)
    .await?;
    Ok(updated)
}

/// Applies one envelope (`{steps?, final?}`) to a record, creating it when
/// allowed. Returns `None` when there is nothing to persist to: no form id
/// was supplied and this call may not mint one.
async fn upsert_envelope(
    pool: &PgPool,
    form_id: Option<Uuid>,
    envelope: &Value,
    meta: &Value,
    may_create: bool,
) -> Result<Option<FormRecord>, AppError> {
    let steps_patch = envelope.get("steps").cloned().unwrap_or(Value::Null);
    let final_patch = envelope.get("final").cloned().unwrap_or(Value::Null);

    let mut tx = pool.begin().await?;
    let record = match form_id {
        Some(id) => match fetch_for_update(&mut tx, id).await? {
            Some(mut record) => {
                if !steps_patch.is_null() {
                    deep_merge(&mut record.steps, &steps_patch);
                }
                if !final_patch.is_null() {
                    deep_merge(&mut record.final_data, &final_patch);
                }
                deep_merge(&mut record.meta, meta);
                write_merged(&mut tx, &record).await?
            }
            // A client-supplied id with no row behind it recreates the
            // record under that id rather than failing the step.
            None => {
                insert_form(
                    &mut tx,
                    id,
                    &or_empty_object(&steps_patch),
                    &or_empty_object(&final_patch),
                    meta,
                )
                .await?
            }
        },
        None => {
            if !may_create {
                tx.commit().await?;
                return Ok(None);
            }
            insert_form(
                &mut tx,
                Uuid::new_v4(),
                &or_empty_object(&steps_patch),
                &or_empty_object(&final_patch),
                meta,
            )
            .await?
        }
    };
    tx.commit().await?;
    Ok(Some(record))
}

fn or_empty_object(value: &Value) -> Value {
    if value.is_null() {
        Value::Object(Map::new())
    } else {
        value.clone()
    }
}

/// Persists one validated step at its storage path.
pub async fn persist_step(
    pool: &PgPool,
    form_id: Option<Uuid>,
    path: StoragePath,
    data: Map<String, Value>,
    meta: &Value,
    may_create: bool,
) -> Result<Option<FormRecord>, AppError> {
    let envelope = envelope_for(path, data);
    upsert_envelope(pool, form_id, &envelope, meta, may_create).await
}

/// Upsert for the `/save` endpoint: merges a `{steps?, final?}` envelope.
pub async fn merge_save(
    pool: &PgPool,
    form_id: Option<Uuid>,
    envelope: &Value,
    meta: &Value,
) -> Result<FormRecord, AppError> {
    upsert_envelope(pool, form_id, envelope, meta, true)
        .await?
        .ok_or_else(|| AppError::Internal("save produced no record".to_string()))
}

/// Writes the signature onto the record's final section.
pub async fn set_signature(
    pool: &PgPool,
    form_id: Uuid,
    signature_base64: &str,
    file_url: Option<&str>,
) -> Result<FormRecord, AppError> {
    let mut final_patch = Map::new();
    final_patch.insert(
        "signatureBase64".to_string(),
        Value::String(signature_base64.to_string()),
    );
    if let Some(url) = file_url {
        final_patch.insert("signatureFileUrl".to_string(), Value::String(url.to_string()));
    }
    let envelope = serde_json::json!({ "final": final_patch });
    upsert_envelope(pool, Some(form_id), &envelope, &Value::Object(Map::new()), true)
        .await?
        .ok_or_else(|| AppError::Internal("signature update produced no record".to_string()))
}

/// Records which affiliate identity and credentials a delivery used.
#[allow(clippy::too_many_arguments)]
pub async fn set_affiliate_usage(
    pool: &PgPool,
    form_id: Uuid,
    aff_id: &str,
    original_aff_id: Option<&str>,
    used_aff_id: &str,
    aff_id_defaulted: bool,
    api_id_used: Option<&str>,
    api_password_ref_used: Option<&str>,
) -> Result<FormRecord, AppError> {
    let record = sqlx::query_as::<_, FormRecord>(&format!(
        "UPDATE forms SET aff_id = $2, original_aff_id = $3, used_aff_id = $4, \
         aff_id_defaulted = $5, api_id_used = $6, api_password_ref_used = $7, \
         updated_at = NOW() WHERE id = $1 RETURNING {RETURNING}"
    ))
    .bind(form_id)
    .bind(aff_id)
    .bind(original_aff_id)
    .bind(used_aff_id)
    .bind(aff_id_defaulted)
    .bind(api_id_used)
    .bind(api_password_ref_used)
    .fetch_one(pool)
    .await?;
    Ok(record)
}

/// Moves the delivery status forward and stores the outcome payload.
///
/// Illegal (backward) transitions are refused: the stored state is kept and
/// returned, with a warning for operators. A failed delivery can therefore
/// never quietly become pending again.
pub async fn set_crm_status(
    pool: &PgPool,
    form_id: Uuid,
    next: CrmStatus,
    response: Option<&Value>,
) -> Result<FormRecord, AppError> {
    let mut tx = pool.begin().await?;
    let record = fetch_for_update(&mut tx, form_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("form {form_id} not found")))?;

    if !record.crm_status.can_transition_to(next) {
        tracing::warn!(
            form_id = %form_id,
            from = ?record.crm_status,
            to = ?next,
            "refusing backward crm status transition"
        );
        tx.commit().await?;
        return Ok(record);
    }

    let updated = sqlx::query_as::<_, FormRecord>(&format!(
        "UPDATE forms SET crm_status = $2, crm_response = COALESCE($3, crm_response), \
         updated_at = NOW() WHERE id = $1 RETURNING {RETURNING}"
    ))
    .bind(form_id)
    .bind(next)
    .bind(response)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimflow_core::StepId;
    use serde_json::json;

    #[test]
    fn test_deep_merge_nested_objects() {
        let mut base = json!({
            "addressLookup": {"currentPostcode": "SW1A 1AA"},
            "personalDetails": {"firstName": "John"},
        });
        let patch = json!({
            "addressLookup": {"currentAddress": {"house": "10"}},
        });
        deep_merge(&mut base, &patch);
        assert_eq!(base["addressLookup"]["currentPostcode"], "SW1A 1AA");
        assert_eq!(base["addressLookup"]["currentAddress"]["house"], "10");
        assert_eq!(base["personalDetails"]["firstName"], "John");
    }

    #[test]
    fn test_deep_merge_scalar_overwrites() {
        let mut base = json!({"email": "old@example.com"});
        deep_merge(&mut base, &json!({"email": "new@example.com"}));
        assert_eq!(base["email"], "new@example.com");
    }

    #[test]
    fn test_deep_merge_is_idempotent() {
        let patch = json!({"personalDetails": {"firstName": "John", "consent": {"text": "accepted"}}});
        let mut once = json!({});
        deep_merge(&mut once, &patch);
        let mut twice = once.clone();
        deep_merge(&mut twice, &patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_envelope_for_each_storage_path() {
        let mut data = Map::new();
        data.insert("currentPostcode".into(), json!("SW1A 1AA"));

        let step = envelope_for(StepId::PersonalDetails.storage_path(), data.clone());
        assert!(step["steps"]["personalDetails"]["currentPostcode"].is_string());

        let nested = envelope_for(StepId::Postcode.storage_path(), data.clone());
        assert_eq!(nested["steps"]["addressLookup"]["currentPostcode"], "SW1A 1AA");

        let final_env = envelope_for(StepId::Final.storage_path(), data);
        assert_eq!(final_env["final"]["currentPostcode"], "SW1A 1AA");
    }
}

//! The Form Record: one evolving document per lead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use uuid::Uuid;

use claimflow_core::dates::parse_dob;
use claimflow_core::lookup::Address;
use claimflow_core::mapper::LeadSnapshot;

/// Delivery state of a lead toward the CRM. Transitions only move forward:
/// a failed or queued delivery never silently reverts to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "crm_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CrmStatus {
    /// Delivery has not been considered yet.
    Unset,
    /// Delivery is being attempted.
    Pending,
    /// The CRM accepted the lead.
    Sent,
    /// Transient failure; an external sweep may retry.
    Queued,
    /// The CRM rejected the lead.
    Failed,
}

impl CrmStatus {
    /// Whether moving to `next` is a legal (forward) transition.
    pub fn can_transition_to(self, next: CrmStatus) -> bool {
        use CrmStatus::*;
        match self {
            Unset => next != Unset,
            Pending => matches!(next, Sent | Queued | Failed),
            Sent | Queued | Failed => false,
        }
    }
}

/// Consent, always stored as a record rather than a raw boolean. A granted
/// consent carries the acceptance instant plus the submitting client's ip
/// and user agent; a declined one keeps those fields null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub text: String,
    pub accepted_at: Option<DateTime<Utc>>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ConsentRecord {
    pub fn from_submission(
        accepted: bool,
        ip: &str,
        user_agent: &str,
        now: DateTime<Utc>,
    ) -> Self {
        if accepted {
            ConsentRecord {
                text: "accepted".to_string(),
                accepted_at: Some(now),
                ip: Some(ip.to_string()),
                user_agent: Some(user_agent.to_string()),
            }
        } else {
            ConsentRecord {
                text: "declined".to_string(),
                accepted_at: None,
                ip: None,
                user_agent: None,
            }
        }
    }
}

/// One lead's persisted aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormRecord {
    pub id: Uuid,
    /// Step name → validated step data.
    pub steps: Value,
    /// Final-section data (signature references, submitted superset).
    #[sqlx(rename = "final")]
    #[serde(rename = "final")]
    pub final_data: Value,
    pub aff_id: Option<String>,
    pub original_aff_id: Option<String>,
    pub used_aff_id: Option<String>,
    pub aff_id_defaulted: bool,
    pub api_id_used: Option<String>,
    pub api_password_ref_used: Option<String>,
    pub crm_status: CrmStatus,
    pub crm_response: Option<Value>,
    /// Request metadata (ip, user agent, source).
    pub meta: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormRecord {
    /// A field from the final section, falling back to the personal-details
    /// step. The final submission is a superset of personal details, so
    /// when both exist the final value wins.
    fn lead_field(&self, field: &str) -> Option<&Value> {
        self.final_data
            .get(field)
            .filter(|v| !v.is_null())
            .or_else(|| self.steps.get("personalDetails").and_then(|s| s.get(field)))
    }

    fn lead_str(&self, field: &str) -> String {
        self.lead_field(field)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    }

    fn address(&self, field: &str) -> Option<Address> {
        let value = self
            .final_data
            .get(field)
            .filter(|v| v.is_object())
            .or_else(|| {
                self.steps
                    .get("addressLookup")
                    .and_then(|s| s.get(field))
                    .filter(|v| v.is_object())
            })?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Flattens the nested record into the mapper's input shape.
    pub fn lead_snapshot(&self) -> LeadSnapshot {
        let current_postcode = self
            .final_data
            .get("currentPostcode")
            .or_else(|| {
                self.steps
                    .get("addressLookup")
                    .and_then(|s| s.get("currentPostcode"))
            })
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        LeadSnapshot {
            iva: self.lead_str("iva"),
            title: self.lead_str("title"),
            first_name: self.lead_str("firstName"),
            last_name: self.lead_str("lastName"),
            dob: parse_dob(&self.lead_str("dob")),
            email: self.lead_str("email"),
            phone: self.lead_str("phone"),
            current_postcode,
            current_address: self.address("currentAddress"),
            previous_address: self.address("previousAddress"),
            signature_base64: self.lead_str("signatureBase64"),
            signature_file_url: self.lead_str("signatureFileUrl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record_with(steps: Value, final_data: Value) -> FormRecord {
        let now = Utc.with_ymd_and_hms(2025, 9, 4, 11, 0, 0).unwrap();
        FormRecord {
            id: Uuid::new_v4(),
            steps,
            final_data,
            aff_id: None,
            original_aff_id: None,
            used_aff_id: None,
            aff_id_defaulted: false,
            api_id_used: None,
            api_password_ref_used: None,
            crm_status: CrmStatus::Unset,
            crm_response: None,
            meta: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_crm_status_only_moves_forward() {
        assert!(CrmStatus::Unset.can_transition_to(CrmStatus::Pending));
        assert!(CrmStatus::Pending.can_transition_to(CrmStatus::Sent));
        assert!(CrmStatus::Pending.can_transition_to(CrmStatus::Queued));
        assert!(CrmStatus::Pending.can_transition_to(CrmStatus::Failed));
        assert!(!CrmStatus::Failed.can_transition_to(CrmStatus::Pending));
        assert!(!CrmStatus::Sent.can_transition_to(CrmStatus::Queued));
        assert!(!CrmStatus::Queued.can_transition_to(CrmStatus::Pending));
    }

    #[test]
    fn test_granted_consent_carries_acceptance_context() {
        let now = Utc.with_ymd_and_hms(2025, 9, 4, 11, 0, 0).unwrap();
        let consent = ConsentRecord::from_submission(true, "203.0.113.9", "UA/1.0", now);
        assert_eq!(consent.accepted_at, Some(now));
        assert_eq!(consent.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(consent.user_agent.as_deref(), Some("UA/1.0"));
    }

    #[test]
    fn test_declined_consent_has_null_acceptance_fields() {
        let now = Utc::now();
        let consent = ConsentRecord::from_submission(false, "203.0.113.9", "UA/1.0", now);
        assert_eq!(consent.accepted_at, None);
        assert_eq!(consent.ip, None);
        assert_eq!(consent.user_agent, None);
    }

    #[test]
    fn test_snapshot_prefers_final_over_step_data() {
        let record = record_with(
            json!({"personalDetails": {"firstName": "John", "email": "old@example.com"}}),
            json!({"email": "new@example.com"}),
        );
        let snapshot = record.lead_snapshot();
        assert_eq!(snapshot.first_name, "John");
        assert_eq!(snapshot.email, "new@example.com");
    }

    #[test]
    fn test_snapshot_reads_addresses_from_lookup_step() {
        let record = record_with(
            json!({
                "addressLookup": {
                    "currentPostcode": "SW1A 1AA",
                    "currentAddress": {
                        "id": "0",
                        "label": "10 Downing Street, London, SW1A 2AA",
                        "house": "10", "street": "Downing Street",
                        "city": "London", "county": "", "district": "",
                        "postcode": "SW1A 2AA",
                    },
                },
            }),
            json!({}),
        );
        let snapshot = record.lead_snapshot();
        assert_eq!(snapshot.current_postcode, "SW1A 1AA");
        let address = snapshot.current_address.unwrap();
        assert_eq!(address.house, "10");
        assert_eq!(address.label, "10 Downing Street, London, SW1A 2AA");
        assert!(snapshot.previous_address.is_none());
    }

    #[test]
    fn test_snapshot_of_empty_record_is_all_defaults() {
        let snapshot = record_with(json!({}), json!({})).lead_snapshot();
        assert_eq!(snapshot.first_name, "");
        assert!(snapshot.dob.is_none());
        assert!(snapshot.current_address.is_none());
    }
}

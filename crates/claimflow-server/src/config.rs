//! Environment-driven configuration.
//!
//! Required variables are checked once at startup so a misconfigured
//! process refuses to boot instead of failing per-lead.

use anyhow::{bail, Context};

use claimflow_core::StepId;

/// Server configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address, `BIND_ADDR`.
    pub bind_addr: String,
    /// PostgreSQL connection string, `DATABASE_URL` (required).
    pub database_url: String,
    /// Affiliate id used when a lead arrives without one, `DEFAULT_AFF_ID`
    /// (required; its credentials must exist at startup).
    pub default_aff_id: String,
    /// Lead-buyer endpoint, `CRM_URL`.
    pub crm_url: String,
    /// Address provider base URL, `ADDRESS_LOOKUP_URL`.
    pub address_lookup_url: String,
    /// Address provider key, `ADDRESS_LOOKUP_API_KEY`.
    pub address_lookup_api_key: String,
    /// Object-store PUT base for signatures, `SIGNATURE_STORE_URL`.
    /// Unset disables durable signature storage (inline only).
    pub signature_store_url: Option<String>,
    /// Public base the stored signatures are fetched from,
    /// `SIGNATURE_PUBLIC_URL`. Defaults to the store URL.
    pub signature_public_url: Option<String>,
    /// Bearer token for the object store, `SIGNATURE_STORE_TOKEN`.
    pub signature_store_token: Option<String>,
    /// First flow step allowed to mint a Form Record,
    /// `RECORD_CREATION_STEP`. Earlier steps validate without persisting so
    /// abandoned sessions leave no placeholder rows.
    pub record_creation_step: StepId,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let default_aff_id =
            std::env::var("DEFAULT_AFF_ID").context("DEFAULT_AFF_ID is required")?;

        let record_creation_step = match std::env::var("RECORD_CREATION_STEP") {
            Err(_) => StepId::PersonalDetails,
            Ok(raw) => {
                let step = StepId::parse(&raw);
                match step {
                    Some(step) if step.flow_index().is_some() => step,
                    _ => bail!(
                        "RECORD_CREATION_STEP must name a flow step, got '{raw}'"
                    ),
                }
            }
        };

        let address_lookup_api_key =
            std::env::var("ADDRESS_LOOKUP_API_KEY").unwrap_or_default();
        if address_lookup_api_key.is_empty() {
            tracing::warn!("ADDRESS_LOOKUP_API_KEY not set; address lookups will fail");
        }

        Ok(AppConfig {
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:4000".to_string()),
            database_url,
            default_aff_id,
            crm_url: std::env::var("CRM_URL")
                .unwrap_or_else(|_| "https://leads-inst47-client.phonexa.uk/lead/".to_string()),
            address_lookup_url: std::env::var("ADDRESS_LOOKUP_URL")
                .unwrap_or_else(|_| "https://api.getaddress.io".to_string()),
            address_lookup_api_key,
            signature_store_url: std::env::var("SIGNATURE_STORE_URL").ok(),
            signature_public_url: std::env::var("SIGNATURE_PUBLIC_URL").ok(),
            signature_store_token: std::env::var("SIGNATURE_STORE_TOKEN").ok(),
            record_creation_step,
        })
    }

    /// Whether a record may be minted when `step` is the one being
    /// persisted and no form id was supplied.
    pub fn may_create_record(&self, step: StepId) -> bool {
        match (step.flow_index(), self.record_creation_step.flow_index()) {
            (Some(index), Some(threshold)) => index >= threshold,
            // Steps outside the flow (the hello demo) never mint records.
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_threshold(step: StepId) -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url: "postgres://localhost/test".into(),
            default_aff_id: "639".into(),
            crm_url: "http://crm.test/lead/".into(),
            address_lookup_url: "http://lookup.test".into(),
            address_lookup_api_key: "key".into(),
            signature_store_url: None,
            signature_public_url: None,
            signature_store_token: None,
            record_creation_step: step,
        }
    }

    #[test]
    fn test_default_threshold_skips_postcode() {
        let config = config_with_threshold(StepId::PersonalDetails);
        assert!(!config.may_create_record(StepId::Postcode));
        assert!(config.may_create_record(StepId::PersonalDetails));
        assert!(config.may_create_record(StepId::AddressLookup));
        assert!(config.may_create_record(StepId::Final));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let config = config_with_threshold(StepId::Postcode);
        assert!(config.may_create_record(StepId::Postcode));
    }

    #[test]
    fn test_hello_step_never_creates() {
        let config = config_with_threshold(StepId::Postcode);
        assert!(!config.may_create_record(StepId::Hello));
    }
}

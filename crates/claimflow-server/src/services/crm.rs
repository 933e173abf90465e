//! CRM lead delivery.
//!
//! Posts the mapped payload to the lead buyer and classifies the outcome.
//! Transient trouble (network, timeout, 5xx) marks the lead `queued` so an
//! external sweep can retry it; only an explicit client-error rejection is
//! `failed`. This service never decides the end-user response — callers
//! persist the outcome and report success once the local record is safe.

use std::time::Duration;

use serde_json::{json, Value};

use claimflow_core::mapper::CrmPayload;

use crate::models::CrmStatus;
use crate::services::secrets::resolve_secret;

/// Hard cap on one delivery attempt.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Classified result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub status: CrmStatus,
    /// Response body or error detail, persisted for diagnosis.
    pub response: Value,
}

#[derive(Debug, Clone)]
pub struct CrmDelivery {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl CrmDelivery {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        CrmDelivery {
            http,
            url: url.into(),
            timeout: DELIVERY_TIMEOUT,
        }
    }

    /// Overrides the attempt timeout (tests).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Posts one lead. Credentials are resolved from the reference here and
    /// injected into transport auth and the `apiId` body field; they never
    /// appear in the mapped payload itself.
    pub async fn deliver(
        &self,
        payload: &CrmPayload,
        api_id: &str,
        api_password_ref: &str,
    ) -> DeliveryOutcome {
        let password = resolve_secret(api_password_ref);

        let mut body = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            _ => {
                return DeliveryOutcome {
                    status: CrmStatus::Failed,
                    response: json!({ "error": "payload serialization failed" }),
                }
            }
        };
        body.insert("apiId".to_string(), Value::String(api_id.to_string()));

        let result = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .basic_auth(api_id, Some(password))
            .json(&Value::Object(body))
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                let parsed: Value =
                    serde_json::from_str(&text).unwrap_or(Value::String(text));

                if status.is_success() {
                    DeliveryOutcome {
                        status: CrmStatus::Sent,
                        response: json!({ "data": parsed }),
                    }
                } else if status.is_server_error() {
                    tracing::warn!(%status, "crm returned server error, queueing lead");
                    DeliveryOutcome {
                        status: CrmStatus::Queued,
                        response: json!({
                            "error": format!("crm returned {status}"),
                            "body": parsed,
                        }),
                    }
                } else {
                    tracing::error!(%status, "crm rejected lead");
                    DeliveryOutcome {
                        status: CrmStatus::Failed,
                        response: json!({
                            "error": format!("crm rejected with {status}"),
                            "status": status.as_u16(),
                            "body": parsed,
                        }),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "crm delivery transport failure, queueing lead");
                DeliveryOutcome {
                    status: CrmStatus::Queued,
                    response: json!({ "error": e.to_string() }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimflow_core::mapper::{map_lead, DeliveryMeta, LeadSnapshot};
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> CrmPayload {
        map_lead(&LeadSnapshot::default(), &DeliveryMeta::default())
    }

    #[tokio::test]
    async fn test_2xx_is_sent_with_body_stored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/lead/"))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"leadId": "abc"})),
            )
            .mount(&server)
            .await;

        let crm = CrmDelivery::new(reqwest::Client::new(), format!("{}/lead/", server.uri()));
        let outcome = crm.deliver(&payload(), "api-1", "REF").await;
        assert_eq!(outcome.status, CrmStatus::Sent);
        assert_eq!(outcome.response["data"]["leadId"], "abc");
    }

    #[tokio::test]
    async fn test_5xx_is_queued() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let crm = CrmDelivery::new(reqwest::Client::new(), server.uri());
        let outcome = crm.deliver(&payload(), "api-1", "REF").await;
        assert_eq!(outcome.status, CrmStatus::Queued);
        assert!(outcome.response["error"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_4xx_is_failed_with_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"reason": "bad phone"})),
            )
            .mount(&server)
            .await;

        let crm = CrmDelivery::new(reqwest::Client::new(), server.uri());
        let outcome = crm.deliver(&payload(), "api-1", "REF").await;
        assert_eq!(outcome.status, CrmStatus::Failed);
        assert_eq!(outcome.response["status"], 422);
        assert_eq!(outcome.response["body"]["reason"], "bad phone");
    }

    #[tokio::test]
    async fn test_timeout_is_queued_with_error_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let crm = CrmDelivery::new(reqwest::Client::new(), server.uri())
            .with_timeout(Duration::from_millis(50));
        let outcome = crm.deliver(&payload(), "api-1", "REF").await;
        assert_eq!(outcome.status, CrmStatus::Queued);
        assert!(!outcome.response["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_queued() {
        // Nothing listens on this port.
        let crm = CrmDelivery::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/lead/".to_string(),
        )
        .with_timeout(Duration::from_millis(200));
        let outcome = crm.deliver(&payload(), "api-1", "REF").await;
        assert_eq!(outcome.status, CrmStatus::Queued);
    }

    #[tokio::test]
    async fn test_api_id_injected_into_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::body_partial_json(json!({"apiId": "api-1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let crm = CrmDelivery::new(reqwest::Client::new(), server.uri());
        let outcome = crm.deliver(&payload(), "api-1", "REF").await;
        assert_eq!(outcome.status, CrmStatus::Sent);
    }
}

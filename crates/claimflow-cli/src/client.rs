//! HTTP client for the claimflow server.
//!
//! Translates flow [`Command`]s into endpoint calls and wire responses
//! back into [`Outcome`]s the flow machine understands.

use serde_json::{json, Value};

use claimflow_core::lookup::Address;
use claimflow_core::{Command, FieldError, Outcome};

pub struct ApiClient {
    base: String,
    agent: ureq::Agent,
}

/// Raw result of a POST: status code plus parsed JSON body (null when the
/// body was not JSON).
struct PostResult {
    status: u16,
    body: Value,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        ApiClient {
            base: base.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(30))
                .build(),
        }
    }

    pub fn health(&self) -> anyhow::Result<bool> {
        let body: Value = self
            .agent
            .get(&format!("{}/api/health", self.base))
            .call()?
            .into_json()?;
        Ok(body["ok"].as_bool().unwrap_or(false))
    }

    /// Address lookup. An empty list is a valid answer; an `Err` is a
    /// provider or transport failure.
    pub fn lookup(&self, postcode: &str) -> anyhow::Result<Vec<Address>> {
        let result = self.post("/api/address/lookup", json!({ "postcode": postcode }))?;
        if result.status != 200 {
            anyhow::bail!("address lookup failed with status {}", result.status);
        }
        let addresses = serde_json::from_value(result.body["addresses"].clone())?;
        Ok(addresses)
    }

    /// Executes one flow command against the server.
    pub fn execute(&self, command: &Command) -> Outcome {
        match command {
            Command::ValidateStep { step, data, form_id } => {
                let body = json!({
                    "stepId": step.as_str(),
                    "data": data,
                    "formId": form_id,
                });
                self.accepted_outcome(self.post("/api/forms/validate-step", body), "formId")
            }
            Command::SaveProgress { form_id, data } => {
                let body = json!({ "formId": form_id, "data": data });
                match self.post("/api/forms/save", body) {
                    Ok(result) if result.status == 200 => Outcome::Saved {
                        form_id: result.body["form"]["id"].as_str().map(str::to_string),
                    },
                    Ok(result) => rejected_or_failed(result),
                    Err(_) => Outcome::TransportFailed,
                }
            }
            Command::UploadSignature { form_id, signature_base64 } => {
                let body = json!({
                    "signatureBase64": signature_base64,
                    "formId": form_id,
                });
                // Upload failure is non-fatal by contract.
                match self.post("/api/upload/signature", body) {
                    Ok(result) if result.status == 200 => Outcome::Uploaded {
                        file_url: result.body["fileUrl"].as_str().map(str::to_string),
                    },
                    _ => Outcome::Uploaded { file_url: None },
                }
            }
            Command::SubmitFinal { form_id, data } => {
                let body = json!({ "formId": form_id, "data": data });
                self.accepted_outcome(self.post("/api/forms/submit", body), "form.id")
            }
        }
    }

    fn accepted_outcome(
        &self,
        result: anyhow::Result<PostResult>,
        id_path: &str,
    ) -> Outcome {
        match result {
            Ok(result) if result.status == 200 => {
                let id = id_path
                    .split('.')
                    .fold(Some(&result.body), |value, segment| {
                        value.and_then(|v| v.get(segment))
                    })
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Outcome::Accepted { form_id: id }
            }
            Ok(result) => rejected_or_failed(result),
            Err(_) => Outcome::TransportFailed,
        }
    }

    fn post(&self, path: &str, body: Value) -> anyhow::Result<PostResult> {
        let url = format!("{}{}", self.base, path);
        match self.agent.post(&url).send_json(body) {
            Ok(response) => {
                let status = response.status();
                let body = response.into_json().unwrap_or(Value::Null);
                Ok(PostResult { status, body })
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_json().unwrap_or(Value::Null);
                Ok(PostResult { status, body })
            }
            Err(e) => Err(anyhow::anyhow!("request to {path} failed: {e}")),
        }
    }
}

/// A 400 with field errors is a rejection the visitor can fix; anything
/// else is transport-level.
fn rejected_or_failed(result: PostResult) -> Outcome {
    if result.status == 400 {
        if let Ok(errors) =
            serde_json::from_value::<Vec<FieldError>>(result.body["errors"].clone())
        {
            return Outcome::Rejected { errors };
        }
    }
    Outcome::TransportFailed
}

//! The multi-step flow state machine.
//!
//! The machine owns the ordered step list, the cumulative form values and
//! the UI status, and expresses every side effect as a [`Command`] the
//! driver executes (HTTP calls, in practice). The driver feeds each
//! command's [`Outcome`] back in and receives the next [`Progress`]. The
//! whole session is serializable, so a driver can checkpoint mid-flow and
//! resume — including between the named stages of the hidden continuation
//! that runs after personal details.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorKind, FieldError, Violation};
use crate::steps::{save_envelope, StepId, FLOW_ORDER};

/// What the visitor currently sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiStatus {
    Form,
    Loading,
    #[serde(rename = "thankyou")]
    ThankYou,
}

/// A side effect the driver must perform before the flow can continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ValidateStep {
        step: StepId,
        data: Value,
        form_id: Option<String>,
    },
    SaveProgress {
        form_id: Option<String>,
        data: Value,
    },
    UploadSignature {
        form_id: Option<String>,
        signature_base64: String,
    },
    SubmitFinal {
        form_id: Option<String>,
        data: Value,
    },
}

/// Result of executing a [`Command`], fed back into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// validate-step or submit accepted; the server may have minted an id.
    Accepted { form_id: Option<String> },
    /// save accepted.
    Saved { form_id: Option<String> },
    /// Signature upload finished; `None` means it failed, which is
    /// non-fatal — the flow proceeds with the inline signature.
    Uploaded { file_url: Option<String> },
    /// Rejected with field-level errors.
    Rejected { errors: Vec<FieldError> },
    /// Transport-level failure (network, 5xx).
    TransportFailed,
}

/// What the driver should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Stay on the current step; field errors (if any) are attached.
    Stay,
    /// Advanced to the next visible step.
    Advanced(StepId),
    /// Execute this command and report its outcome.
    Continue(Command),
    /// Terminal: the thank-you state.
    Done,
}

/// Named stages of the hidden continuation that runs after the
/// personal-details step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HiddenStage {
    ValidateAddress,
    SaveProgress,
    UploadSignature,
    SubmitFinal,
}

/// Per-stage result of the hidden continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: HiddenStage,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Where the machine is between a command being issued and its outcome
/// arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum Phase {
    Idle,
    Validating,
    Saving,
    Hidden(HiddenStage),
}

/// The serializable session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSession {
    pub step_index: usize,
    pub form_id: Option<String>,
    /// Cumulative merged form values; never discarded on navigation.
    pub values: Map<String, Value>,
    pub returning_to_postcode: bool,
    pub status: UiStatus,
    /// Field errors attached to the current step.
    pub field_errors: Vec<FieldError>,
    /// URL the visitor opted in on, forwarded to the CRM.
    pub optin_url: String,
}

impl FlowSession {
    fn new(optin_url: String) -> Self {
        FlowSession {
            step_index: 0,
            form_id: None,
            values: Map::new(),
            returning_to_postcode: false,
            status: UiStatus::Form,
            field_errors: Vec::new(),
            optin_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMachine {
    session: FlowSession,
    phase: Phase,
    /// Step data awaiting server acceptance, merged into `values` only once
    /// the server agrees.
    pending: Option<Map<String, Value>>,
    hidden_report: Vec<StageReport>,
}

impl FlowMachine {
    pub fn new(optin_url: impl Into<String>) -> Self {
        FlowMachine {
            session: FlowSession::new(optin_url.into()),
            phase: Phase::Idle,
            pending: None,
            hidden_report: Vec::new(),
        }
    }

    pub fn session(&self) -> &FlowSession {
        &self.session
    }

    pub fn current_step(&self) -> StepId {
        FLOW_ORDER[self.session.step_index]
    }

    /// Stage-by-stage results of the hidden continuation so far.
    pub fn hidden_report(&self) -> &[StageReport] {
        &self.hidden_report
    }

    /// Client-side admission checks for the postcode step: forward motion
    /// is blocked (no server call) until the typed postcode has a selected
    /// suggestion, and likewise for the previous-address section when it is
    /// open. Not part of the schema contract.
    pub fn admit(&self, candidate: &Map<String, Value>) -> Result<(), Vec<Violation>> {
        if self.current_step() != StepId::Postcode {
            return Ok(());
        }

        let mut violations = Vec::new();
        if !has_selected_address(candidate, "currentAddress") {
            violations.push(Violation::on(
                "currentPostcode",
                ErrorKind::SelectAddressRequired,
            ));
        }

        let prev_open = candidate
            .get("showPrevAddressFlag")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if prev_open {
            let prev_postcode = candidate
                .get("previousPostcode")
                .and_then(Value::as_str)
                .unwrap_or("");
            if prev_postcode.trim().is_empty() {
                violations.push(Violation::on("previousPostcode", ErrorKind::Required));
            } else if !has_selected_address(candidate, "previousAddress") {
                violations.push(Violation::on(
                    "previousPostcode",
                    ErrorKind::SelectAddressRequired,
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Begins a Next transition with the data entered on the current step.
    /// Returns the validation command to execute, or the admission
    /// violations that block it locally.
    pub fn begin_next(&mut self, data: Map<String, Value>) -> Result<Command, Vec<Violation>> {
        let mut candidate = self.session.values.clone();
        for (k, v) in &data {
            candidate.insert(k.clone(), v.clone());
        }
        self.admit(&candidate)?;

        self.session.field_errors.clear();
        let step = self.current_step();
        self.pending = Some(candidate.clone());
        self.phase = Phase::Validating;
        Ok(Command::ValidateStep {
            step,
            data: Value::Object(candidate),
            form_id: self.session.form_id.clone(),
        })
    }

    /// Back navigation. Leaving the second step toward the first arms the
    /// suppression flag so re-mounting the postcode screen does not fire
    /// lookups.
    pub fn go_back(&mut self) {
        if self.session.step_index == 0 || self.session.status != UiStatus::Form {
            return;
        }
        if self.session.step_index == 1 {
            self.session.returning_to_postcode = true;
        }
        self.session.step_index -= 1;
        self.session.field_errors.clear();
        self.phase = Phase::Idle;
        self.pending = None;
    }

    /// Clears the suppression flag once the postcode screen has mounted.
    pub fn acknowledge_postcode_return(&mut self) {
        self.session.returning_to_postcode = false;
    }

    /// Feeds a command's outcome back and returns what to do next.
    pub fn advance(&mut self, outcome: Outcome) -> Progress {
        match self.phase {
            Phase::Idle => Progress::Stay,
            Phase::Validating => self.after_validation(outcome),
            Phase::Saving => self.after_save(outcome),
            Phase::Hidden(stage) => self.after_hidden_stage(stage, outcome),
        }
    }

    fn after_validation(&mut self, outcome: Outcome) -> Progress {
        match outcome {
            Outcome::Accepted { form_id } => {
                if let Some(id) = form_id {
                    self.session.form_id = Some(id);
                }
                self.commit_pending();
                if self.current_step() == StepId::Postcode {
                    // Validated but intentionally not saved: no record for a
                    // postcode-only session.
                    self.phase = Phase::Idle;
                    self.session.step_index += 1;
                    Progress::Advanced(self.current_step())
                } else {
                    self.phase = Phase::Saving;
                    Progress::Continue(Command::SaveProgress {
                        form_id: self.session.form_id.clone(),
                        data: save_envelope(&self.session.values),
                    })
                }
            }
            Outcome::Rejected { errors } => self.fail_to_form(errors),
            _ => self.fail_to_form(Vec::new()),
        }
    }

    fn after_save(&mut self, outcome: Outcome) -> Progress {
        match outcome {
            Outcome::Saved { form_id } => {
                if let Some(id) = form_id {
                    self.session.form_id = Some(id);
                }
                if self.current_step() == StepId::PersonalDetails {
                    self.start_hidden_flow()
                } else {
                    self.phase = Phase::Idle;
                    self.session.step_index += 1;
                    Progress::Advanced(self.current_step())
                }
            }
            Outcome::Rejected { errors } => self.fail_to_form(errors),
            _ => self.fail_to_form(Vec::new()),
        }
    }

    fn start_hidden_flow(&mut self) -> Progress {
        self.session.status = UiStatus::Loading;
        self.hidden_report.clear();
        self.phase = Phase::Hidden(HiddenStage::ValidateAddress);
        Progress::Continue(Command::ValidateStep {
            step: StepId::AddressLookup,
            data: Value::Object(self.sanitized_values()),
            form_id: self.session.form_id.clone(),
        })
    }

    fn after_hidden_stage(&mut self, stage: HiddenStage, outcome: Outcome) -> Progress {
        match (stage, outcome) {
            (HiddenStage::ValidateAddress, Outcome::Accepted { form_id }) => {
                self.note_stage(stage, true, None);
                if let Some(id) = form_id {
                    self.session.form_id = Some(id);
                }
                self.phase = Phase::Hidden(HiddenStage::SaveProgress);
                Progress::Continue(Command::SaveProgress {
                    form_id: self.session.form_id.clone(),
                    data: save_envelope(&self.sanitized_values()),
                })
            }
            (HiddenStage::SaveProgress, Outcome::Saved { form_id }) => {
                self.note_stage(stage, true, None);
                if let Some(id) = form_id {
                    self.session.form_id = Some(id);
                }
                self.enter_upload_or_submit()
            }
            (HiddenStage::UploadSignature, Outcome::Uploaded { file_url }) => {
                // Upload failure is non-fatal: keep the inline signature.
                match file_url {
                    Some(url) => {
                        self.note_stage(stage, true, None);
                        self.session
                            .values
                            .insert("signatureFileUrl".into(), Value::String(url));
                    }
                    None => self.note_stage(stage, false, Some("upload failed".into())),
                }
                self.enter_submit()
            }
            (HiddenStage::SubmitFinal, Outcome::Accepted { form_id }) => {
                self.note_stage(stage, true, None);
                if let Some(id) = form_id {
                    self.session.form_id = Some(id);
                }
                self.phase = Phase::Idle;
                self.session.status = UiStatus::ThankYou;
                Progress::Done
            }
            (stage, Outcome::Rejected { errors }) => {
                self.note_stage(stage, false, Some("rejected".into()));
                self.fail_to_form(errors)
            }
            (stage, _) => {
                self.note_stage(stage, false, Some("transport failed".into()));
                self.fail_to_form(Vec::new())
            }
        }
    }

    fn enter_upload_or_submit(&mut self) -> Progress {
        let signature = self
            .session
            .values
            .get("signatureBase64")
            .and_then(Value::as_str)
            .unwrap_or("");
        let already_uploaded = self
            .session
            .values
            .get("signatureFileUrl")
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false);

        if !signature.is_empty() && !already_uploaded {
            self.phase = Phase::Hidden(HiddenStage::UploadSignature);
            Progress::Continue(Command::UploadSignature {
                form_id: self.session.form_id.clone(),
                signature_base64: signature.to_string(),
            })
        } else {
            self.enter_submit()
        }
    }

    fn enter_submit(&mut self) -> Progress {
        self.phase = Phase::Hidden(HiddenStage::SubmitFinal);
        let mut data = self.sanitized_values();
        data.insert(
            "optinurl".into(),
            Value::String(self.session.optin_url.clone()),
        );
        Progress::Continue(Command::SubmitFinal {
            form_id: self.session.form_id.clone(),
            data: Value::Object(data),
        })
    }

    /// Cumulative values with the empty previous-address artifacts removed,
    /// keeping "no previous address" as absence rather than empty objects.
    fn sanitized_values(&self) -> Map<String, Value> {
        let mut data = self.session.values.clone();
        let prev_postcode_empty = data
            .get("previousPostcode")
            .and_then(Value::as_str)
            .map(|s| s.trim().is_empty())
            .unwrap_or(false);
        if prev_postcode_empty {
            data.remove("previousPostcode");
        }
        let prev_address_empty = match data.get("previousAddress") {
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Null) => true,
            _ => false,
        };
        if prev_address_empty {
            data.remove("previousAddress");
        }
        data
    }

    fn commit_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.session.values = pending;
        }
    }

    fn note_stage(&mut self, stage: HiddenStage, ok: bool, detail: Option<String>) {
        self.hidden_report.push(StageReport { stage, ok, detail });
    }

    /// Any failure drops the visitor back to an editable form on the step
    /// that started the transition; nothing here is terminal.
    fn fail_to_form(&mut self, errors: Vec<FieldError>) -> Progress {
        self.session.status = UiStatus::Form;
        self.session.field_errors = errors;
        self.phase = Phase::Idle;
        self.pending = None;
        Progress::Stay
    }
}

fn has_selected_address(values: &Map<String, Value>, field: &str) -> bool {
    values
        .get(field)
        .and_then(Value::as_object)
        .and_then(|addr| addr.get("label"))
        .and_then(Value::as_str)
        .map(|label| !label.trim().is_empty())
        .unwrap_or(false)
}

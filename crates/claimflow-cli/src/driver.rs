//! Drives a lead through the multi-step flow against a running server.
//!
//! The flow machine decides what happens next; this module only performs
//! the I/O it asks for and narrates progress. A lead file is the flat JSON
//! a visitor would have typed: personal fields plus `currentPostcode` (and
//! optionally `previousPostcode`).

use colored::Colorize;
use serde_json::{Map, Value};

use claimflow_core::flow::Progress;
use claimflow_core::lookup::{classify_lookup_result, Address, LookupStatus};
use claimflow_core::messages::friendly_message;
use claimflow_core::{FieldError, FlowMachine, StepId, UiStatus};

use crate::client::ApiClient;

const PERSONAL_FIELDS: [&str; 9] = [
    "iva",
    "title",
    "firstName",
    "lastName",
    "dob",
    "email",
    "phone",
    "consent",
    "signatureBase64",
];

/// Runs one lead to completion. Returns an error when the flow ends
/// anywhere other than the thank-you state.
pub fn run_lead(
    client: &ApiClient,
    lead: &Value,
    optin_url: &str,
    select_index: usize,
) -> anyhow::Result<()> {
    let lead = lead
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("lead file must be a JSON object"))?;

    let mut machine = FlowMachine::new(optin_url);

    let postcode_data = build_postcode_step(client, lead, select_index)?;
    drive_step(client, &mut machine, postcode_data)?;

    if machine.current_step() == StepId::PersonalDetails {
        let personal = lead
            .iter()
            .filter(|(key, _)| PERSONAL_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        drive_step(client, &mut machine, personal)?;
    }

    match machine.session().status {
        UiStatus::ThankYou => {
            println!("{}", "Lead submitted — thank you page reached.".green());
            for report in machine.hidden_report() {
                let mark = if report.ok { "✓".green() } else { "✗".red() };
                println!("  {mark} {:?}", report.stage);
            }
            if let Some(form_id) = &machine.session().form_id {
                println!("  form id: {form_id}");
            }
            Ok(())
        }
        _ => {
            print_errors(&machine.session().field_errors);
            anyhow::bail!("submission did not complete")
        }
    }
}

/// Performs the lookup-and-select interaction the postcode screen does:
/// fetch candidates for the typed postcode and pick one, so the step
/// passes the selected-address admission guard.
fn build_postcode_step(
    client: &ApiClient,
    lead: &Map<String, Value>,
    select_index: usize,
) -> anyhow::Result<Map<String, Value>> {
    let postcode = lead
        .get("currentPostcode")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("lead file is missing currentPostcode"))?;

    let mut data = Map::new();
    let current = select_address(client, postcode, select_index)?;
    println!("  selected: {}", current.label.dimmed());
    data.insert("currentPostcode".into(), Value::String(current.postcode.clone()));
    data.insert("currentAddress".into(), serde_json::to_value(&current)?);

    if let Some(previous_postcode) = lead.get("previousPostcode").and_then(Value::as_str) {
        if !previous_postcode.trim().is_empty() {
            let previous = select_address(client, previous_postcode, select_index)?;
            println!("  previous: {}", previous.label.dimmed());
            data.insert("showPrevAddressFlag".into(), Value::Bool(true));
            data.insert(
                "previousPostcode".into(),
                Value::String(previous.postcode.clone()),
            );
            data.insert("previousAddress".into(), serde_json::to_value(&previous)?);
        }
    }

    Ok(data)
}

fn select_address(
    client: &ApiClient,
    postcode: &str,
    select_index: usize,
) -> anyhow::Result<Address> {
    match classify_lookup_result(client.lookup(postcode)) {
        LookupStatus::Selectable(addresses) => addresses
            .into_iter()
            .nth(select_index)
            .ok_or_else(|| anyhow::anyhow!("no address at index {select_index} for {postcode}")),
        LookupStatus::NoResults => anyhow::bail!(
            "{}",
            friendly_message("currentPostcode.lookupNoResults")
        ),
        LookupStatus::Failed => anyhow::bail!(
            "{}",
            friendly_message("currentPostcode.lookupFailed")
        ),
    }
}

/// Submits one step and then executes whatever the machine asks for until
/// it settles (next screen, thank-you, or back to the form with errors).
fn drive_step(
    client: &ApiClient,
    machine: &mut FlowMachine,
    data: Map<String, Value>,
) -> anyhow::Result<()> {
    let step = machine.current_step();
    println!("{} {}", "step".bold(), step);

    let mut command = match machine.begin_next(data) {
        Ok(command) => command,
        Err(violations) => {
            let errors: Vec<FieldError> = violations.iter().map(FieldError::from).collect();
            print_errors(&errors);
            anyhow::bail!("step {step} blocked before submission");
        }
    };

    loop {
        let outcome = client.execute(&command);
        match machine.advance(outcome) {
            Progress::Continue(next) => command = next,
            Progress::Advanced(next) => {
                println!("  {} {}", "→".dimmed(), next);
                return Ok(());
            }
            Progress::Done | Progress::Stay => return Ok(()),
        }
    }
}

fn print_errors(errors: &[FieldError]) {
    for error in errors {
        println!(
            "  {} {}: {}",
            "✗".red(),
            error.field,
            friendly_message(&error.message)
        );
    }
}

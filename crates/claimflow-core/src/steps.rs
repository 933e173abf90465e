//! Step identifiers and their storage mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One named stage of the multi-step form.
///
/// `Hello` is the single-field demo step; it has a schema but does not
/// appear in the interactive flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    Postcode,
    Hello,
    PersonalDetails,
    AddressLookup,
    Final,
}

/// The interactive flow order. `AddressLookup` and `Final` run as hidden
/// continuation steps after `PersonalDetails`.
pub const FLOW_ORDER: [StepId; 4] = [
    StepId::Postcode,
    StepId::PersonalDetails,
    StepId::AddressLookup,
    StepId::Final,
];

impl StepId {
    /// Parses the external step name. `submit` is an alias for `final`.
    pub fn parse(step: &str) -> Option<StepId> {
        match step {
            "postcode" => Some(StepId::Postcode),
            "hello" => Some(StepId::Hello),
            "personal-details" => Some(StepId::PersonalDetails),
            "address-lookup" => Some(StepId::AddressLookup),
            "final" | "submit" => Some(StepId::Final),
            _ => None,
        }
    }

    /// The external wire name for this step.
    pub fn as_str(self) -> &'static str {
        match self {
            StepId::Postcode => "postcode",
            StepId::Hello => "hello",
            StepId::PersonalDetails => "personal-details",
            StepId::AddressLookup => "address-lookup",
            StepId::Final => "final",
        }
    }

    /// Where this step's validated data lands on the Form Record.
    pub fn storage_path(self) -> StoragePath {
        match self {
            StepId::Hello => StoragePath::Step("hello"),
            StepId::PersonalDetails => StoragePath::Step("personalDetails"),
            StepId::AddressLookup => StoragePath::Step("addressLookup"),
            // The lone postcode nests inside the address-lookup section so a
            // later address-lookup pass extends rather than replaces it.
            StepId::Postcode => StoragePath::StepField("addressLookup", "currentPostcode"),
            StepId::Final => StoragePath::Final,
        }
    }

    /// Position in the interactive flow, if the step has a screen of its own.
    pub fn flow_index(self) -> Option<usize> {
        FLOW_ORDER.iter().position(|s| *s == self)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal destination for a step's validated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePath {
    /// A whole sub-document under `steps`, e.g. `steps.personalDetails`.
    Step(&'static str),
    /// A single field nested in a sub-document, e.g.
    /// `steps.addressLookup.currentPostcode`.
    StepField(&'static str, &'static str),
    /// The `final` section of the record.
    Final,
}

const PERSONAL_FIELDS: [&str; 7] = [
    "iva", "title", "firstName", "lastName", "dob", "email", "phone",
];
const ADDRESS_FIELDS: [&str; 4] = [
    "currentPostcode",
    "currentAddress",
    "previousPostcode",
    "previousAddress",
];
const FINAL_FIELDS: [&str; 2] = ["signatureBase64", "signatureFileUrl"];

/// Splits flat cumulative form values into the `{steps, final}` envelope
/// the save endpoint stores. Consent is deliberately left out — consent
/// records are minted by step validation, never by a progress save — and
/// UI-only flags do not persist at all.
pub fn save_envelope(values: &serde_json::Map<String, serde_json::Value>) -> serde_json::Value {
    let mut personal = serde_json::Map::new();
    let mut address = serde_json::Map::new();
    let mut final_section = serde_json::Map::new();

    for (key, value) in values {
        if PERSONAL_FIELDS.contains(&key.as_str()) {
            personal.insert(key.clone(), value.clone());
        } else if ADDRESS_FIELDS.contains(&key.as_str()) {
            address.insert(key.clone(), value.clone());
        } else if FINAL_FIELDS.contains(&key.as_str()) {
            final_section.insert(key.clone(), value.clone());
        }
    }

    let mut steps = serde_json::Map::new();
    if !personal.is_empty() {
        steps.insert("personalDetails".into(), serde_json::Value::Object(personal));
    }
    if !address.is_empty() {
        steps.insert("addressLookup".into(), serde_json::Value::Object(address));
    }

    let mut envelope = serde_json::Map::new();
    if !steps.is_empty() {
        envelope.insert("steps".into(), serde_json::Value::Object(steps));
    }
    if !final_section.is_empty() {
        envelope.insert("final".into(), serde_json::Value::Object(final_section));
    }
    serde_json::Value::Object(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_steps() {
        assert_eq!(StepId::parse("postcode"), Some(StepId::Postcode));
        assert_eq!(StepId::parse("personal-details"), Some(StepId::PersonalDetails));
        assert_eq!(StepId::parse("address-lookup"), Some(StepId::AddressLookup));
        assert_eq!(StepId::parse("final"), Some(StepId::Final));
        assert_eq!(StepId::parse("submit"), Some(StepId::Final));
        assert_eq!(StepId::parse("hello"), Some(StepId::Hello));
    }

    #[test]
    fn test_parse_unknown_step() {
        assert_eq!(StepId::parse("checkout"), None);
        assert_eq!(StepId::parse(""), None);
    }

    #[test]
    fn test_postcode_nests_inside_address_lookup() {
        assert_eq!(
            StepId::Postcode.storage_path(),
            StoragePath::StepField("addressLookup", "currentPostcode")
        );
    }

    #[test]
    fn test_flow_order_and_hidden_hello() {
        assert_eq!(StepId::Postcode.flow_index(), Some(0));
        assert_eq!(StepId::PersonalDetails.flow_index(), Some(1));
        assert_eq!(StepId::Final.flow_index(), Some(3));
        assert_eq!(StepId::Hello.flow_index(), None);
    }

    #[test]
    fn test_save_envelope_splits_by_section() {
        let values = serde_json::json!({
            "firstName": "John",
            "email": "john@example.com",
            "currentPostcode": "SW1A 1AA",
            "currentAddress": {"house": "10"},
            "signatureBase64": "data:image/jpeg;base64,aGVsbG8=",
            "consent": true,
            "showPrevAddressFlag": false,
        });
        let envelope = save_envelope(values.as_object().unwrap());

        assert_eq!(envelope["steps"]["personalDetails"]["firstName"], "John");
        assert_eq!(envelope["steps"]["addressLookup"]["currentPostcode"], "SW1A 1AA");
        assert_eq!(
            envelope["final"]["signatureBase64"],
            "data:image/jpeg;base64,aGVsbG8="
        );
        // Raw consent and UI flags never travel in a save.
        assert!(envelope["steps"]["personalDetails"].get("consent").is_none());
        assert!(envelope["steps"]["addressLookup"].get("showPrevAddressFlag").is_none());
    }

    #[test]
    fn test_save_envelope_of_nothing_is_empty() {
        let envelope = save_envelope(&serde_json::Map::new());
        assert_eq!(envelope, serde_json::json!({}));
    }
}

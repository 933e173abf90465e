//! Per-step validation contracts.
//!
//! Each step of the form has one contract. Given raw submitted JSON, a
//! contract either returns the normalized data for persistence or an
//! ordered list of [`Violation`]s. Checks run in declaration order and stop
//! at the first failing rule per field, so a field contributes at most one
//! violation per call and "missing" is always distinguishable from "wrong
//! shape" by key.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ErrorKind, FieldPath, Violation};
use crate::steps::StepId;
use crate::{dates, signature};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z ]+$").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^07\d{9}$").unwrap());

/// UK postcode shape, uppercase as submitted forms normalize it.
pub static POSTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}$").unwrap());

const NAME_MAX_LEN: usize = 100;
const TITLES: [&str; 4] = ["Mr", "Mrs", "Miss", "Ms"];

/// A step's validation contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSchema {
    Postcode,
    Hello,
    PersonalDetails,
    AddressLookup,
    FinalSubmit,
}

/// Resolves the contract for an external step name. `None` means the step
/// name itself is unknown, which callers must treat as a client error
/// distinct from a validation failure.
pub fn schema_for_step(step_id: &str) -> Option<StepSchema> {
    StepId::parse(step_id).map(contract_for)
}

/// The contract for an already-parsed step id.
pub fn contract_for(step: StepId) -> StepSchema {
    match step {
        StepId::Postcode => StepSchema::Postcode,
        StepId::Hello => StepSchema::Hello,
        StepId::PersonalDetails => StepSchema::PersonalDetails,
        StepId::AddressLookup => StepSchema::AddressLookup,
        StepId::Final => StepSchema::FinalSubmit,
    }
}

impl StepSchema {
    /// Runs the contract against raw submitted data.
    ///
    /// `today` anchors the age check so callers (and tests) control the
    /// clock. On success the returned map contains only the contract's
    /// fields, normalized (names trimmed, email lower-cased).
    pub fn validate(
        &self,
        data: &Value,
        today: NaiveDate,
    ) -> Result<Map<String, Value>, Vec<Violation>> {
        let Some(obj) = data.as_object() else {
            return Err(vec![Violation::new(
                FieldPath::root("data"),
                ErrorKind::Invalid,
                "field",
            )]);
        };

        let mut out = Map::new();
        let mut violations = Vec::new();

        match self {
            StepSchema::Postcode => {
                check_postcode(obj, "currentPostcode", true, &mut out, &mut violations);
            }
            StepSchema::Hello => {
                check_name(obj, "firstName", "firstName", &mut out, &mut violations);
            }
            StepSchema::PersonalDetails => {
                check_personal_details(obj, today, &mut out, &mut violations);
            }
            StepSchema::AddressLookup => {
                check_address_lookup(obj, &mut out, &mut violations);
            }
            StepSchema::FinalSubmit => {
                check_personal_details(obj, today, &mut out, &mut violations);
                check_address_object(obj, "currentAddress", true, &mut out, &mut violations);
                check_address_object(obj, "previousAddress", false, &mut out, &mut violations);
            }
        }

        if violations.is_empty() {
            Ok(out)
        } else {
            Err(violations)
        }
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    obj.get(field).and_then(Value::as_str)
}

/// First/last name: 2–100 chars, letters and spaces only, trimmed on output.
///
/// `required_key_base` preserves the original key quirk: the hello step
/// mints `firstName.required`/`firstName.tooLong`, while personal details
/// shares the generic `field.required`/`field.tooLong` tokens for the same
/// rules.
fn check_name(
    obj: &Map<String, Value>,
    field: &'static str,
    required_key_base: &'static str,
    out: &mut Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    let raw = str_field(obj, field).unwrap_or("");
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        violations.push(Violation::new(
            FieldPath::root(field),
            ErrorKind::Required,
            required_key_base,
        ));
    } else if trimmed.chars().count() < 2 {
        violations.push(Violation::on(field, ErrorKind::MinLength));
    } else if !NAME_RE.is_match(trimmed) {
        violations.push(Violation::on(field, ErrorKind::InvalidChars));
    } else if trimmed.chars().count() > NAME_MAX_LEN {
        violations.push(Violation::new(
            FieldPath::root(field),
            ErrorKind::TooLong,
            required_key_base,
        ));
    } else {
        out.insert(field.to_string(), Value::String(trimmed.to_string()));
    }
}

fn check_personal_details(
    obj: &Map<String, Value>,
    today: NaiveDate,
    out: &mut Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    // iva / title are closed enums; any other value reads as "not chosen".
    match str_field(obj, "iva") {
        Some(v) if v == "Yes" || v == "No" => {
            out.insert("iva".into(), Value::String(v.to_string()));
        }
        _ => violations.push(Violation::on("iva", ErrorKind::Required)),
    }

    match str_field(obj, "title") {
        Some(v) if TITLES.contains(&v) => {
            out.insert("title".into(), Value::String(v.to_string()));
        }
        _ => violations.push(Violation::on("title", ErrorKind::Required)),
    }

    check_name(obj, "firstName", "field", out, violations);
    check_name(obj, "lastName", "field", out, violations);

    let dob_raw = str_field(obj, "dob").unwrap_or("").trim();
    if dob_raw.is_empty() {
        violations.push(Violation::on("dob", ErrorKind::Required));
    } else {
        match dates::parse_dob(dob_raw) {
            None => violations.push(Violation::on("dob", ErrorKind::Invalid)),
            Some(dob) if !dates::meets_minimum_age(dob, today) => {
                violations.push(Violation::on("dob", ErrorKind::Underage));
            }
            Some(dob) => {
                out.insert(
                    "dob".into(),
                    Value::String(dob.format("%Y-%m-%d").to_string()),
                );
            }
        }
    }

    let email = str_field(obj, "email").unwrap_or("").trim().to_string();
    if email.is_empty() {
        violations.push(Violation::on("email", ErrorKind::Required));
    } else if !EMAIL_RE.is_match(&email) {
        violations.push(Violation::on("email", ErrorKind::InvalidFormat));
    } else {
        out.insert("email".into(), Value::String(email.to_lowercase()));
    }

    let phone = str_field(obj, "phone").unwrap_or("");
    if phone.is_empty() {
        violations.push(Violation::on("phone", ErrorKind::Required));
    } else if !PHONE_RE.is_match(phone) {
        violations.push(Violation::on("phone", ErrorKind::Format));
    } else {
        out.insert("phone".into(), Value::String(phone.to_string()));
    }

    // Consent must be literally true; anything else is a refusal.
    match obj.get("consent") {
        Some(Value::Bool(true)) => {
            out.insert("consent".into(), Value::Bool(true));
        }
        _ => violations.push(Violation::on("consent", ErrorKind::Required)),
    }

    let sig = str_field(obj, "signatureBase64").unwrap_or("");
    if sig.is_empty() {
        violations.push(Violation::on("signature", ErrorKind::Required));
    } else if signature::inline_size_exceeded(sig) {
        violations.push(Violation::on("signature", ErrorKind::TooLarge));
    } else {
        out.insert("signatureBase64".into(), Value::String(sig.to_string()));
    }

    // Carry an already-obtained durable URL through untouched.
    if let Some(url) = str_field(obj, "signatureFileUrl") {
        if !url.is_empty() {
            out.insert("signatureFileUrl".into(), Value::String(url.to_string()));
        }
    }
}

fn check_postcode(
    obj: &Map<String, Value>,
    field: &'static str,
    required: bool,
    out: &mut Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    let raw = str_field(obj, field).unwrap_or("").trim();
    if raw.is_empty() {
        if required {
            violations.push(Violation::on(field, ErrorKind::Required));
        }
        return;
    }
    if !POSTCODE_RE.is_match(raw) {
        violations.push(Violation::on(field, ErrorKind::Format));
    } else {
        out.insert(field.to_string(), Value::String(raw.to_string()));
    }
}

fn check_address_lookup(
    obj: &Map<String, Value>,
    out: &mut Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    check_postcode(obj, "currentPostcode", true, out, violations);
    check_address_object(obj, "currentAddress", false, out, violations);

    // A previous postcode is only demanded once the user opened the
    // previous-address section.
    let prev_required = obj
        .get("showPrevAddressFlag")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    check_postcode(obj, "previousPostcode", prev_required, out, violations);
    check_address_object(obj, "previousAddress", false, out, violations);
}

/// Validates and normalizes an address sub-object.
///
/// House, street, city and postcode are mandatory inside a present address;
/// county and district default to empty; the human-readable label rides
/// along so a stored address reproduces the lookup result exactly. An
/// absent or empty optional address stays absent — it is never normalized
/// to an empty object.
fn check_address_object(
    obj: &Map<String, Value>,
    field: &'static str,
    required: bool,
    out: &mut Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    let address = match obj.get(field) {
        Some(Value::Object(map)) if !map.is_empty() => map,
        Some(Value::Object(_)) | Some(Value::Null) | None => {
            if required {
                violations.push(Violation::new(
                    FieldPath::root(field),
                    ErrorKind::Required,
                    "address.field",
                ));
            }
            return;
        }
        Some(_) => {
            violations.push(Violation::new(
                FieldPath::root(field),
                ErrorKind::Invalid,
                "field",
            ));
            return;
        }
    };

    let mut normalized = Map::new();
    let before = violations.len();
    for part in ["house", "street", "city", "postcode"] {
        let value = address.get(part).and_then(Value::as_str).unwrap_or("");
        if value.trim().is_empty() {
            violations.push(Violation::new(
                FieldPath::root(field).child(part),
                ErrorKind::Required,
                "address.field",
            ));
        } else {
            normalized.insert(part.to_string(), Value::String(value.to_string()));
        }
    }
    for part in ["county", "district", "label"] {
        let value = address.get(part).and_then(Value::as_str).unwrap_or("");
        normalized.insert(part.to_string(), Value::String(value.to_string()));
    }

    if violations.len() == before {
        out.insert(field.to_string(), Value::Object(normalized));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    fn valid_personal_details() -> Value {
        json!({
            "iva": "No",
            "title": "Mr",
            "firstName": "  John ",
            "lastName": "Smith",
            "dob": "1976-06-10",
            "email": "John.Smith@Example.COM",
            "phone": "07123456789",
            "consent": true,
            "signatureBase64": "data:image/jpeg;base64,aGVsbG8=",
        })
    }

    fn keys(err: &[Violation]) -> Vec<String> {
        err.iter().map(Violation::message_key).collect()
    }

    #[test]
    fn test_unknown_step_has_no_schema() {
        assert!(schema_for_step("checkout").is_none());
        assert!(schema_for_step("personal-details").is_some());
        assert_eq!(schema_for_step("submit"), Some(StepSchema::FinalSubmit));
    }

    #[test]
    fn test_personal_details_valid_and_normalized() {
        let out = StepSchema::PersonalDetails
            .validate(&valid_personal_details(), today())
            .unwrap();
        assert_eq!(out["firstName"], "John");
        assert_eq!(out["email"], "john.smith@example.com");
        assert_eq!(out["dob"], "1976-06-10");
        assert_eq!(out["consent"], true);
    }

    #[test]
    fn test_ten_digit_phone_yields_single_format_violation() {
        let mut data = valid_personal_details();
        data["phone"] = json!("0712345678");
        let err = StepSchema::PersonalDetails
            .validate(&data, today())
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].field.to_string(), "phone");
        assert_eq!(err[0].message_key(), "phone.format");
    }

    #[test]
    fn test_missing_phone_is_required_not_format() {
        let mut data = valid_personal_details();
        data.as_object_mut().unwrap().remove("phone");
        let err = StepSchema::PersonalDetails
            .validate(&data, today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["phone.required"]);
    }

    #[test]
    fn test_consent_false_is_rejected() {
        let mut data = valid_personal_details();
        data["consent"] = json!(false);
        let err = StepSchema::PersonalDetails
            .validate(&data, today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["consent.required"]);
    }

    #[test]
    fn test_dob_exactly_eighteen_passes_one_day_short_fails() {
        let mut data = valid_personal_details();
        data["dob"] = json!("2008-08-07");
        assert!(StepSchema::PersonalDetails.validate(&data, today()).is_ok());

        data["dob"] = json!("2008-08-08");
        let err = StepSchema::PersonalDetails
            .validate(&data, today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["dob.underage"]);
    }

    #[test]
    fn test_name_rule_order_stops_at_first_failure() {
        let mut data = valid_personal_details();
        data["firstName"] = json!("J");
        let err = StepSchema::PersonalDetails
            .validate(&data, today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["firstName.minLength"]);

        data["firstName"] = json!("J0hn");
        let err = StepSchema::PersonalDetails
            .validate(&data, today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["firstName.invalidChars"]);

        data["firstName"] = json!("");
        let err = StepSchema::PersonalDetails
            .validate(&data, today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["field.required"]);
    }

    #[test]
    fn test_hello_step_uses_its_own_required_key() {
        let err = StepSchema::Hello
            .validate(&json!({"firstName": ""}), today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["firstName.required"]);
    }

    #[test]
    fn test_postcode_step() {
        let out = StepSchema::Postcode
            .validate(&json!({"currentPostcode": "SW1A 1AA"}), today())
            .unwrap();
        assert_eq!(out["currentPostcode"], "SW1A 1AA");

        let err = StepSchema::Postcode
            .validate(&json!({"currentPostcode": "12345"}), today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["currentPostcode.format"]);

        let err = StepSchema::Postcode
            .validate(&json!({}), today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["currentPostcode.required"]);
    }

    #[test]
    fn test_address_lookup_previous_postcode_required_only_when_flagged() {
        let base = json!({"currentPostcode": "SW1A 1AA"});
        assert!(StepSchema::AddressLookup.validate(&base, today()).is_ok());

        let flagged = json!({"currentPostcode": "SW1A 1AA", "showPrevAddressFlag": true});
        let err = StepSchema::AddressLookup
            .validate(&flagged, today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["previousPostcode.required"]);
    }

    #[test]
    fn test_address_lookup_drops_empty_previous_address() {
        let data = json!({
            "currentPostcode": "SW1A 1AA",
            "previousAddress": {},
        });
        let out = StepSchema::AddressLookup.validate(&data, today()).unwrap();
        assert!(!out.contains_key("previousAddress"));
    }

    #[test]
    fn test_address_object_round_trips_label() {
        let data = json!({
            "currentPostcode": "SW1A 1AA",
            "currentAddress": {
                "house": "10", "street": "Downing Street", "city": "London",
                "county": "Greater London", "postcode": "SW1A 2AA",
                "label": "10 Downing Street, London, SW1A 2AA",
            },
        });
        let out = StepSchema::AddressLookup.validate(&data, today()).unwrap();
        let addr = out["currentAddress"].as_object().unwrap();
        assert_eq!(addr["label"], "10 Downing Street, London, SW1A 2AA");
        assert_eq!(addr["county"], "Greater London");
        assert_eq!(addr["district"], "");
    }

    #[test]
    fn test_incomplete_address_flags_each_missing_part() {
        let data = json!({
            "currentPostcode": "SW1A 1AA",
            "currentAddress": {"house": "10", "street": "", "city": "London"},
        });
        let err = StepSchema::AddressLookup.validate(&data, today()).unwrap_err();
        let fields: Vec<String> = err.iter().map(|v| v.field.to_string()).collect();
        assert_eq!(fields, vec!["currentAddress.street", "currentAddress.postcode"]);
        assert!(err.iter().all(|v| v.message_key() == "address.field.required"));
    }

    #[test]
    fn test_final_submit_requires_current_address() {
        let err = StepSchema::FinalSubmit
            .validate(&valid_personal_details(), today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["address.field.required"]);
        assert_eq!(err[0].field.to_string(), "currentAddress");
    }

    #[test]
    fn test_validate_step_is_idempotent() {
        let data = valid_personal_details();
        let first = StepSchema::PersonalDetails.validate(&data, today()).unwrap();
        let second = StepSchema::PersonalDetails.validate(&data, today()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_object_payload() {
        let err = StepSchema::PersonalDetails
            .validate(&json!("nope"), today())
            .unwrap_err();
        assert_eq!(keys(&err), vec!["field.invalid"]);
    }
}

//! Typed validation violations.
//!
//! A violation carries a structured field locator plus an error kind, and
//! renders to a stable message key (e.g. `firstName.minLength`) so the
//! presentation layer can translate keys to human sentences independently
//! of validation logic.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured locator for the field a violation refers to.
///
/// Paths are built from segments (`currentAddress` / `house`) rather than
/// string concatenation; `Display` joins them with dots for the wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// A single-segment path.
    pub fn root(segment: impl Into<String>) -> Self {
        FieldPath(vec![segment.into()])
    }

    /// Extends the path with a nested segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        FieldPath(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The final segment, e.g. `house` for `currentAddress.house`.
    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// What went wrong with a field, independent of which field it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Value missing or empty where one is required.
    Required,
    /// Below the minimum length for the field.
    MinLength,
    /// Contains characters outside the allowed set.
    InvalidChars,
    /// Above the maximum length for the field.
    TooLong,
    /// Does not match the required shape (phone, postcode).
    Format,
    /// Does not match the required shape, email spelling of the same idea.
    InvalidFormat,
    /// Not parseable as the expected value (e.g. a date).
    Invalid,
    /// Date of birth under the minimum age.
    Underage,
    /// Well-formed postcode but the provider returned no candidates.
    LookupNoResults,
    /// The address provider call itself failed.
    LookupFailed,
    /// Postcode present but no suggestion was picked from the lookup.
    SelectAddressRequired,
    /// Inline signature payload over the size bound.
    TooLarge,
}

impl ErrorKind {
    /// The stable key suffix for this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            ErrorKind::Required => "required",
            ErrorKind::MinLength => "minLength",
            ErrorKind::InvalidChars => "invalidChars",
            ErrorKind::TooLong => "tooLong",
            ErrorKind::Format => "format",
            ErrorKind::InvalidFormat => "invalidFormat",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Underage => "underage",
            ErrorKind::LookupNoResults => "lookupNoResults",
            ErrorKind::LookupFailed => "lookupFailed",
            ErrorKind::SelectAddressRequired => "selectAddressRequired",
            ErrorKind::TooLarge => "tooLarge",
        }
    }
}

/// One field-level validation failure.
///
/// `key_base` is the token namespace the message key is minted under. It
/// usually matches the field (`firstName`), but nested address fields share
/// the generic `address.field` namespace and cross-field fallbacks use
/// `field`, so it is tracked separately from the locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: FieldPath,
    pub kind: ErrorKind,
    key_base: String,
}

impl Violation {
    pub fn new(field: FieldPath, kind: ErrorKind, key_base: impl Into<String>) -> Self {
        Violation {
            field,
            kind,
            key_base: key_base.into(),
        }
    }

    /// Shorthand for the common case where the key namespace is the field.
    pub fn on(field: &str, kind: ErrorKind) -> Self {
        Violation::new(FieldPath::root(field), kind, field)
    }

    /// The stable message key, e.g. `firstName.minLength` or
    /// `address.field.required`.
    pub fn message_key(&self) -> String {
        format!("{}.{}", self.key_base, self.kind.suffix())
    }
}

/// Wire shape for one field error: `{field, message}` where `message` is
/// the stable key, not a human sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl From<&Violation> for FieldError {
    fn from(v: &Violation) -> Self {
        FieldError {
            field: v.field.to_string(),
            message: v.message_key(),
        }
    }
}

/// Renders violations into the wire shape, preserving order.
pub fn to_field_errors(violations: &[Violation]) -> Vec<FieldError> {
    violations.iter().map(FieldError::from).collect()
}

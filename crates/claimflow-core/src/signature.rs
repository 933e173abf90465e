//! Inline signature handling.
//!
//! The capture surface ships the signature as a `data:image/...;base64,`
//! string, already downscaled onto a white background and re-encoded at
//! reduced quality. This module parses that envelope, enforces the inline
//! size bound, and mints the object-store key a durable copy is filed
//! under.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};

/// Upper bound for the decoded inline payload. Capture-side compression
/// targets well under this; anything bigger is rejected rather than stored
/// inline.
pub const MAX_INLINE_BYTES: usize = 100 * 1024;

/// A decoded signature image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureImage {
    /// Mime subtype from the data URL, e.g. `png`, `jpeg`, `webp`.
    pub format: String,
    pub bytes: Vec<u8>,
}

/// Signature payload errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature payload is empty")]
    Empty,
    #[error("signature is not a base64 image data URL")]
    NotAnImage,
    #[error("signature base64 payload is malformed")]
    MalformedBase64,
    #[error("decoded signature is {0} bytes, over the {MAX_INLINE_BYTES} byte bound")]
    TooLarge(usize),
}

/// Parses a `data:image/<fmt>;base64,<payload>` string and enforces the
/// size bound. A bare base64 string (no data-URL header) is accepted and
/// treated as PNG, matching what older capture clients send.
pub fn parse_data_url(raw: &str) -> Result<SignatureImage, SignatureError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SignatureError::Empty);
    }

    let (format, payload) = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(SignatureError::NotAnImage)?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or(SignatureError::NotAnImage)?;
            let format = mime
                .strip_prefix("image/")
                .ok_or(SignatureError::NotAnImage)?;
            (format.to_string(), payload)
        }
        None => ("png".to_string(), trimmed),
    };

    let bytes = BASE64_STANDARD
        .decode(payload)
        .map_err(|_| SignatureError::MalformedBase64)?;

    if bytes.len() > MAX_INLINE_BYTES {
        return Err(SignatureError::TooLarge(bytes.len()));
    }

    Ok(SignatureImage {
        format,
        bytes,
    })
}

/// Cheap pre-check used by the schema contract: would the inline payload
/// blow the size bound once decoded? Base64 expands 3 bytes to 4 chars, so
/// the encoded length bounds the decoded size without a full decode.
pub fn inline_size_exceeded(raw: &str) -> bool {
    let payload_len = raw
        .split_once(',')
        .map(|(_, payload)| payload.len())
        .unwrap_or(raw.len());
    payload_len / 4 * 3 > MAX_INLINE_BYTES
}

/// Object-store key for a signature, incorporating the owning form id and
/// the upload instant: `signature_<formId>_<millis>.<ext>`.
pub fn object_key(form_id: &str, uploaded_at: DateTime<Utc>, format: &str) -> String {
    let ext = match format {
        "jpeg" => "jpg",
        other => other,
    };
    format!(
        "signature_{}_{}.{}",
        form_id,
        uploaded_at.timestamp_millis(),
        ext
    )
}

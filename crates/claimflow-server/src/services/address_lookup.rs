//! Address provider client.
//!
//! Wraps the getAddress-shaped provider API behind a narrow contract:
//! postcode in, normalized [`Address`] candidates out. Provider records
//! missing any of house, street, city or postcode are dropped silently.

use serde::Deserialize;

use claimflow_core::lookup::{filter_complete, Address};

/// Provider call failures. Distinct from an empty result, which is a valid
/// response the caller presents differently.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("address provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("address provider returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    postcode: String,
    #[serde(default)]
    addresses: Vec<ProviderAddress>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProviderAddress {
    line_1: String,
    line_2: String,
    line_3: String,
    town_or_city: String,
    county: String,
    district: String,
}

#[derive(Debug, Clone)]
pub struct AddressLookupClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AddressLookupClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        AddressLookupClient {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Finds candidate addresses for a postcode. The returned list is
    /// already filtered to complete records; it may legitimately be empty.
    pub async fn find(&self, postcode: &str) -> Result<Vec<Address>, LookupError> {
        let url = format!(
            "{}/find/{}?api-key={}&expand=true",
            self.base_url.trim_end_matches('/'),
            urlencode(postcode),
            self.api_key,
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }
        let body: ProviderResponse = response.json().await?;
        Ok(filter_complete(normalize(body)))
    }
}

/// Minimal percent-encoding for the postcode path segment (spaces and a
/// conservative reserved set; postcodes are alphanumeric plus one space).
fn urlencode(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            other => format!("%{:02X}", other as u32),
        })
        .collect()
}

fn normalize(body: ProviderResponse) -> Vec<Address> {
    let postcode = body.postcode;
    body.addresses
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let street = [record.line_2.as_str(), record.line_3.as_str()]
                .iter()
                .filter(|part| !part.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            let county = if record.county.is_empty() {
                record.district.clone()
            } else {
                record.county.clone()
            };
            let label = format!(
                "{}, {}, {}",
                [record.line_1.as_str(), street.as_str()]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" "),
                record.town_or_city,
                postcode,
            );
            Address {
                id: index.to_string(),
                label,
                house: record.line_1,
                street,
                city: record.town_or_city,
                county,
                district: record.district,
                postcode: postcode.clone(),
            }
        })
        .collect()
}

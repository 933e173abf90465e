//! Lead payload mapping.
//!
//! Flattens a lead's stored data plus delivery metadata into the exact
//! case-sensitive field set the downstream CRM expects. Every key is always
//! present with an empty-string fallback — the CRM schema has fixed keys
//! and treats absence as a malformed lead. Credentials are not part of the
//! mapped payload; the delivery service injects them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::{self, dob_parts};
use crate::lookup::Address;
use crate::user_agent::classify_user_agent;

/// Default product identifier for this campaign.
pub const DEFAULT_PRODUCT_ID: u32 = 329;
/// Default lead buyer tag.
pub const DEFAULT_BUYER: &str = "NAASS";

/// Flattened view of one lead, assembled from the Form Record.
#[derive(Debug, Clone, Default)]
pub struct LeadSnapshot {
    pub iva: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub email: String,
    pub phone: String,
    pub current_postcode: String,
    pub current_address: Option<Address>,
    pub previous_address: Option<Address>,
    pub signature_base64: String,
    pub signature_file_url: String,
}

/// Delivery-time metadata that does not live on the lead itself.
#[derive(Debug, Clone, Default)]
pub struct DeliveryMeta {
    pub aff_id: String,
    pub user_ip: String,
    pub user_agent: String,
    pub optin_url: String,
    pub landing_at: Option<DateTime<Utc>>,
    pub signature_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub product_id: Option<u32>,
    pub price: Option<f64>,
    pub buyer: Option<String>,
}

/// The flat CRM payload. Field names are the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[allow(non_snake_case)]
pub struct CrmPayload {
    pub productId: u32,
    pub price: f64,

    pub email: String,
    pub phoneNumber: String,
    pub title: String,
    pub firstName: String,
    pub lastName: String,
    pub landline: String,

    pub houseNo: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub county: String,
    pub postCode: String,

    pub dateOfBirth: String,
    pub dob: String,
    pub dob_day: String,
    pub dob_month: String,
    pub dob_year: String,

    pub creditReportPdf: String,
    pub signature: String,
    pub signatureFileUrl: String,

    pub userBrowser: String,
    pub userDevice: String,
    pub userOs: String,
    pub userAgent: String,
    pub userIp: String,

    pub iva: String,
    pub aff_id: String,

    pub fullAddressCurrent: String,
    pub fullAddressPrevious: String,

    pub prev_address1: String,
    pub prev_address2: String,
    pub prev_address_city: String,
    pub prev_address_county: String,
    pub prev_address_postcode: String,
    pub prev_house_no: String,

    pub landingTime: String,
    pub signatureTime: String,
    pub submissionTime: String,

    pub stlLeadId: String,
    pub buyer: String,
    pub optinurl: String,
    pub partner_tracking_id: String,
    pub transaction_id: String,
}

/// One-line rendering of an address: non-empty parts joined by `, `.
fn full_address(address: Option<&Address>) -> String {
    let Some(addr) = address else {
        return String::new();
    };
    [
        addr.house.as_str(),
        addr.street.as_str(),
        addr.city.as_str(),
        addr.county.as_str(),
        addr.postcode.as_str(),
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .cloned()
    .collect::<Vec<_>>()
    .join(", ")
}

fn fmt_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(dates::format_crm_timestamp).unwrap_or_default()
}

/// Maps a lead and its delivery metadata into the CRM payload. Total: every
/// key is populated, missing source data becomes an empty string, and the
/// previous-address block is emitted (empty) even when the lead has none.
pub fn map_lead(lead: &LeadSnapshot, meta: &DeliveryMeta) -> CrmPayload {
    let dob = dob_parts(lead.dob);
    let client = classify_user_agent(&meta.user_agent);

    let current = lead.current_address.as_ref();
    let previous = lead.previous_address.as_ref();
    let field = |part: Option<&String>| part.cloned().unwrap_or_default();

    CrmPayload {
        productId: meta.product_id.unwrap_or(DEFAULT_PRODUCT_ID),
        price: meta.price.unwrap_or(0.0),

        email: lead.email.clone(),
        phoneNumber: lead.phone.clone(),
        title: lead.title.clone(),
        firstName: lead.first_name.clone(),
        lastName: lead.last_name.clone(),
        landline: String::new(),

        houseNo: field(current.map(|a| &a.house)),
        address1: field(current.map(|a| &a.street)),
        address2: field(current.map(|a| &a.district)),
        city: field(current.map(|a| &a.city)),
        county: field(current.map(|a| &a.county)),
        postCode: current
            .map(|a| a.postcode.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| lead.current_postcode.clone()),

        dateOfBirth: dob.iso,
        dob: dob.localized,
        dob_day: dob.day,
        dob_month: dob.month,
        dob_year: dob.year,

        creditReportPdf: "Not Found".to_string(),
        signature: lead.signature_base64.clone(),
        signatureFileUrl: lead.signature_file_url.clone(),

        userBrowser: client.browser,
        userDevice: client.device,
        userOs: client.os,
        userAgent: meta.user_agent.clone(),
        userIp: meta.user_ip.clone(),

        iva: lead.iva.clone(),
        aff_id: meta.aff_id.clone(),

        fullAddressCurrent: full_address(current),
        fullAddressPrevious: full_address(previous),

        prev_address1: field(previous.map(|a| &a.street)),
        prev_address2: field(previous.map(|a| &a.district)),
        prev_address_city: field(previous.map(|a| &a.city)),
        prev_address_county: field(previous.map(|a| &a.county)),
        prev_address_postcode: field(previous.map(|a| &a.postcode)),
        prev_house_no: field(previous.map(|a| &a.house)),

        landingTime: fmt_time(meta.landing_at),
        signatureTime: fmt_time(meta.signature_at.or(meta.landing_at)),
        submissionTime: fmt_time(meta.submitted_at),

        stlLeadId: String::new(),
        buyer: meta.buyer.clone().unwrap_or_else(|| DEFAULT_BUYER.to_string()),
        optinurl: meta.optin_url.clone(),
        partner_tracking_id: String::new(),
        transaction_id: String::new(),
    }
}

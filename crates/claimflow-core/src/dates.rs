//! Date parsing and the textual formats the downstream CRM expects.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Minimum age for a claimant.
pub const MINIMUM_AGE_YEARS: i32 = 18;

/// Parses a submitted date of birth. Accepts `YYYY-MM-DD` and full RFC 3339
/// timestamps (date pickers send either).
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Whether `dob` is at least [`MINIMUM_AGE_YEARS`] before `today`.
///
/// A birthday exactly `MINIMUM_AGE_YEARS` years ago counts as of age.
pub fn meets_minimum_age(dob: NaiveDate, today: NaiveDate) -> bool {
    let cutoff = latest_allowed_dob(today);
    dob <= cutoff
}

/// The latest date of birth that still passes the age check on `today`.
fn latest_allowed_dob(today: NaiveDate) -> NaiveDate {
    // Feb 29 birthdays clamp to Feb 28 in non-leap years.
    today
        .with_year(today.year() - MINIMUM_AGE_YEARS)
        .unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(today.year() - MINIMUM_AGE_YEARS, today.month(), 28)
                .expect("day 28 exists in every month")
        })
}

/// Date-of-birth renderings the CRM payload carries side by side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DobParts {
    /// `YYYY-MM-DD`
    pub iso: String,
    /// `DD/MM/YYYY`
    pub localized: String,
    pub day: String,
    pub month: String,
    pub year: String,
}

/// Renders a date of birth into every form the CRM wants. `None` yields
/// empty strings for all parts.
pub fn dob_parts(dob: Option<NaiveDate>) -> DobParts {
    match dob {
        None => DobParts::default(),
        Some(d) => DobParts {
            iso: d.format("%Y-%m-%d").to_string(),
            localized: d.format("%d/%m/%Y").to_string(),
            day: format!("{:02}", d.day()),
            month: format!("{:02}", d.month()),
            year: d.year().to_string(),
        },
    }
}

/// Formats a timestamp as `DD/MM/YYYY HH:mm:ss UTC±HH`, the exact textual
/// form the CRM parses. All pipeline timestamps are UTC, so the offset is
/// always `+00`.
pub fn format_crm_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%d/%m/%Y %H:%M:%S UTC+00").to_string()
}

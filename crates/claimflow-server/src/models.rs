//! Database models for the claimflow server.

pub mod aff_credential;
pub mod form;

pub use aff_credential::AffCredential;
pub use form::{ConsentRecord, CrmStatus, FormRecord};

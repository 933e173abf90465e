//! Outbound collaborators and reference-data services.

pub mod address_lookup;
pub mod affiliates;
pub mod crm;
pub mod secrets;
pub mod signature_store;

pub use address_lookup::AddressLookupClient;
pub use affiliates::{ensure_default_affiliate, resolve_affiliate, AffiliateResolution};
pub use crm::{CrmDelivery, DeliveryOutcome};
pub use signature_store::SignatureStore;

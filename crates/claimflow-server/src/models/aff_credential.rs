//! Affiliate credential reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Credentials for one affiliate id. Maintained by an administrative
/// process; the pipeline only ever reads rows. `api_password_ref` is a
/// reference into the secret store, never the secret value.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AffCredential {
    pub aff_id: String,
    pub api_id: String,
    pub api_password_ref: String,
    pub created_at: DateTime<Utc>,
}

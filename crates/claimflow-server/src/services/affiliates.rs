//! Affiliate credential resolution.

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::AffCredential;

/// Outcome of resolving an affiliate id to credentials. Carries both what
/// was asked for and what was actually used, so attribution survives the
/// fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliateResolution {
    /// The id the lead arrived with, if any.
    pub requested: Option<String>,
    /// The id the lookup ultimately used.
    pub resolved: String,
    /// True when the configured default stood in for the requested id (or
    /// for no id at all).
    pub was_defaulted: bool,
    /// External API id, absent when no credential row was found anywhere.
    pub api_id: Option<String>,
    /// Reference to the API secret, never the secret itself.
    pub api_password_ref: Option<String>,
}

async fn find_credential(
    pool: &PgPool,
    aff_id: &str,
) -> Result<Option<AffCredential>, AppError> {
    let row = sqlx::query_as::<_, AffCredential>(
        "SELECT aff_id, api_id, api_password_ref, created_at \
         FROM aff_credentials WHERE aff_id = $1",
    )
    .bind(aff_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Resolves credentials for a lead.
///
/// Identity priority: the id already on the Form Record, then the id
/// supplied on this call, then the configured default (marked defaulted).
/// If the chosen id has no credential row, the default is retried — and the
/// result is marked defaulted even though a different id was requested. No
/// credentials anywhere still reports the id that was attempted; the caller
/// decides whether to proceed.
pub async fn resolve_affiliate(
    pool: &PgPool,
    record_aff_id: Option<&str>,
    incoming_aff_id: Option<&str>,
    default_aff_id: &str,
) -> Result<AffiliateResolution, AppError> {
    let requested = record_aff_id
        .or(incoming_aff_id)
        .map(str::to_string);
    let (candidate, was_defaulted) = match &requested {
        Some(id) => (id.clone(), false),
        None => (default_aff_id.to_string(), true),
    };

    if let Some(cred) = find_credential(pool, &candidate).await? {
        return Ok(AffiliateResolution {
            requested,
            resolved: candidate,
            was_defaulted,
            api_id: Some(cred.api_id),
            api_password_ref: Some(cred.api_password_ref),
        });
    }

    if candidate != default_aff_id {
        if let Some(cred) = find_credential(pool, default_aff_id).await? {
            return Ok(AffiliateResolution {
                requested,
                resolved: default_aff_id.to_string(),
                was_defaulted: true,
                api_id: Some(cred.api_id),
                api_password_ref: Some(cred.api_password_ref),
            });
        }
    }

    tracing::warn!(
        attempted = %candidate,
        "no affiliate credentials found, reporting empty credential fields"
    );
    Ok(AffiliateResolution {
        requested,
        resolved: candidate,
        was_defaulted,
        api_id: None,
        api_password_ref: None,
    })
}

/// Startup invariant: the default affiliate's credentials must exist.
/// Called from `main` before the server binds; a missing row is fatal.
pub async fn ensure_default_affiliate(
    pool: &PgPool,
    default_aff_id: &str,
) -> anyhow::Result<()> {
    let found = find_credential(pool, default_aff_id)
        .await
        .map_err(|e| anyhow::anyhow!("default affiliate lookup failed: {e}"))?;
    if found.is_none() {
        anyhow::bail!(
            "DEFAULT_AFF_ID={default_aff_id} has no row in aff_credentials; \
             add credentials for it or point DEFAULT_AFF_ID at a valid affiliate"
        );
    }
    Ok(())
}

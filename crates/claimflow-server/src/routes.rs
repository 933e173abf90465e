//! API routes for the claimflow server.

pub mod address;
pub mod forms;
pub mod upload;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::services::{AddressLookupClient, CrmDelivery, SignatureStore};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub lookup: AddressLookupClient,
    pub crm: CrmDelivery,
    /// Absent when no object store is configured; signatures then stay
    /// inline-only.
    pub signatures: Option<SignatureStore>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        let http = reqwest::Client::new();
        let lookup = AddressLookupClient::new(
            http.clone(),
            config.address_lookup_url.clone(),
            config.address_lookup_api_key.clone(),
        );
        let crm = CrmDelivery::new(http.clone(), config.crm_url.clone());
        let signatures = config.signature_store_url.as_ref().map(|put_base| {
            let public_base = config
                .signature_public_url
                .clone()
                .unwrap_or_else(|| put_base.clone());
            SignatureStore::new(
                http,
                put_base.clone(),
                public_base,
                config.signature_store_token.clone(),
            )
        });
        AppState {
            pool,
            config: Arc::new(config),
            lookup,
            crm,
            signatures,
        }
    }
}

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/forms/validate-step", post(forms::validate_step))
        .route("/forms/save", post(forms::save_form))
        .route("/forms/submit", post(forms::submit_form))
        .route("/address/lookup", post(address::lookup))
        .route("/upload/signature", post(upload::upload_signature))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// Submitting client's ip and user agent, from proxy headers. The consent
/// record and CRM payload both want these; absence becomes empty strings.
pub fn request_client(headers: &HeaderMap) -> (String, String) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("")
        .trim()
        .to_string();
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    (ip, user_agent)
}

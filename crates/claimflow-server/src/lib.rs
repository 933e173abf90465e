//! Claimflow Server - lead-capture API
//!
//! This crate provides the HTTP API for the multi-step claim form: per-step
//! validation and persistence, address lookup, signature upload and the
//! final submission pipeline that hands finished leads to the CRM.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::AppError;
pub use routes::{create_router, AppState};

//! Maintenance workflows for the product catalog.
//!
//! This crate ties the CSV reader, the rule table, the store and the API
//! client together into the operations the CLI exposes: spreadsheet scans,
//! chemistry consolidation, per-item updates, verification and image checks.

pub mod auth;
pub mod catalog;
pub mod consolidate;
pub mod filter;
pub mod images;
pub mod progress;
pub mod updates;
pub mod verify;

pub use auth::{CredentialVerifier, DigestCredentials};
pub use catalog::{Catalog, RemoteCatalog};
pub use progress::{BatchProgress, SilentProgress};

//! Shared types, error model, rule tables, and configuration for prodcat.
//!
//! This crate is the foundation depended on by all other prodcat crates.
//! It provides:
//! - [`ProdcatError`]: the unified error type
//! - Domain types ([`Product`], [`TechnicalProperty`], [`ChemistryCount`])
//! - Rule tables ([`RuleTable`], [`MembershipRule`], [`ReclassificationRule`])
//! - Configuration ([`AppConfig`], config loading, env resolution)

pub mod config;
pub mod error;
pub mod rules;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, DatabaseConfig, DatabaseSettings, ImagesConfig, RulesConfig, UserEntry,
    api_base_url, config_dir, config_file_path, database_settings, init_config, load_config,
    load_config_from,
};
pub use error::{ProdcatError, Result};
pub use rules::{MembershipRule, ReclassificationRule, RuleOverlap, RuleTable};
pub use types::{ChemistryCount, Product, TechnicalProperty, new_record_id};

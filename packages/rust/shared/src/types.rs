//! Core domain types for the product catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A single technical property row (`Viscosity`, `3500`, `cps`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TechnicalProperty {
    pub property: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One catalog entry, keyed by its business identifier `product_id`.
///
/// Everything except `product_id` is optional; records coming from the API or
/// from import files routinely omit fields, so every field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Internal row id (UUID v7 for records created by this tool).
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Unique business identifier, e.g. `C150` or `T-R682`.
    pub product_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub full_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub industry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemistry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub technical: Vec<TechnicalProperty>,
    #[serde(default)]
    pub sizing: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_equipment: Option<String>,
    #[serde(default = "default_published")]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<DateTime<Utc>>,
}

fn default_published() -> bool {
    true
}

/// Accept `null` and numbers where a string is expected; API rows carry both.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl Product {
    /// A minimal record with a fresh internal id.
    pub fn new(product_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            product_id: product_id.into(),
            name: name.into(),
            full_name: String::new(),
            description: String::new(),
            brand: String::new(),
            industry: String::new(),
            chemistry: None,
            url: None,
            image: None,
            benefits: Vec::new(),
            applications: Vec::new(),
            technical: Vec::new(),
            sizing: Vec::new(),
            color: None,
            cleanup: None,
            recommended_equipment: None,
            published: true,
            last_edited: None,
        }
    }

    /// Name for display: full name when present, otherwise the short name.
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.name
        } else {
            &self.full_name
        }
    }

    /// Chemistry for display, `N/A` when unset.
    pub fn chemistry_or_na(&self) -> &str {
        self.chemistry.as_deref().filter(|c| !c.is_empty()).unwrap_or("N/A")
    }
}

/// Generate a new time-sortable internal record id.
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// Chemistry label counts, as reported after a consolidation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChemistryCount {
    pub chemistry: String,
    pub count: u64,
}

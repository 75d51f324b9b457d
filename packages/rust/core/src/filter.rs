//! Row selection over product-list spreadsheets.
//!
//! Column names follow the product-list export: `Product ID`, `Product Name`,
//! `Industry`, `Chemistry`, `Size`, `OK?` and `On New Site Now`.

use std::collections::HashSet;

use prodcat_csv::{CsvTable, Record};
use prodcat_shared::{MembershipRule, Product, RuleTable};
use tracing::debug;

pub const PRODUCT_ID: &str = "Product ID";
pub const PRODUCT_NAME: &str = "Product Name";
pub const INDUSTRY: &str = "Industry";
pub const CHEMISTRY: &str = "Chemistry";
pub const SIZE: &str = "Size";
pub const STATUS: &str = "OK?";
pub const ON_NEW_SITE: &str = "On New Site Now";

/// Identifier cells that are not real products (placeholders, repeated headers).
const PLACEHOLDER_IDS: &[&str] = &["", "???", "N/A", PRODUCT_ID];

/// True when `id` is usable as a product identifier.
pub fn is_real_id(id: &str) -> bool {
    !PLACEHOLDER_IDS.contains(&id)
}

/// Records whose rule column satisfies `rule`, in input order.
pub fn members<'a>(table: &'a CsvTable, rule: &MembershipRule) -> Vec<&'a Record> {
    let selected: Vec<&Record> = table
        .records
        .iter()
        .filter(|r| rule.matches_value(r.get(&rule.column)))
        .collect();
    debug!(
        rule = %rule.name,
        selected = selected.len(),
        total = table.records.len(),
        "membership filter applied"
    );
    selected
}

// ---------------------------------------------------------------------------
// Industry scan
// ---------------------------------------------------------------------------

/// One line of the industry scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRow {
    pub row_number: usize,
    pub product_id: String,
    pub name: String,
    pub industry: String,
    pub chemistry: String,
    pub size: String,
}

/// Result of scanning a spreadsheet with one membership rule.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub rows: Vec<ScanRow>,
    /// Matching records without a usable identifier.
    pub missing_id: usize,
    /// Identifiers appearing on more than one matching record.
    pub duplicates: Vec<String>,
}

/// Collect the member records of `rule` with their identifying fields.
pub fn scan(table: &CsvTable, rule: &MembershipRule) -> ScanReport {
    let mut report = ScanReport::default();
    let mut seen = HashSet::new();

    for record in members(table, rule) {
        let product_id = record.get(PRODUCT_ID);
        if !is_real_id(product_id) {
            report.missing_id += 1;
            continue;
        }
        if !seen.insert(product_id.to_string()) && !report.duplicates.iter().any(|d| d == product_id)
        {
            report.duplicates.push(product_id.to_string());
        }
        report.rows.push(ScanRow {
            row_number: record.row_number,
            product_id: product_id.to_string(),
            name: record.get(PRODUCT_NAME).to_string(),
            industry: record.get(INDUSTRY).to_string(),
            chemistry: record.get(CHEMISTRY).to_string(),
            size: record.get(SIZE).to_string(),
        });
    }
    report
}

// ---------------------------------------------------------------------------
// Pending chemistries
// ---------------------------------------------------------------------------

/// A spreadsheet row whose chemistry is still waiting to go live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChemistry {
    pub product_id: String,
    pub chemistry: String,
    pub status: String,
    pub on_new_site: String,
}

/// Rows whose status satisfies `rule` and that carry a known chemistry.
pub fn pending_chemistries(table: &CsvTable, rule: &MembershipRule) -> Vec<PendingChemistry> {
    members(table, rule)
        .into_iter()
        .filter(|r| is_real_id(r.get(PRODUCT_ID)))
        .filter(|r| !matches!(r.get(CHEMISTRY), "" | "???"))
        .map(|r| PendingChemistry {
            product_id: r.get(PRODUCT_ID).to_string(),
            chemistry: r.get(CHEMISTRY).to_string(),
            status: r.get(STATUS).to_string(),
            on_new_site: r.get(ON_NEW_SITE).to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Identifier check
// ---------------------------------------------------------------------------

/// Spreadsheet state for one requested identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdCheck {
    Found {
        product_id: String,
        chemistry: String,
        on_new_site: String,
        status: String,
    },
    Missing(String),
}

/// Look up each identifier in the sheet, in request order.
pub fn check_ids(table: &CsvTable, ids: &[String]) -> Vec<IdCheck> {
    ids.iter()
        .map(|id| {
            table
                .records
                .iter()
                .find(|r| r.get(PRODUCT_ID) == id)
                .map(|r| IdCheck::Found {
                    product_id: id.clone(),
                    chemistry: r.get(CHEMISTRY).to_string(),
                    on_new_site: r.get(ON_NEW_SITE).to_string(),
                    status: r.get(STATUS).to_string(),
                })
                .unwrap_or_else(|| IdCheck::Missing(id.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reclassification preview
// ---------------------------------------------------------------------------

/// A product the rule table would move to a different chemistry family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reclassification {
    pub product_id: String,
    pub from: Option<String>,
    pub to: String,
}

/// The changes `rules` would make to `products`, computed in memory with the
/// same precedence the store applies.
pub fn preview_reclassification(rules: &RuleTable, products: &[Product]) -> Vec<Reclassification> {
    products
        .iter()
        .filter_map(|p| {
            rules
                .reclassify(p.chemistry.as_deref(), &p.name)
                .map(|target| Reclassification {
                    product_id: p.product_id.clone(),
                    from: p.chemistry.clone(),
                    to: target.to_string(),
                })
        })
        .collect()
}

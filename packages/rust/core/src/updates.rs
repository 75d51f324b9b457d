//! Per-item field updates: chemistry import from a mapping sheet and
//! published-status changes.
//!
//! Every item is evaluated on its own. A failed lookup or write is recorded
//! against that item and the loop moves on; only a failure before the loop
//! starts aborts the batch.

use std::collections::HashMap;

use prodcat_csv::CsvTable;
use prodcat_shared::{Product, Result};
use tracing::{debug, info, instrument, warn};

use crate::catalog::Catalog;
use crate::filter::{CHEMISTRY, INDUSTRY, PRODUCT_ID};
use crate::progress::BatchProgress;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Changed, or would be changed in a dry run.
    Updated,
    NoChange,
    NotFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub product_id: String,
    pub old_value: String,
    pub new_value: String,
    pub status: UpdateStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSummary {
    pub dry_run: bool,
    pub results: Vec<UpdateResult>,
}

impl UpdateSummary {
    pub fn count(&self, status: UpdateStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn not_found(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.status == UpdateStatus::NotFound)
            .map(|r| r.product_id.as_str())
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|r| {
            r.error
                .as_deref()
                .map(|message| (r.product_id.as_str(), message))
        })
    }
}

// ---------------------------------------------------------------------------
// Chemistry mappings
// ---------------------------------------------------------------------------

/// One `Product ID` → `Chemistry` row of a mapping sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChemistryMapping {
    pub product_id: String,
    pub chemistry: String,
    pub industry: String,
}

/// Read mappings keyed by upper-cased identifier.
///
/// Rows with an empty or `N/A` identifier, or without a chemistry, are
/// skipped. When an identifier repeats, the later row wins but keeps the
/// position of the first.
pub fn chemistry_mappings(table: &CsvTable) -> Vec<ChemistryMapping> {
    let mut mappings: Vec<ChemistryMapping> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in &table.records {
        let product_id = record.get(PRODUCT_ID);
        let chemistry = record.get(CHEMISTRY);
        if product_id.is_empty() || product_id == "N/A" || chemistry.is_empty() {
            continue;
        }
        let mapping = ChemistryMapping {
            product_id: product_id.to_string(),
            chemistry: chemistry.to_string(),
            industry: record.get(INDUSTRY).to_string(),
        };
        match index.get(&product_id.to_ascii_uppercase()) {
            Some(&i) => mappings[i] = mapping,
            None => {
                index.insert(product_id.to_ascii_uppercase(), mappings.len());
                mappings.push(mapping);
            }
        }
    }
    debug!(count = mappings.len(), "chemistry mappings parsed");
    mappings
}

/// Bring each product's chemistry in line with its mapping.
#[instrument(skip_all, fields(source = catalog.source_name(), count = mappings.len(), dry_run = dry_run))]
pub async fn apply_chemistry_mappings<C: Catalog>(
    catalog: &C,
    mappings: &[ChemistryMapping],
    dry_run: bool,
    progress: &dyn BatchProgress,
) -> Result<UpdateSummary> {
    progress.phase("Fetching product listing");
    let finder = ProductFinder::load(catalog).await;

    progress.phase(if dry_run { "Checking" } else { "Updating" });
    let mut summary = UpdateSummary {
        dry_run,
        results: Vec::with_capacity(mappings.len()),
    };

    for (i, mapping) in mappings.iter().enumerate() {
        progress.item(&mapping.product_id, i + 1, mappings.len());
        let Some(product) = finder.find(&mapping.product_id).await else {
            summary.results.push(UpdateResult {
                product_id: mapping.product_id.clone(),
                old_value: "N/A".into(),
                new_value: mapping.chemistry.clone(),
                status: UpdateStatus::NotFound,
                error: None,
            });
            continue;
        };

        let current = product.chemistry_or_na().to_string();
        let mut result = UpdateResult {
            product_id: mapping.product_id.clone(),
            old_value: current.clone(),
            new_value: mapping.chemistry.clone(),
            status: UpdateStatus::Updated,
            error: None,
        };

        if current == mapping.chemistry {
            result.status = UpdateStatus::NoChange;
        } else if !dry_run {
            let written = catalog
                .set_chemistry(update_key(&product), &mapping.chemistry)
                .await;
            record_write(&mut result, written);
        }
        debug!(product_id = %result.product_id, status = ?result.status, "chemistry processed");
        summary.results.push(result);
    }

    log_summary(&summary);
    progress.finish("chemistry import finished");
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Published status
// ---------------------------------------------------------------------------

/// Publish and unpublish the given identifiers.
///
/// An identifier present in both lists is only published.
#[instrument(skip_all, fields(source = catalog.source_name(), dry_run = dry_run))]
pub async fn apply_published<C: Catalog>(
    catalog: &C,
    publish: &[String],
    unpublish: &[String],
    dry_run: bool,
    progress: &dyn BatchProgress,
) -> Result<UpdateSummary> {
    progress.phase("Fetching product listing");
    let finder = ProductFinder::load(catalog).await;

    let changes: Vec<(&str, bool)> = publish
        .iter()
        .map(|id| (id.as_str(), true))
        .chain(
            unpublish
                .iter()
                .filter(|id| !publish.contains(id))
                .map(|id| (id.as_str(), false)),
        )
        .collect();

    progress.phase(if dry_run { "Checking" } else { "Updating" });
    let mut summary = UpdateSummary {
        dry_run,
        results: Vec::with_capacity(changes.len()),
    };

    for (i, &(product_id, published)) in changes.iter().enumerate() {
        progress.item(product_id, i + 1, changes.len());
        let mut result = UpdateResult {
            product_id: product_id.to_string(),
            old_value: "N/A".into(),
            new_value: status_label(published).into(),
            status: UpdateStatus::Updated,
            error: None,
        };

        match finder.find(product_id).await {
            None => result.status = UpdateStatus::NotFound,
            Some(product) => {
                result.old_value = status_label(product.published).into();
                if product.published == published {
                    result.status = UpdateStatus::NoChange;
                } else if !dry_run {
                    let written = catalog
                        .set_published(update_key(&product), published)
                        .await;
                    record_write(&mut result, written);
                }
            }
        }
        debug!(product_id, status = ?result.status, "published status processed");
        summary.results.push(result);
    }

    log_summary(&summary);
    progress.finish("published status update finished");
    Ok(summary)
}

fn status_label(published: bool) -> &'static str {
    if published { "published" } else { "unpublished" }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Product lookup over a listing fetched once, with a point lookup fallback.
struct ProductFinder<'a, C> {
    catalog: &'a C,
    by_id: HashMap<String, Product>,
}

impl<'a, C: Catalog> ProductFinder<'a, C> {
    /// A failed listing is not fatal: every item then falls back to a point
    /// lookup.
    async fn load(catalog: &'a C) -> Self {
        let by_id = match catalog.list().await {
            Ok(products) => {
                info!(count = products.len(), "product listing loaded");
                products
                    .into_iter()
                    .map(|p| (p.product_id.to_ascii_uppercase(), p))
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "could not fetch product listing; using point lookups");
                HashMap::new()
            }
        };
        Self { catalog, by_id }
    }

    async fn find(&self, product_id: &str) -> Option<Product> {
        if let Some(product) = self.by_id.get(&product_id.to_ascii_uppercase()) {
            return Some(product.clone());
        }
        match self.catalog.lookup(product_id).await {
            Ok(found) => found,
            Err(e) => {
                debug!(product_id, error = %e, "point lookup failed");
                None
            }
        }
    }
}

/// Identifier used for writes: the business key, else the internal id.
fn update_key(product: &Product) -> &str {
    if product.product_id.is_empty() {
        &product.id
    } else {
        &product.product_id
    }
}

fn record_write(result: &mut UpdateResult, written: Result<bool>) {
    match written {
        Ok(true) => {}
        Ok(false) => {
            result.status = UpdateStatus::Error;
            result.error = Some("no record was updated".into());
        }
        Err(e) => {
            warn!(product_id = %result.product_id, error = %e, "update failed");
            result.status = UpdateStatus::Error;
            result.error = Some(e.to_string());
        }
    }
}

fn log_summary(summary: &UpdateSummary) {
    info!(
        updated = summary.count(UpdateStatus::Updated),
        no_change = summary.count(UpdateStatus::NoChange),
        not_found = summary.count(UpdateStatus::NotFound),
        errors = summary.count(UpdateStatus::Error),
        dry_run = summary.dry_run,
        "batch complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RemoteCatalog;
    use crate::progress::SilentProgress;
    use prodcat_csv::TableOptions;
    use prodcat_remote::ApiClient;
    use prodcat_storage::Storage;
    use std::time::Duration;
    use url::Url;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MAPPING_SHEET: &str = "\
Chemistries Products,,
Use this tab,,
,,
Industry,Product ID,Chemistry
Marine,M-S750,ms_polymer
Construction,c150,solvent_based
Construction,N/A,epoxy
Transportation,T205,
Industry,OA99,hot_melt
Construction,C150,water_based
";

    fn mappings() -> Vec<ChemistryMapping> {
        let opts = TableOptions {
            header_row: 3,
            min_fields: 2,
        };
        chemistry_mappings(&CsvTable::parse(MAPPING_SHEET, &opts))
    }

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("prodcat_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[test]
    fn mapping_rows_are_filtered_and_deduplicated() {
        let mappings = mappings();
        let ids: Vec<&str> = mappings.iter().map(|m| m.product_id.as_str()).collect();
        assert_eq!(ids, vec!["M-S750", "C150", "OA99"]);
        assert_eq!(mappings[1].chemistry, "water_based");
        assert_eq!(mappings[0].industry, "Marine");
    }

    #[tokio::test]
    async fn chemistry_import_against_store() {
        let storage = test_storage().await;
        let mut ms = Product::new("M-S750", "Marine Sealant");
        ms.chemistry = Some("ms_polymer".into());
        storage.upsert_product(&ms).await.unwrap();
        storage
            .upsert_product(&Product::new("C150", "C150"))
            .await
            .unwrap();

        let mappings = mappings();
        let dry = apply_chemistry_mappings(&storage, &mappings, true, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(dry.count(UpdateStatus::NoChange), 1);
        assert_eq!(dry.count(UpdateStatus::Updated), 1);
        assert_eq!(dry.not_found().collect::<Vec<_>>(), vec!["OA99"]);
        let c150 = storage.get_product("C150").await.unwrap().unwrap();
        assert!(c150.chemistry.is_none());

        let live = apply_chemistry_mappings(&storage, &mappings, false, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(live.count(UpdateStatus::Updated), 1);
        assert_eq!(live.results[1].old_value, "N/A");
        let c150 = storage.get_product("C150").await.unwrap().unwrap();
        assert_eq!(c150.chemistry.as_deref(), Some("water_based"));

        let again = apply_chemistry_mappings(&storage, &mappings, false, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(again.count(UpdateStatus::Updated), 0);
        assert_eq!(again.count(UpdateStatus::NoChange), 2);
    }

    #[tokio::test]
    async fn published_changes_against_store() {
        let storage = test_storage().await;
        for id in ["T205", "R160", "R190"] {
            storage.upsert_product(&Product::new(id, id)).await.unwrap();
        }
        storage.set_published("T205", false).await.unwrap();

        let publish = vec!["T205".to_string()];
        let unpublish = vec!["R160".to_string(), "T205".to_string(), "GONE".to_string()];
        let summary = apply_published(&storage, &publish, &unpublish, false, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.count(UpdateStatus::Updated), 2);
        assert_eq!(summary.not_found().collect::<Vec<_>>(), vec!["GONE"]);
        assert!(storage.get_product("T205").await.unwrap().unwrap().published);
        assert!(!storage.get_product("R160").await.unwrap().unwrap().published);
        assert!(storage.get_product("R190").await.unwrap().unwrap().published);
    }

    #[tokio::test]
    async fn api_errors_are_recorded_per_item() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/products/R160"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"product_id": "R160"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/products/R190"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"product_id": "R190"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/products/R160"))
            .and(body_json(serde_json::json!({"published": false})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/products/R190"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"success": false, "message": "record locked"}),
            ))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
        let catalog = RemoteCatalog::new(ApiClient::new(base, Duration::from_secs(5)).unwrap());
        let unpublish = vec!["R160".to_string(), "R190".to_string()];
        let summary = apply_published(&catalog, &[], &unpublish, false, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.results[0].status, UpdateStatus::Updated);
        assert_eq!(summary.results[1].status, UpdateStatus::Error);
        let errors: Vec<_> = summary.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("record locked"));
    }
}

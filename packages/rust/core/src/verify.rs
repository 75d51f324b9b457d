//! Per-identifier verification against a [`Catalog`].

use std::future::Future;
use std::time::Duration;

use prodcat_shared::{Product, Result};
use tracing::{debug, info, instrument, warn};

use crate::catalog::Catalog;
use crate::progress::BatchProgress;

/// Default bound on each lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// What the catalog knows about one requested identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// The identifier exists exactly.
    Exact(Product),
    /// No exact record; these records contain the identifier as a substring.
    Partial(Vec<Product>),
    NotFound,
    /// The lookup errored or timed out; the batch carries on.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyItem {
    pub requested: String,
    pub outcome: VerifyOutcome,
}

/// Counts by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub exact: usize,
    pub partial: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl VerifySummary {
    pub fn from_items(items: &[VerifyItem]) -> Self {
        let mut summary = Self::default();
        for item in items {
            match item.outcome {
                VerifyOutcome::Exact(_) => summary.exact += 1,
                VerifyOutcome::Partial(_) => summary.partial += 1,
                VerifyOutcome::NotFound => summary.not_found += 1,
                VerifyOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Check each identifier independently, in order.
///
/// An exact lookup runs first; when it finds nothing a substring search
/// follows. Each call is bounded by `timeout`, and an error or timeout only
/// marks that item as [`VerifyOutcome::Failed`].
#[instrument(skip_all, fields(source = catalog.source_name(), count = ids.len()))]
pub async fn verify<C: Catalog>(
    catalog: &C,
    ids: &[String],
    timeout: Duration,
    progress: &dyn BatchProgress,
) -> Vec<VerifyItem> {
    let mut items = Vec::with_capacity(ids.len());
    for (index, id) in ids.iter().enumerate() {
        progress.item(id, index + 1, ids.len());
        let outcome = verify_one(catalog, id, timeout).await;
        debug!(product_id = %id, ?outcome, "verified");
        items.push(VerifyItem {
            requested: id.clone(),
            outcome,
        });
    }

    let summary = VerifySummary::from_items(&items);
    info!(
        exact = summary.exact,
        partial = summary.partial,
        not_found = summary.not_found,
        failed = summary.failed,
        "verification complete"
    );
    progress.finish(&format!("{} identifiers checked", items.len()));
    items
}

async fn verify_one<C: Catalog>(catalog: &C, id: &str, timeout: Duration) -> VerifyOutcome {
    match bounded(timeout, catalog.lookup(id)).await {
        Ok(Some(product)) => return VerifyOutcome::Exact(product),
        Ok(None) => {}
        Err(reason) => {
            warn!(product_id = %id, %reason, "lookup failed");
            return VerifyOutcome::Failed(reason);
        }
    }

    match bounded(timeout, catalog.search(id)).await {
        Ok(matches) if matches.is_empty() => VerifyOutcome::NotFound,
        Ok(matches) => VerifyOutcome::Partial(matches),
        Err(reason) => {
            warn!(product_id = %id, %reason, "search failed");
            VerifyOutcome::Failed(reason)
        }
    }
}

/// Run `fut` under `timeout`, flattening both failure kinds into a message.
async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> std::result::Result<T, String> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}s", timeout.as_secs_f32())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RemoteCatalog;
    use crate::progress::SilentProgress;
    use prodcat_remote::ApiClient;
    use prodcat_storage::Storage;
    use url::Url;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("prodcat_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn exact_and_not_found() {
        let storage = test_storage().await;
        storage
            .upsert_product(&Product::new("C150", "C150"))
            .await
            .unwrap();

        let items = verify(
            &storage,
            &ids(&["C150", "ZZZZZ"]),
            DEFAULT_LOOKUP_TIMEOUT,
            &SilentProgress,
        )
        .await;

        assert!(matches!(&items[0].outcome, VerifyOutcome::Exact(p) if p.product_id == "C150"));
        assert_eq!(items[1].outcome, VerifyOutcome::NotFound);
        assert_eq!(
            VerifySummary::from_items(&items),
            VerifySummary {
                exact: 1,
                partial: 0,
                not_found: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn partial_reports_every_match() {
        let storage = test_storage().await;
        for id in ["T-R682-1", "T-R682-2", "T205"] {
            storage.upsert_product(&Product::new(id, id)).await.unwrap();
        }

        let items = verify(&storage, &ids(&["t-r682"]), DEFAULT_LOOKUP_TIMEOUT, &SilentProgress).await;
        match &items[0].outcome {
            VerifyOutcome::Partial(found) => assert_eq!(found.len(), 2),
            other => panic!("expected partial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_is_recorded_and_loop_continues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/BROKEN"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/products/SLOW"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/products/C150"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"product_id": "C150", "name": "C150"})),
            )
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
        let catalog = RemoteCatalog::new(ApiClient::new(base, Duration::from_secs(10)).unwrap());

        let items = verify(
            &catalog,
            &ids(&["BROKEN", "SLOW", "C150"]),
            Duration::from_millis(200),
            &SilentProgress,
        )
        .await;

        assert!(matches!(&items[0].outcome, VerifyOutcome::Failed(msg) if msg.contains("500")));
        assert!(matches!(&items[1].outcome, VerifyOutcome::Failed(msg) if msg.contains("timed out")));
        assert!(matches!(&items[2].outcome, VerifyOutcome::Exact(_)));
    }
}

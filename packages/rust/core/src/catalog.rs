//! The product source seen by reports and updaters.
//!
//! Both the store and the remote API can answer lookups and accept field
//! updates; [`Catalog`] lets the verification and update loops run against
//! either one.

use prodcat_remote::{ApiClient, ProductPatch};
use prodcat_shared::{ProdcatError, Product, Result};
use prodcat_storage::Storage;
use tokio::sync::OnceCell;

/// An authoritative set of product records.
#[allow(async_fn_in_trait)]
pub trait Catalog {
    /// Short label for log lines (`store`, `api`).
    fn source_name(&self) -> &'static str;

    /// Exact lookup by identifier.
    async fn lookup(&self, product_id: &str) -> Result<Option<Product>>;

    /// Case-insensitive substring match on identifier, name or full name.
    async fn search(&self, term: &str) -> Result<Vec<Product>>;

    /// Every product.
    async fn list(&self) -> Result<Vec<Product>>;

    /// Write a chemistry value. `Ok(false)` when no record was touched.
    async fn set_chemistry(&self, product_id: &str, chemistry: &str) -> Result<bool>;

    /// Write the published flag. `Ok(false)` when no record was touched.
    async fn set_published(&self, product_id: &str, published: bool) -> Result<bool>;
}

impl Catalog for Storage {
    fn source_name(&self) -> &'static str {
        "store"
    }

    async fn lookup(&self, product_id: &str) -> Result<Option<Product>> {
        self.get_product(product_id).await
    }

    async fn search(&self, term: &str) -> Result<Vec<Product>> {
        self.search_products(term).await
    }

    async fn list(&self) -> Result<Vec<Product>> {
        self.list_products().await
    }

    async fn set_chemistry(&self, product_id: &str, chemistry: &str) -> Result<bool> {
        Ok(Storage::set_chemistry(self, product_id, chemistry).await? > 0)
    }

    async fn set_published(&self, product_id: &str, published: bool) -> Result<bool> {
        Ok(Storage::set_published(self, product_id, published).await? > 0)
    }
}

/// The REST API as a [`Catalog`].
///
/// The API has no search endpoint, so searches scan the full listing, which
/// is fetched once and reused for the lifetime of this value.
pub struct RemoteCatalog {
    client: ApiClient,
    listing: OnceCell<Vec<Product>>,
}

impl RemoteCatalog {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            listing: OnceCell::new(),
        }
    }

    async fn cached_listing(&self) -> Result<&[Product]> {
        let listing = self
            .listing
            .get_or_try_init(|| self.client.list_products())
            .await?;
        Ok(listing)
    }
}

impl Catalog for RemoteCatalog {
    fn source_name(&self) -> &'static str {
        "api"
    }

    async fn lookup(&self, product_id: &str) -> Result<Option<Product>> {
        self.client.get_product(product_id).await
    }

    async fn search(&self, term: &str) -> Result<Vec<Product>> {
        let listing = self.cached_listing().await?;
        Ok(listing
            .iter()
            .filter(|p| matches_term(p, term))
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.cached_listing().await?.to_vec())
    }

    async fn set_chemistry(&self, product_id: &str, chemistry: &str) -> Result<bool> {
        touched(
            self.client
                .update_product(product_id, &ProductPatch::chemistry(chemistry))
                .await,
        )
    }

    async fn set_published(&self, product_id: &str, published: bool) -> Result<bool> {
        touched(
            self.client
                .update_product(product_id, &ProductPatch::published(published))
                .await,
        )
    }
}

fn touched(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(ProdcatError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Same rule as the store's search: ASCII case-insensitive substring on
/// identifier, name or full name.
pub fn matches_term(product: &Product, term: &str) -> bool {
    let needle = term.to_ascii_uppercase();
    [&product.product_id, &product.name, &product.full_name]
        .iter()
        .any(|field| field.to_ascii_uppercase().contains(&needle))
}

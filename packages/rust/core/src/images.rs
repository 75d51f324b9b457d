//! Product image references: blob-URL prefixing and filename checks.

use prodcat_shared::{Product, Result};
use prodcat_storage::Storage;
use tracing::{info, instrument};

/// Join a blob base URL and a relative image path with exactly one `/`.
pub fn blob_url(base: &str, filename: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        filename.trim_start_matches('/')
    )
}

/// True for `http://` and `https://` references.
pub fn is_absolute(image: &str) -> bool {
    image.starts_with("http://") || image.starts_with("https://")
}

/// Last path segment of an image reference, without query or fragment.
pub fn filename_of(image: &str) -> &str {
    let path = image.split(['?', '#']).next().unwrap_or(image);
    path.rsplit('/').next().unwrap_or(path)
}

/// The filename a product's image is expected to have.
pub fn expected_filename(product_id: &str) -> String {
    format!("{product_id}.png")
}

// ---------------------------------------------------------------------------
// URL prefixing
// ---------------------------------------------------------------------------

/// Prefix every bare image filename in the store with `base_url`.
///
/// Returns the number of rows changed, or in a dry run the number that would
/// change. Absolute references and the placeholder are never touched.
#[instrument(skip(storage), fields(dry_run = dry_run))]
pub async fn fix_relative_urls(
    storage: &Storage,
    base_url: &str,
    placeholder: &str,
    dry_run: bool,
) -> Result<u64> {
    let affected = if dry_run {
        storage.count_relative_images(placeholder).await?
    } else {
        storage.prefix_relative_images(base_url, placeholder).await?
    };
    info!(affected, "relative image references processed");
    Ok(affected)
}

// ---------------------------------------------------------------------------
// Filename check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// The filename equals `<product_id>.png`.
    Matches,
    /// The filename differs from the expected one.
    Mismatch,
    /// The product points at the shared placeholder image.
    Placeholder,
    /// No image reference at all.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCheck {
    pub product_id: String,
    pub current: Option<String>,
    pub expected: String,
    pub state: ImageState,
}

impl ImageCheck {
    /// The reference the product should carry: the current one with its
    /// last segment replaced. `None` when there is nothing to rewrite.
    pub fn suggested(&self) -> Option<String> {
        let current = self.current.as_deref()?;
        if self.state != ImageState::Mismatch {
            return None;
        }
        let path = current.split(['?', '#']).next().unwrap_or(current);
        let dir = &path[..path.len() - filename_of(path).len()];
        Some(format!("{dir}{}", self.expected))
    }
}

/// Compare one product's image filename with the expected one.
pub fn check_image(product: &Product, placeholder: &str) -> ImageCheck {
    let expected = expected_filename(&product.product_id);
    let current = product.image.clone().filter(|i| !i.is_empty());
    let state = match current.as_deref() {
        None => ImageState::Missing,
        Some(image) if filename_of(image) == placeholder => ImageState::Placeholder,
        Some(image) if filename_of(image) == expected => ImageState::Matches,
        Some(_) => ImageState::Mismatch,
    };
    ImageCheck {
        product_id: product.product_id.clone(),
        current,
        expected,
        state,
    }
}

/// Check every product, keeping input order.
pub fn check_images(products: &[Product], placeholder: &str) -> Vec<ImageCheck> {
    products
        .iter()
        .map(|p| check_image(p, placeholder))
        .collect()
}

//! HTTP client for the catalog REST API.
//!
//! The API exposes the same product records as the store:
//! - `GET {base}/products` returns a JSON array of products
//! - `GET {base}/products/{id}` returns one product, 404 when unknown
//! - `PUT {base}/products/{id}` accepts a partial JSON patch and answers
//!   `{ "success": bool, "message": string }`
//!
//! Requests are issued one at a time with a client-wide timeout; nothing is
//! retried.

use std::time::Duration;

use prodcat_shared::{ProdcatError, Product, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Default timeout in seconds for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("prodcat/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Partial update body for `PUT /products/{id}`. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chemistry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl ProductPatch {
    pub fn chemistry(value: impl Into<String>) -> Self {
        Self {
            chemistry: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn published(value: bool) -> Self {
        Self {
            published: Some(value),
            ..Self::default()
        }
    }
}

/// Acknowledgement returned by update calls.
#[derive(Debug, Clone, Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Client bound to one API base URL (e.g. `https://host/api`).
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    /// Build a client for `base_url` with the given per-request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProdcatError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base: base_url,
        })
    }

    /// Fetch the full product listing.
    #[instrument(skip(self), fields(base = %self.base))]
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let url = self.endpoint(&[])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProdcatError::parse(format!("{url}: invalid JSON: {e}")))?;

        if !body.is_array() {
            return Err(ProdcatError::parse(format!(
                "{url}: expected a JSON array of products"
            )));
        }
        let products: Vec<Product> = serde_json::from_value(body)
            .map_err(|e| ProdcatError::parse(format!("{url}: invalid product list: {e}")))?;
        debug!(count = products.len(), "fetched product listing");
        Ok(products)
    }

    /// Fetch one product. `Ok(None)` when the API answers 404.
    pub async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let url = self.endpoint(&[product_id])?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProdcatError::Network(format!("{url}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(product_id, "product not found");
            return Ok(None);
        }
        let response = check_status(response, &url).await?;
        let product = response
            .json::<Product>()
            .await
            .map_err(|e| ProdcatError::parse(format!("{url}: invalid product: {e}")))?;

        if product.product_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(product))
    }

    /// Apply a partial update. Fails unless the API acknowledges success;
    /// a 404 is [`ProdcatError::NotFound`].
    pub async fn update_product(&self, product_id: &str, patch: &ProductPatch) -> Result<()> {
        let url = self.endpoint(&[product_id])?;
        let response = self
            .client
            .put(url.clone())
            .json(patch)
            .send()
            .await
            .map_err(|e| ProdcatError::Network(format!("{url}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProdcatError::NotFound(product_id.to_string()));
        }
        let response = check_status(response, &url).await?;
        let ack: UpdateResponse = response
            .json()
            .await
            .map_err(|e| ProdcatError::parse(format!("{url}: invalid update response: {e}")))?;

        if !ack.success {
            return Err(ProdcatError::Network(
                ack.message.unwrap_or_else(|| "Update failed".into()),
            ));
        }
        debug!(product_id, "product updated");
        Ok(())
    }

    /// `{base}/products[/segment...]`, with segments percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                ProdcatError::config(format!("API base URL cannot be a base: {}", self.base))
            })?;
            path.pop_if_empty().push("products");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ProdcatError::Network(format!("{url}: {e}")))?;
        check_status(response, url).await
    }
}

/// Map non-2xx responses to a network error, preferring the API's `message`.
async fn check_status(response: reqwest::Response, url: &Url) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<UpdateResponse>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    Err(ProdcatError::Network(format!("{url}: {message}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_joins_segments() {
        let base = Url::parse("https://catalog.example.com/api/").unwrap();
        let client = ApiClient::new(base, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(&[]).unwrap().as_str(),
            "https://catalog.example.com/api/products"
        );
        assert_eq!(
            client.endpoint(&["C-T5530"]).unwrap().as_str(),
            "https://catalog.example.com/api/products/C-T5530"
        );
        assert_eq!(
            client.endpoint(&["A/B"]).unwrap().as_str(),
            "https://catalog.example.com/api/products/A%2FB"
        );
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let json = serde_json::to_value(ProductPatch::published(false)).unwrap();
        assert_eq!(json, serde_json::json!({"published": false}));
        let json = serde_json::to_value(ProductPatch::chemistry("rubber_based")).unwrap();
        assert_eq!(json, serde_json::json!({"chemistry": "rubber_based"}));
    }

    #[tokio::test]
    async fn list_products_parses_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"product_id": "C150", "name": "C150", "chemistry": "solvent_based"},
                {"product_id": "T205", "name": "T205", "published": false}
            ])))
            .mount(&server)
            .await;

        let products = client_for(&server).await.list_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].chemistry.as_deref(), Some("solvent_based"));
        assert!(!products[1].published);
    }

    #[tokio::test]
    async fn list_products_rejects_non_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"products": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).await.list_products().await.unwrap_err();
        assert!(matches!(err, ProdcatError::Parse { .. }));
    }

    #[tokio::test]
    async fn get_product_found_and_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/C150"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"product_id": "C150", "name": "C150"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/products/ZZZZZ"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let found = client.get_product("C150").await.unwrap();
        assert_eq!(found.unwrap().product_id, "C150");
        assert!(client.get_product("ZZZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_product_server_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/C150"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_product("C150").await.unwrap_err();
        assert!(matches!(err, ProdcatError::Network(_)));
    }

    #[tokio::test]
    async fn update_product_checks_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/products/T205"))
            .and(body_json(serde_json::json!({"published": false})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "message": "ok"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/products/C150"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": false, "message": "locked"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .update_product("T205", &ProductPatch::published(false))
            .await
            .unwrap();

        let err = client
            .update_product("C150", &ProductPatch::published(false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("locked"));
    }

    #[tokio::test]
    async fn update_of_unknown_product_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/products/GONE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .update_product("GONE", &ProductPatch::published(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ProdcatError::NotFound(ref id) if id == "GONE"));
    }

    #[tokio::test]
    async fn error_status_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/products/C150"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"success": false, "message": "bad chemistry"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .update_product("C150", &ProductPatch::chemistry(""))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad chemistry"));
    }
}

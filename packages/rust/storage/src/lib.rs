//! libSQL storage layer for the product catalog.
//!
//! The [`Storage`] struct wraps a libSQL database holding the `products`
//! table. It is opened once per command and passed by reference to every
//! operation; dropping it closes the connection.
//!
//! **Access rules:**
//! - Maintenance commands: read-write via [`Storage::connect`] / [`Storage::open`]
//! - Reports and dry runs: read-only via [`Storage::connect_readonly`]
//!
//! Bulk updates are single set-based statements. Rule values are always bound
//! as parameters and matched literally (`instr`, `=`), never spliced into SQL.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::params::Params;
use libsql::{Connection, Database, Value, params};
use prodcat_shared::{
    ChemistryCount, DatabaseSettings, ProdcatError, Product, ReclassificationRule, Result,
    RuleTable, TechnicalProperty, new_record_id,
};

/// Column list shared by every product query, in [`row_to_product`] order.
const PRODUCT_COLUMNS: &str = "id, product_id, name, full_name, description, brand, industry, \
     chemistry, url, image, benefits, applications, technical, sizing, color, cleanup, \
     recommended_equipment, published, last_edited";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Connect using a resolved connection string, in read-write mode.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let storage = Self::build(settings, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Connect using a resolved connection string, in read-only mode.
    pub async fn connect_readonly(settings: &DatabaseSettings) -> Result<Self> {
        Self::build(settings, true).await
    }

    /// Open or create a local database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        let storage = Self::open_local(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    async fn build(settings: &DatabaseSettings, readonly: bool) -> Result<Self> {
        if is_remote_url(&settings.url) {
            tracing::debug!(url = %settings.url, "connecting to remote database");
            let db = libsql::Builder::new_remote(
                settings.url.clone(),
                settings.auth_token.clone().unwrap_or_default(),
            )
            .build()
            .await
            .map_err(ProdcatError::storage)?;
            let conn = db.connect().map_err(ProdcatError::storage)?;
            Ok(Self { db, conn, readonly })
        } else {
            let path = settings.url.strip_prefix("file:").unwrap_or(&settings.url);
            Self::open_local(Path::new(path), readonly).await
        }
    }

    async fn open_local(path: &Path, readonly: bool) -> Result<Self> {
        if !readonly {
            // Ensure parent directory exists
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| ProdcatError::io(parent, e))?;
            }
        } else if !path.exists() {
            return Err(ProdcatError::Storage(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(ProdcatError::storage)?;
        let conn = db.connect().map_err(ProdcatError::storage)?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ProdcatError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ProdcatError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Point operations
    // -----------------------------------------------------------------------

    /// Insert a product, or update it in place when `product_id` exists.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let id = if product.id.is_empty() {
            new_record_id()
        } else {
            product.id.clone()
        };

        self.conn
            .execute(
                "INSERT INTO products (id, product_id, name, full_name, description, brand, industry,
                    chemistry, url, image, benefits, applications, technical, sizing, color, cleanup,
                    recommended_equipment, published, last_edited, benefits_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?21)
                 ON CONFLICT(product_id) DO UPDATE SET
                   name = excluded.name,
                   full_name = excluded.full_name,
                   description = excluded.description,
                   brand = excluded.brand,
                   industry = excluded.industry,
                   chemistry = excluded.chemistry,
                   url = excluded.url,
                   image = excluded.image,
                   benefits = excluded.benefits,
                   applications = excluded.applications,
                   technical = excluded.technical,
                   sizing = excluded.sizing,
                   color = excluded.color,
                   cleanup = excluded.cleanup,
                   recommended_equipment = excluded.recommended_equipment,
                   published = excluded.published,
                   last_edited = excluded.last_edited,
                   benefits_count = excluded.benefits_count,
                   updated_at = excluded.updated_at",
                params![
                    id.as_str(),
                    product.product_id.as_str(),
                    product.name.as_str(),
                    product.full_name.as_str(),
                    product.description.as_str(),
                    product.brand.as_str(),
                    product.industry.as_str(),
                    product.chemistry.as_deref(),
                    product.url.as_deref(),
                    product.image.as_deref(),
                    to_json(&product.benefits)?,
                    to_json(&product.applications)?,
                    to_json(&product.technical)?,
                    to_json(&product.sizing)?,
                    product.color.as_deref(),
                    product.cleanup.as_deref(),
                    product.recommended_equipment.as_deref(),
                    i64::from(product.published),
                    product.last_edited.map(|t| t.to_rfc3339()),
                    product.benefits.len() as i64,
                    now.as_str(),
                ],
            )
            .await
            .map_err(ProdcatError::storage)?;
        Ok(())
    }

    /// Point lookup by business identifier (or internal id).
    pub async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1 OR id = ?1 LIMIT 1"
                ),
                params![product_id],
            )
            .await
            .map_err(ProdcatError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_product(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ProdcatError::storage(e)),
        }
    }

    /// Full-table scan, ordered by identifier.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.query_products(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY product_id"),
            Params::None,
        )
        .await
    }

    /// Products whose identifier, name or full name contains `term`,
    /// ignoring ASCII case.
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        self.query_products(
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE instr(upper(product_id), upper(?1)) > 0
                    OR instr(upper(name), upper(?1)) > 0
                    OR instr(upper(full_name), upper(?1)) > 0
                 ORDER BY product_id"
            ),
            Params::Positional(vec![Value::Text(term.to_string())]),
        )
        .await
    }

    /// Number of products in the store.
    pub async fn product_count(&self) -> Result<u64> {
        self.query_count("SELECT COUNT(*) FROM products", Params::None)
            .await
    }

    /// Set one product's chemistry. Returns the affected-row count (0 or 1).
    pub async fn set_chemistry(&self, product_id: &str, chemistry: &str) -> Result<u64> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE products SET chemistry = ?1, updated_at = ?2, last_edited = ?2
                 WHERE product_id = ?3",
                params![chemistry, now.as_str(), product_id],
            )
            .await
            .map_err(ProdcatError::storage)
    }

    /// Set one product's published flag. Returns the affected-row count.
    pub async fn set_published(&self, product_id: &str, published: bool) -> Result<u64> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE products SET published = ?1, updated_at = ?2, last_edited = ?2
                 WHERE product_id = ?3",
                params![i64::from(published), now.as_str(), product_id],
            )
            .await
            .map_err(ProdcatError::storage)
    }

    // -----------------------------------------------------------------------
    // Set-based updates
    // -----------------------------------------------------------------------

    /// Count the records rule `index` of `table` would change.
    pub async fn count_reclassification(&self, table: &RuleTable, index: usize) -> Result<u64> {
        let (predicate, params) = reclassification_predicate(table, index)?;
        self.query_count(
            &format!("SELECT COUNT(*) FROM products WHERE {predicate}"),
            Params::Positional(params),
        )
        .await
    }

    /// Apply rule `index` of `table` as one UPDATE. Returns the affected-row
    /// count, which is 0 on any repeat run.
    ///
    /// Records already carrying the target, and records claimed by an earlier
    /// rule in the table, are excluded.
    pub async fn apply_reclassification(&self, table: &RuleTable, index: usize) -> Result<u64> {
        self.check_writable()?;
        let (predicate, where_params) = reclassification_predicate(table, index)?;
        let target = &table.reclassification[index].target;

        let now = Utc::now().to_rfc3339();
        let mut params = vec![
            Value::Text(target.clone()),
            Value::Text(now.clone()),
            Value::Text(now),
        ];
        params.extend(where_params);

        let affected = self
            .conn
            .execute(
                &format!(
                    "UPDATE products SET chemistry = ?, updated_at = ?, last_edited = ?
                     WHERE {predicate}"
                ),
                Params::Positional(params),
            )
            .await
            .map_err(ProdcatError::storage)?;

        tracing::info!(family = %target, affected, "reclassification applied");
        Ok(affected)
    }

    /// Count products whose image is a bare filename.
    pub async fn count_relative_images(&self, placeholder: &str) -> Result<u64> {
        self.query_count(
            &format!("SELECT COUNT(*) FROM products WHERE {RELATIVE_IMAGE_PREDICATE}"),
            Params::Positional(vec![Value::Text(placeholder.to_string())]),
        )
        .await
    }

    /// Products whose image is a bare filename.
    pub async fn list_relative_images(&self, placeholder: &str) -> Result<Vec<Product>> {
        self.query_products(
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE {RELATIVE_IMAGE_PREDICATE}
                 ORDER BY product_id"
            ),
            Params::Positional(vec![Value::Text(placeholder.to_string())]),
        )
        .await
    }

    /// Prefix every bare image filename with `base_url`, in one UPDATE.
    ///
    /// Absolute `http(s)://` references and the placeholder are left alone,
    /// so a repeat run affects 0 rows.
    pub async fn prefix_relative_images(&self, base_url: &str, placeholder: &str) -> Result<u64> {
        self.check_writable()?;
        let prefix = format!("{}/", base_url.trim_end_matches('/'));
        self.conn
            .execute(
                &format!(
                    "UPDATE products SET image = ? || ltrim(image, '/'), updated_at = ?
                     WHERE {RELATIVE_IMAGE_PREDICATE}"
                ),
                Params::Positional(vec![
                    Value::Text(prefix),
                    Value::Text(Utc::now().to_rfc3339()),
                    Value::Text(placeholder.to_string()),
                ]),
            )
            .await
            .map_err(ProdcatError::storage)
    }

    /// Product counts for the given chemistry labels, ordered by label.
    pub async fn chemistry_counts(&self, labels: &[String]) -> Result<Vec<ChemistryCount>> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; labels.len()].join(", ");
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT chemistry, COUNT(*) FROM products
                     WHERE chemistry IN ({placeholders})
                     GROUP BY chemistry ORDER BY chemistry"
                ),
                Params::Positional(labels.iter().cloned().map(Value::Text).collect()),
            )
            .await
            .map_err(ProdcatError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(ProdcatError::storage)? {
            results.push(ChemistryCount {
                chemistry: row.get::<String>(0).map_err(ProdcatError::storage)?,
                count: row.get::<i64>(1).map_err(ProdcatError::storage)? as u64,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Query helpers
    // -----------------------------------------------------------------------

    async fn query_products(&self, sql: &str, params: Params) -> Result<Vec<Product>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(ProdcatError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(ProdcatError::storage)? {
            results.push(row_to_product(&row)?);
        }
        Ok(results)
    }

    async fn query_count(&self, sql: &str, params: Params) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(ProdcatError::storage)?;
        match rows.next().await.map_err(ProdcatError::storage)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(ProdcatError::storage)? as u64),
            None => Ok(0),
        }
    }
}

/// Bare image filenames: set, not the placeholder (`?`), not absolute.
const RELATIVE_IMAGE_PREDICATE: &str = "image IS NOT NULL AND image <> '' AND image <> ? \
     AND image NOT LIKE 'http://%' AND image NOT LIKE 'https://%'";

fn is_remote_url(url: &str) -> bool {
    ["libsql://", "https://", "http://", "wss://", "ws://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

// ---------------------------------------------------------------------------
// Reclassification SQL
// ---------------------------------------------------------------------------

/// Build the WHERE clause for rule `index`: its condition holds, the record
/// does not already carry its target, and no earlier rule claims the record.
fn reclassification_predicate(table: &RuleTable, index: usize) -> Result<(String, Vec<Value>)> {
    let rule = table.reclassification.get(index).ok_or_else(|| {
        ProdcatError::validation(format!("no reclassification rule at index {index}"))
    })?;

    let mut params = Vec::new();
    let mut sql = condition_sql(rule, &mut params);

    params.push(Value::Text(rule.target.clone()));
    sql.push_str(" AND IFNULL(chemistry, '') <> ?");

    for earlier in &table.reclassification[..index] {
        params.push(Value::Text(earlier.target.clone()));
        let condition = condition_sql(earlier, &mut params);
        sql.push_str(&format!(" AND NOT (IFNULL(chemistry, '') = ? OR {condition})"));
    }

    Ok((sql, params))
}

/// `(label = ? OR ... OR instr(name, ?) > 0 ...)`, pushing bound values in
/// placeholder order. A rule with no labels or substrings matches nothing.
fn condition_sql(rule: &ReclassificationRule, params: &mut Vec<Value>) -> String {
    let mut clauses = Vec::new();
    for label in &rule.legacy_labels {
        params.push(Value::Text(label.clone()));
        clauses.push("IFNULL(chemistry, '') = ?");
    }
    for needle in &rule.name_contains {
        params.push(Value::Text(needle.clone()));
        clauses.push("instr(IFNULL(name, ''), ?) > 0");
    }
    if clauses.is_empty() {
        "(0)".to_string()
    } else {
        format!("({})", clauses.join(" OR "))
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ProdcatError::Storage(format!("encode list: {e}")))
}

/// Decode a JSON list column. Malformed content reads as empty.
fn json_list<T: serde::de::DeserializeOwned>(row: &libsql::Row, index: i32) -> Vec<T> {
    row.get::<String>(index)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Convert a database row (in [`PRODUCT_COLUMNS`] order) to a [`Product`].
fn row_to_product(row: &libsql::Row) -> Result<Product> {
    Ok(Product {
        id: row.get::<String>(0).map_err(ProdcatError::storage)?,
        product_id: row.get::<String>(1).map_err(ProdcatError::storage)?,
        name: row.get::<String>(2).unwrap_or_default(),
        full_name: row.get::<String>(3).unwrap_or_default(),
        description: row.get::<String>(4).unwrap_or_default(),
        brand: row.get::<String>(5).unwrap_or_default(),
        industry: row.get::<String>(6).unwrap_or_default(),
        chemistry: row.get::<String>(7).ok(),
        url: row.get::<String>(8).ok(),
        image: row.get::<String>(9).ok(),
        benefits: json_list(row, 10),
        applications: json_list(row, 11),
        technical: json_list::<TechnicalProperty>(row, 12),
        sizing: json_list(row, 13),
        color: row.get::<String>(14).ok(),
        cleanup: row.get::<String>(15).ok(),
        recommended_equipment: row.get::<String>(16).ok(),
        published: row.get::<i64>(17).map(|v| v != 0).unwrap_or(true),
        last_edited: row.get::<String>(18).ok().and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }),
    })
}

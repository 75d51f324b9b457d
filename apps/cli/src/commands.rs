//! CLI command definitions, routing, and tracing setup.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use prodcat_core::filter::{self, IdCheck};
use prodcat_core::images::{self, ImageState};
use prodcat_core::updates::{self, UpdateStatus, UpdateSummary};
use prodcat_core::verify::{self, VerifyOutcome, VerifySummary};
use prodcat_core::{
    BatchProgress, Catalog, CredentialVerifier, DigestCredentials, RemoteCatalog, consolidate,
};
use prodcat_csv::{CsvTable, TableOptions, write_rows};
use prodcat_remote::ApiClient;
use prodcat_shared::{
    AppConfig, Product, RuleTable, api_base_url, database_settings, init_config, load_config,
    load_config_from,
};
use prodcat_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// prodcat: product catalog maintenance.
#[derive(Parser)]
#[command(
    name = "prodcat",
    version,
    about = "Scan product spreadsheets, normalize catalog fields, and verify records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.prodcat/prodcat.toml).
    #[arg(long, global = true, env = "PRODCAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Rule table TOML file (overrides `[rules] path`).
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where lookups and per-item updates go.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum Source {
    Store,
    Api,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Read product-list spreadsheets.
    Csv {
        #[command(subcommand)]
        action: CsvAction,
    },

    /// Chemistry field maintenance.
    Chemistry {
        #[command(subcommand)]
        action: ChemistryAction,
    },

    /// Publish and unpublish products.
    Publish {
        /// Identifiers to publish.
        #[arg(long, value_delimiter = ',')]
        publish: Vec<String>,

        /// Identifiers to unpublish.
        #[arg(long, value_delimiter = ',')]
        unpublish: Vec<String>,

        #[arg(long, value_enum, default_value = "api")]
        source: Source,

        /// Write changes (default is a dry run).
        #[arg(long)]
        live: bool,
    },

    /// Product image references.
    Images {
        #[command(subcommand)]
        action: ImagesAction,
    },

    /// Report exact, partial, or missing matches for identifiers.
    Verify {
        /// Identifiers to check.
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long, value_enum, default_value = "store")]
        source: Source,

        /// Per-lookup timeout in seconds.
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Find products by identifier or name substring.
    Find {
        term: String,

        #[arg(long, value_enum, default_value = "store")]
        source: Source,
    },

    /// List every product.
    List {
        #[arg(long, value_enum, default_value = "store")]
        source: Source,
    },

    /// Store totals and chemistry family counts.
    Stats,

    /// Load products from a JSON array file into the store.
    Import {
        file: PathBuf,
    },

    /// Inspect the rule table.
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Operator credential checks.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Spreadsheet input options shared by the `csv` subcommands.
#[derive(clap::Args, Clone, Debug)]
pub(crate) struct SheetArgs {
    /// CSV file to read.
    pub file: PathBuf,

    /// Rows to skip before the header row.
    #[arg(long, default_value = "0")]
    pub header_row: usize,

    /// Drop data rows with fewer fields than this (0 keeps all).
    #[arg(long, default_value = "2")]
    pub min_fields: usize,
}

impl SheetArgs {
    fn options(&self) -> TableOptions {
        TableOptions {
            header_row: self.header_row,
            min_fields: self.min_fields,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum CsvAction {
    /// List records selected by a membership rule.
    Scan {
        #[command(flatten)]
        sheet: SheetArgs,

        #[arg(long, default_value = "marine-composites")]
        rule: String,
    },
    /// List rows whose chemistry is pending.
    Pending {
        #[command(flatten)]
        sheet: SheetArgs,

        #[arg(long, default_value = "pending-chemistry")]
        rule: String,
    },
    /// Show spreadsheet state for specific identifiers.
    Check {
        #[command(flatten)]
        sheet: SheetArgs,

        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Rewrite a CSV file with the standard quoting policy.
    Normalize {
        /// CSV file to read.
        file: PathBuf,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub(crate) enum ChemistryAction {
    /// Collapse legacy chemistry labels into their families.
    Consolidate {
        /// Count matches without writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Set chemistries from a mapping sheet.
    Import {
        #[command(flatten)]
        sheet: SheetArgs,

        #[arg(long, value_enum, default_value = "api")]
        source: Source,

        /// Write changes (default is a dry run).
        #[arg(long)]
        live: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum ImagesAction {
    /// Prefix bare image filenames with the blob base URL.
    FixUrls {
        /// Blob base URL (defaults to `[images] blob_base_url`).
        #[arg(long)]
        base_url: Option<String>,

        /// Write changes (default is a dry run).
        #[arg(long)]
        live: bool,
    },
    /// Compare image filenames with `<product_id>.png`.
    Check {
        /// Only these identifiers (default: all).
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum RulesAction {
    /// Print the active rule table as TOML.
    Show,
    /// Validate the rule table and report overlapping rules.
    Check,
}

#[derive(Subcommand)]
pub(crate) enum AuthAction {
    /// Verify a secret read from stdin against the configured digest.
    Check {
        #[arg(long)]
        name: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Diagnostics go to stderr so
/// reports on stdout stay clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "prodcat=info",
        1 => "prodcat=debug",
        _ => "prodcat=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let rules = load_rules(cli.rules.as_deref(), &config)?;

    match cli.command {
        Command::Csv { action } => match action {
            CsvAction::Scan { sheet, rule } => cmd_csv_scan(&sheet, &rules, &rule),
            CsvAction::Pending { sheet, rule } => cmd_csv_pending(&sheet, &rules, &rule),
            CsvAction::Check { sheet, ids } => cmd_csv_check(&sheet, &ids),
            CsvAction::Normalize { file, out } => cmd_csv_normalize(&file, out.as_deref()),
        },
        Command::Chemistry { action } => match action {
            ChemistryAction::Consolidate { dry_run } => {
                cmd_consolidate(&config, &rules, dry_run).await
            }
            ChemistryAction::Import {
                sheet,
                source,
                live,
            } => cmd_chemistry_import(&config, &sheet, source, live).await,
        },
        Command::Publish {
            publish,
            unpublish,
            source,
            live,
        } => cmd_publish(&config, &publish, &unpublish, source, live).await,
        Command::Images { action } => match action {
            ImagesAction::FixUrls { base_url, live } => {
                cmd_images_fix(&config, base_url.as_deref(), live).await
            }
            ImagesAction::Check { ids } => cmd_images_check(&config, &ids).await,
        },
        Command::Verify {
            ids,
            source,
            timeout,
        } => cmd_verify(&config, &ids, source, Duration::from_secs(timeout)).await,
        Command::Find { term, source } => cmd_find(&config, &term, source).await,
        Command::List { source } => cmd_list(&config, source).await,
        Command::Stats => cmd_stats(&config, &rules).await,
        Command::Import { file } => cmd_import(&config, &file).await,
        Command::Rules { action } => match action {
            RulesAction::Show => cmd_rules_show(&rules),
            RulesAction::Check => cmd_rules_check(&rules),
        },
        Command::Auth { action } => match action {
            AuthAction::Check { name } => cmd_auth_check(&config, &name),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

fn load_rules(flag: Option<&Path>, config: &AppConfig) -> Result<RuleTable> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| config.rules.path.as_ref().map(PathBuf::from));
    match path {
        Some(path) => Ok(RuleTable::load(&path)?),
        None => Ok(RuleTable::default()),
    }
}

async fn open_store(config: &AppConfig, readonly: bool) -> Result<Storage> {
    let settings = database_settings(config)?;
    let storage = if readonly {
        Storage::connect_readonly(&settings).await?
    } else {
        Storage::connect(&settings).await?
    };
    Ok(storage)
}

fn remote_catalog(config: &AppConfig) -> Result<RemoteCatalog> {
    let base = api_base_url(config)?;
    info!(%base, "using catalog API");
    let client = ApiClient::new(base, Duration::from_secs(config.api.timeout_secs))?;
    Ok(RemoteCatalog::new(client))
}

fn load_sheet(sheet: &SheetArgs) -> Result<CsvTable> {
    let table = CsvTable::from_path(&sheet.file, &sheet.options())?;
    info!(
        file = %sheet.file.display(),
        records = table.records.len(),
        dropped = table.dropped_rows,
        "spreadsheet loaded"
    );
    Ok(table)
}

fn rule_named<'a>(rules: &'a RuleTable, name: &str) -> Result<&'a prodcat_shared::MembershipRule> {
    rules.membership_rule(name).ok_or_else(|| {
        let known: Vec<&str> = rules.membership.iter().map(|r| r.name.as_str()).collect();
        eyre!("unknown membership rule '{name}' (known: {})", known.join(", "))
    })
}

fn mode_label(dry_run: bool) -> &'static str {
    if dry_run {
        "DRY RUN (no changes will be made)"
    } else {
        "LIVE (changes will be saved)"
    }
}

// ---------------------------------------------------------------------------
// csv
// ---------------------------------------------------------------------------

fn cmd_csv_scan(sheet: &SheetArgs, rules: &RuleTable, rule: &str) -> Result<()> {
    let rule = rule_named(rules, rule)?;
    let table = load_sheet(sheet)?;
    let report = filter::scan(&table, rule);

    println!("Product ID | Product Name | Industry | Chemistry | Size");
    println!("-----------|--------------|----------|-----------|-----");
    for row in &report.rows {
        println!(
            "{} | {} | {} | {} | {}",
            row.product_id,
            row.name,
            row.industry,
            row.chemistry,
            row.size.replace('\n', " / ")
        );
    }
    println!();
    println!("  Matching rows:  {}", report.rows.len());
    println!("  Without an ID:  {}", report.missing_id);
    if !report.duplicates.is_empty() {
        println!("  Duplicate IDs:  {}", report.duplicates.join(", "));
    }
    Ok(())
}

fn cmd_csv_pending(sheet: &SheetArgs, rules: &RuleTable, rule: &str) -> Result<()> {
    let rule = rule_named(rules, rule)?;
    let table = load_sheet(sheet)?;

    println!("Product ID | Chemistry | Status | On New Site Now");
    println!("-----------|-----------|--------|-----------------");
    let pending = filter::pending_chemistries(&table, rule);
    for row in &pending {
        println!(
            "{} | {} | {} | {}",
            row.product_id, row.chemistry, row.status, row.on_new_site
        );
    }
    println!();
    println!("  Pending chemistries: {}", pending.len());
    Ok(())
}

fn cmd_csv_check(sheet: &SheetArgs, ids: &[String]) -> Result<()> {
    let table = load_sheet(sheet)?;

    println!("Product ID | Chemistry | On New Site Now | OK?");
    println!("-----------|-----------|-----------------|-----");
    for check in filter::check_ids(&table, ids) {
        match check {
            IdCheck::Found {
                product_id,
                chemistry,
                on_new_site,
                status,
            } => println!("{product_id} | {chemistry} | {on_new_site} | {status}"),
            IdCheck::Missing(id) => println!("{id} | (not in sheet)"),
        }
    }
    Ok(())
}

fn cmd_csv_normalize(file: &Path, out: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let tokenized = prodcat_csv::tokenize(&content);
    if tokenized.unterminated_quote {
        tracing::warn!(file = %file.display(), "input ended inside a quoted field");
    }
    let text = write_rows(&tokenized.rows)?;

    match out {
        Some(path) => {
            std::fs::write(path, &text)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!(rows = tokenized.rows.len(), out = %path.display(), "normalized CSV written");
        }
        None => print!("{text}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// chemistry
// ---------------------------------------------------------------------------

async fn cmd_consolidate(config: &AppConfig, rules: &RuleTable, dry_run: bool) -> Result<()> {
    let storage = open_store(config, dry_run).await?;
    println!("Consolidating chemistries. Mode: {}", mode_label(dry_run));

    if dry_run {
        let products = storage.list_products().await?;
        for change in filter::preview_reclassification(rules, &products) {
            println!(
                "  {}: {} -> {}",
                change.product_id,
                change.from.as_deref().unwrap_or("N/A"),
                change.to
            );
        }
    }

    let reporter = CliProgress::new();
    let report = consolidate::consolidate(&storage, rules, dry_run, &reporter).await?;

    println!();
    for rule in &report.rules {
        let verb = if report.dry_run { "would update" } else { "updated" };
        println!("  {:<20} {verb} {} rows", rule.target, rule.affected);
    }
    println!();
    println!("  Final counts:");
    for count in &report.counts {
        println!("  {:<20} {}", count.chemistry, count.count);
    }
    println!();
    Ok(())
}

async fn cmd_chemistry_import(
    config: &AppConfig,
    sheet: &SheetArgs,
    source: Source,
    live: bool,
) -> Result<()> {
    let table = load_sheet(sheet)?;
    let mappings = updates::chemistry_mappings(&table);
    println!("Updating product chemistries from {}", sheet.file.display());
    println!("Mappings: {}  Mode: {}", mappings.len(), mode_label(!live));

    let reporter = CliProgress::new();
    let summary = match source {
        Source::Store => {
            let storage = open_store(config, !live).await?;
            updates::apply_chemistry_mappings(&storage, &mappings, !live, &reporter).await?
        }
        Source::Api => {
            let catalog = remote_catalog(config)?;
            updates::apply_chemistry_mappings(&catalog, &mappings, !live, &reporter).await?
        }
    };

    for result in &summary.results {
        if result.status == UpdateStatus::Updated {
            println!(
                "  {}: {} -> {}",
                result.product_id, result.old_value, result.new_value
            );
        }
    }
    print_update_summary(&summary);
    Ok(())
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

async fn cmd_publish(
    config: &AppConfig,
    publish: &[String],
    unpublish: &[String],
    source: Source,
    live: bool,
) -> Result<()> {
    if publish.is_empty() && unpublish.is_empty() {
        return Err(eyre!("nothing to do: pass --publish and/or --unpublish"));
    }
    println!("Updating published status. Mode: {}", mode_label(!live));

    let reporter = CliProgress::new();
    let summary = match source {
        Source::Store => {
            let storage = open_store(config, !live).await?;
            updates::apply_published(&storage, publish, unpublish, !live, &reporter).await?
        }
        Source::Api => {
            let catalog = remote_catalog(config)?;
            updates::apply_published(&catalog, publish, unpublish, !live, &reporter).await?
        }
    };

    for result in &summary.results {
        if result.status == UpdateStatus::Updated {
            println!(
                "  {}: {} -> {}",
                result.product_id, result.old_value, result.new_value
            );
        }
    }
    print_update_summary(&summary);
    Ok(())
}

fn print_update_summary(summary: &UpdateSummary) {
    let verb = if summary.dry_run { "Would update" } else { "Updated" };
    println!();
    println!("  {verb}:        {}", summary.count(UpdateStatus::Updated));
    println!("  No change needed: {}", summary.count(UpdateStatus::NoChange));
    println!("  Not found:        {}", summary.count(UpdateStatus::NotFound));
    println!("  Errors:           {}", summary.count(UpdateStatus::Error));

    let not_found: Vec<&str> = summary.not_found().collect();
    if !not_found.is_empty() {
        println!();
        println!("  Products not found:");
        for id in not_found {
            println!("   - {id}");
        }
    }
    let errors: Vec<(&str, &str)> = summary.errors().collect();
    if !errors.is_empty() {
        println!();
        println!("  Errors:");
        for (id, message) in errors {
            println!("   - {id}: {message}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// images
// ---------------------------------------------------------------------------

async fn cmd_images_fix(config: &AppConfig, base_url: Option<&str>, live: bool) -> Result<()> {
    let base = base_url
        .map(String::from)
        .or_else(|| config.images.blob_base_url.clone())
        .ok_or_else(|| eyre!("no blob base URL: pass --base-url or set [images] blob_base_url"))?;
    if !images::is_absolute(&base) {
        return Err(eyre!("blob base URL must be http(s): {base}"));
    }

    let storage = open_store(config, !live).await?;
    let placeholder = &config.images.placeholder;
    if !live {
        for product in storage.list_relative_images(placeholder).await? {
            if let Some(image) = &product.image {
                println!(
                    "  {}: {image} -> {}",
                    product.product_id,
                    images::blob_url(&base, image)
                );
            }
        }
    }

    let affected = images::fix_relative_urls(&storage, &base, placeholder, !live).await?;
    let verb = if live { "Updated" } else { "Would update" };
    println!();
    println!("  {verb}: {affected} image references");
    println!();
    Ok(())
}

async fn cmd_images_check(config: &AppConfig, ids: &[String]) -> Result<()> {
    let storage = open_store(config, true).await?;
    let products = if ids.is_empty() {
        storage.list_products().await?
    } else {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match storage.get_product(id).await? {
                Some(product) => found.push(product),
                None => println!("  {id}: not found"),
            }
        }
        found
    };

    let checks = images::check_images(&products, &config.images.placeholder);
    let mut mismatched = 0;
    for check in &checks {
        let current = check.current.as_deref().unwrap_or("-");
        let state = match check.state {
            ImageState::Matches => continue,
            ImageState::Mismatch => {
                mismatched += 1;
                "mismatch"
            }
            ImageState::Placeholder => "placeholder",
            ImageState::Missing => "missing",
        };
        println!("  {} [{state}] current: {current}", check.product_id);
        if let Some(suggested) = check.suggested() {
            println!("      expected: {suggested}");
        }
    }
    println!();
    println!("  Checked:    {}", checks.len());
    println!("  Mismatched: {mismatched}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// verify / find / list
// ---------------------------------------------------------------------------

async fn cmd_verify(
    config: &AppConfig,
    ids: &[String],
    source: Source,
    timeout: Duration,
) -> Result<()> {
    let reporter = CliProgress::new();
    let items = match source {
        Source::Store => {
            let storage = open_store(config, true).await?;
            verify::verify(&storage, ids, timeout, &reporter).await
        }
        Source::Api => {
            let catalog = remote_catalog(config)?;
            verify::verify(&catalog, ids, timeout, &reporter).await
        }
    };

    for item in &items {
        match &item.outcome {
            VerifyOutcome::Exact(product) => {
                println!("  FOUND {}", item.requested);
                print_product(product);
            }
            VerifyOutcome::Partial(matches) => {
                println!("  PARTIAL {} ({} matches)", item.requested, matches.len());
                for product in matches {
                    println!("    - {}: {}", product.product_id, product.display_name());
                }
            }
            VerifyOutcome::NotFound => println!("  NOT FOUND {}", item.requested),
            VerifyOutcome::Failed(reason) => println!("  FAILED {}: {reason}", item.requested),
        }
    }

    let summary = VerifySummary::from_items(&items);
    println!();
    println!("  Exact:     {}", summary.exact);
    println!("  Partial:   {}", summary.partial);
    println!("  Not found: {}", summary.not_found);
    println!("  Failed:    {}", summary.failed);
    println!();
    Ok(())
}

fn print_product(product: &Product) {
    println!("      Name:      {}", product.display_name());
    println!("      Industry:  {}", product.industry);
    println!("      Chemistry: {}", product.chemistry_or_na());
    println!("      Published: {}", product.published);
    println!(
        "      Image:     {}",
        product.image.as_deref().unwrap_or("-")
    );
}

async fn cmd_find(config: &AppConfig, term: &str, source: Source) -> Result<()> {
    let products = match source {
        Source::Store => find_in(&open_store(config, true).await?, term).await?,
        Source::Api => find_in(&remote_catalog(config)?, term).await?,
    };
    if products.is_empty() {
        println!("  No products match '{term}'");
    }
    for product in &products {
        println!("  {}", product.product_id);
        print_product(product);
    }
    Ok(())
}

async fn find_in<C: Catalog>(catalog: &C, term: &str) -> Result<Vec<Product>> {
    info!(source = catalog.source_name(), term, "searching");
    Ok(catalog.search(term).await?)
}

async fn cmd_list(config: &AppConfig, source: Source) -> Result<()> {
    let products = match source {
        Source::Store => open_store(config, true).await?.list_products().await?,
        Source::Api => remote_catalog(config)?.list().await?,
    };
    for product in &products {
        println!(
            "  {:<14} {:<24} {:<18} {}",
            product.product_id,
            product.chemistry_or_na(),
            product.industry,
            if product.published { "published" } else { "unpublished" }
        );
    }
    println!();
    println!("  Total: {}", products.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// stats / import
// ---------------------------------------------------------------------------

async fn cmd_stats(config: &AppConfig, rules: &RuleTable) -> Result<()> {
    let storage = open_store(config, true).await?;
    let targets: Vec<String> = rules
        .reclassification
        .iter()
        .map(|r| r.target.clone())
        .collect();

    println!("  Products:              {}", storage.product_count().await?);
    println!(
        "  Relative image paths:  {}",
        storage.count_relative_images(&config.images.placeholder).await?
    );
    for (index, rule) in rules.reclassification.iter().enumerate() {
        println!(
            "  Pending {:<14} {}",
            format!("{}:", rule.target),
            storage.count_reclassification(rules, index).await?
        );
    }
    println!();
    for count in storage.chemistry_counts(&targets).await? {
        println!("  {:<22} {}", count.chemistry, count.count);
    }
    Ok(())
}

async fn cmd_import(config: &AppConfig, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let products: Vec<Product> = serde_json::from_str(&content)
        .wrap_err_with(|| format!("{} is not a JSON array of products", file.display()))?;

    let storage = open_store(config, false).await?;
    let reporter = CliProgress::new();
    for (i, product) in products.iter().enumerate() {
        reporter.item(&product.product_id, i + 1, products.len());
        storage.upsert_product(product).await?;
    }
    reporter.finish("import finished");

    info!(count = products.len(), "products imported");
    println!("  Imported: {}", products.len());
    println!("  In store: {}", storage.product_count().await?);
    Ok(())
}

// ---------------------------------------------------------------------------
// rules / auth / config
// ---------------------------------------------------------------------------

fn cmd_rules_show(rules: &RuleTable) -> Result<()> {
    println!("{}", toml::to_string_pretty(rules)?);
    Ok(())
}

fn cmd_rules_check(rules: &RuleTable) -> Result<()> {
    let overlaps = rules.validate()?;
    if overlaps.is_empty() {
        println!("  Rule table OK: no overlapping rules");
    } else {
        for overlap in &overlaps {
            println!("  overlap: {overlap}");
        }
        println!();
        println!("  {} overlaps; earlier rules take precedence", overlaps.len());
    }
    Ok(())
}

fn cmd_auth_check(config: &AppConfig, name: &str) -> Result<()> {
    let verifier = DigestCredentials::from_entries(&config.users);
    if verifier.is_empty() {
        return Err(eyre!("no [[users]] configured"));
    }

    let mut secret = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut secret)
        .wrap_err("failed to read secret from stdin")?;
    let secret = secret.trim_end_matches(['\r', '\n']);

    if verifier.verify(name, secret) {
        let role = if verifier.is_admin(name) { "admin" } else { "user" };
        println!("  Credentials valid for {name} ({role})");
        Ok(())
    } else {
        Err(eyre!("credentials rejected for '{name}'"))
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl BatchProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, label: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {label}"));
    }

    fn finish(&self, _summary: &str) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

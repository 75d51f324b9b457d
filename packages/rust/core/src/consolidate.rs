//! Chemistry family consolidation against the store.

use prodcat_shared::{ChemistryCount, Result, RuleTable};
use prodcat_storage::Storage;
use tracing::{info, instrument, warn};

use crate::progress::BatchProgress;

/// Affected (or, in a dry run, matching) records for one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub target: String,
    pub affected: u64,
}

/// Result of a consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub dry_run: bool,
    pub rules: Vec<RuleOutcome>,
    /// Per-family product counts after the run.
    pub counts: Vec<ChemistryCount>,
}

impl ConsolidationReport {
    pub fn total_affected(&self) -> u64 {
        self.rules.iter().map(|r| r.affected).sum()
    }
}

/// Apply every reclassification rule in table order, then count families.
///
/// Each rule is one set-based UPDATE. Rerunning after a successful live run
/// reports zero affected rows for every rule. With `dry_run` the same
/// predicates are only counted.
#[instrument(skip_all, fields(rules = rules.reclassification.len(), dry_run = dry_run))]
pub async fn consolidate(
    storage: &Storage,
    rules: &RuleTable,
    dry_run: bool,
    progress: &dyn BatchProgress,
) -> Result<ConsolidationReport> {
    for overlap in rules.validate()? {
        warn!(%overlap, "overlapping reclassification rules; earlier rule wins");
    }

    let total = rules.reclassification.len();
    let mut outcomes = Vec::with_capacity(total);
    for (index, rule) in rules.reclassification.iter().enumerate() {
        progress.item(&rule.target, index + 1, total);
        let affected = if dry_run {
            storage.count_reclassification(rules, index).await?
        } else {
            storage.apply_reclassification(rules, index).await?
        };
        info!(family = %rule.target, affected, "rule processed");
        outcomes.push(RuleOutcome {
            target: rule.target.clone(),
            affected,
        });
    }

    let targets: Vec<String> = rules
        .reclassification
        .iter()
        .map(|r| r.target.clone())
        .collect();
    let counts = storage.chemistry_counts(&targets).await?;
    progress.finish(&format!("{total} rules processed"));

    Ok(ConsolidationReport {
        dry_run,
        rules: outcomes,
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use prodcat_shared::Product;
    use uuid::Uuid;

    async fn seeded_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("prodcat_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        for (id, name, chemistry) in [
            ("OS2", "OS2", Some("acrylic")),
            ("T215", "PSA Tape", None),
            ("TAC-R777", "TAC-R777", Some("methacrylate_adhesive")),
            ("C-R560", "C-R560", Some("neoprene_contact_adhesive")),
            ("R190", "Rubber Cement", Some("rubber")),
            ("E100", "Epoxy Putty", Some("epoxy")),
        ] {
            let mut p = Product::new(id, name);
            p.chemistry = chemistry.map(String::from);
            storage.upsert_product(&p).await.expect("seed");
        }
        storage
    }

    #[tokio::test]
    async fn second_live_run_affects_nothing() {
        let storage = seeded_storage().await;
        let rules = RuleTable::default();

        let first = consolidate(&storage, &rules, false, &SilentProgress).await.unwrap();
        assert_eq!(first.rules[0].affected, 3);
        assert_eq!(first.rules[1].affected, 2);
        assert_eq!(
            first.counts,
            vec![
                ChemistryCount {
                    chemistry: "acrylic_incl_psa".into(),
                    count: 3
                },
                ChemistryCount {
                    chemistry: "rubber_based".into(),
                    count: 2
                },
            ]
        );

        let second = consolidate(&storage, &rules, false, &SilentProgress).await.unwrap();
        assert_eq!(second.total_affected(), 0);
        assert_eq!(second.counts, first.counts);
    }

    #[tokio::test]
    async fn dry_run_counts_without_writing() {
        let storage = seeded_storage().await;
        let rules = RuleTable::default();

        let report = consolidate(&storage, &rules, true, &SilentProgress).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.total_affected(), 5);
        assert!(report.counts.is_empty());

        let os2 = storage.get_product("OS2").await.unwrap().unwrap();
        assert_eq!(os2.chemistry.as_deref(), Some("acrylic"));
    }

    #[tokio::test]
    async fn invalid_rule_table_is_rejected_before_work() {
        let storage = seeded_storage().await;
        let mut rules = RuleTable::default();
        rules.reclassification[1].name_contains.push(String::new());

        assert!(consolidate(&storage, &rules, false, &SilentProgress).await.is_err());
        let r190 = storage.get_product("R190").await.unwrap().unwrap();
        assert_eq!(r190.chemistry.as_deref(), Some("rubber"));
    }

    #[tokio::test]
    async fn chained_targets_are_rejected_before_work() {
        let storage = seeded_storage().await;
        let mut p1 = Product::new("P1", "P1");
        p1.chemistry = Some("z".into());
        storage.upsert_product(&p1).await.unwrap();

        let rules = RuleTable::from_toml_str(
            r#"
[[reclassification]]
target = "x"
legacy_labels = ["y"]

[[reclassification]]
target = "y"
legacy_labels = ["z"]
"#,
        )
        .unwrap();

        assert!(consolidate(&storage, &rules, false, &SilentProgress).await.is_err());
        assert!(consolidate(&storage, &rules, true, &SilentProgress).await.is_err());
        let p1 = storage.get_product("P1").await.unwrap().unwrap();
        assert_eq!(p1.chemistry.as_deref(), Some("z"));
    }
}

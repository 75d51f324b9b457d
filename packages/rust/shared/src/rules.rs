//! Rule tables for CSV row selection and chemistry consolidation.
//!
//! A [`RuleTable`] is plain data: it deserializes from TOML so it can be
//! audited and edited without touching the scanning or update code. Matching
//! is literal and case-sensitive throughout; rule values are never treated as
//! patterns.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProdcatError, Result};

/// Selects CSV records by the value of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRule {
    /// Rule name used on the command line (`--rule marine-composites`).
    pub name: String,
    /// Header of the column the rule inspects.
    pub column: String,
    /// Exact values that make a record a member.
    #[serde(default)]
    pub equals: Vec<String>,
    /// Literal substrings that make a record a member.
    #[serde(default)]
    pub contains: Vec<String>,
}

impl MembershipRule {
    /// Whether a column value satisfies this rule.
    pub fn matches_value(&self, value: &str) -> bool {
        self.equals.iter().any(|v| v == value)
            || self.contains.iter().any(|s| value.contains(s.as_str()))
    }
}

/// Collapses legacy chemistry labels into one chemistry family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclassificationRule {
    /// The family label written to matching records.
    pub target: String,
    /// Chemistry values that belong to the family.
    #[serde(default)]
    pub legacy_labels: Vec<String>,
    /// Substrings of the product name that place a record in the family.
    #[serde(default)]
    pub name_contains: Vec<String>,
}

impl ReclassificationRule {
    /// The raw match condition: a legacy label or a name substring.
    pub fn matches(&self, chemistry: Option<&str>, name: &str) -> bool {
        let chemistry = chemistry.unwrap_or("");
        self.legacy_labels.iter().any(|l| l == chemistry)
            || self.name_contains.iter().any(|s| name.contains(s.as_str()))
    }

    /// Whether this rule owns the record: it matches, or the record already
    /// carries this rule's target.
    pub fn claims(&self, chemistry: Option<&str>, name: &str) -> bool {
        chemistry == Some(self.target.as_str()) || self.matches(chemistry, name)
    }
}

/// A pair of rules that can claim the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOverlap {
    /// Both rules list the same legacy label.
    Label {
        first: String,
        second: String,
        label: String,
    },
    /// A name substring of one rule contains a substring of the other, so
    /// any name matching the longer one matches both.
    Substring {
        first: String,
        second: String,
        shorter: String,
        longer: String,
    },
}

impl std::fmt::Display for RuleOverlap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Label {
                first,
                second,
                label,
            } => write!(f, "'{first}' and '{second}' both list label '{label}'"),
            Self::Substring {
                first,
                second,
                shorter,
                longer,
            } => write!(
                f,
                "'{first}' and '{second}' overlap: '{longer}' contains '{shorter}'"
            ),
        }
    }
}

/// Membership and reclassification rules, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default)]
    pub membership: Vec<MembershipRule>,
    #[serde(default)]
    pub reclassification: Vec<ReclassificationRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            membership: vec![
                MembershipRule {
                    name: "marine-composites".into(),
                    column: "Industry".into(),
                    equals: strings(&["Marine", "Composites"]),
                    contains: Vec::new(),
                },
                MembershipRule {
                    name: "pending-chemistry".into(),
                    column: "OK?".into(),
                    equals: Vec::new(),
                    contains: strings(&["ADD", "Phase"]),
                },
            ],
            reclassification: vec![
                ReclassificationRule {
                    target: "acrylic_incl_psa".into(),
                    legacy_labels: strings(&[
                        "acrylic",
                        "pressure_sensitive_adhesive",
                        "methacrylate",
                        "methacrylate_adhesive",
                    ]),
                    name_contains: strings(&["Acrylic", "PSA", "Pressure Sensitive"]),
                },
                ReclassificationRule {
                    target: "rubber_based".into(),
                    legacy_labels: strings(&["rubber", "neoprene_contact_adhesive", "neoprene"]),
                    name_contains: strings(&["Rubber", "Neoprene"]),
                },
            ],
        }
    }
}

impl RuleTable {
    /// Parse a rule table from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProdcatError::parse(format!("invalid rule table: {e}")))
    }

    /// Load a rule table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProdcatError::io(path, e))?;
        let table = Self::from_toml_str(&content)?;
        tracing::debug!(
            ?path,
            membership = table.membership.len(),
            reclassification = table.reclassification.len(),
            "loaded rule table"
        );
        Ok(table)
    }

    /// Look up a membership rule by name.
    pub fn membership_rule(&self, name: &str) -> Option<&MembershipRule> {
        self.membership.iter().find(|r| r.name == name)
    }

    /// The rule that owns a record: the first rule, in order, that claims it.
    pub fn resolve(&self, chemistry: Option<&str>, name: &str) -> Option<&ReclassificationRule> {
        self.reclassification
            .iter()
            .find(|r| r.claims(chemistry, name))
    }

    /// The new chemistry for a record, or `None` when it needs no change.
    pub fn reclassify(&self, chemistry: Option<&str>, name: &str) -> Option<&str> {
        self.resolve(chemistry, name)
            .filter(|r| chemistry != Some(r.target.as_str()))
            .map(|r| r.target.as_str())
    }

    /// Check the table for unusable entries and report overlapping rules.
    ///
    /// Empty names, columns, targets, labels or substrings are errors (an
    /// empty substring matches every name), as is a target listed as a
    /// legacy label by an earlier rule. Overlaps are returned, not rejected:
    /// precedence still makes the outcome deterministic.
    pub fn validate(&self) -> Result<Vec<RuleOverlap>> {
        for rule in &self.membership {
            if rule.name.is_empty() || rule.column.is_empty() {
                return Err(ProdcatError::validation(
                    "membership rule with empty name or column",
                ));
            }
            if rule.equals.iter().chain(&rule.contains).any(String::is_empty) {
                return Err(ProdcatError::validation(format!(
                    "membership rule '{}' has an empty value",
                    rule.name
                )));
            }
        }

        for (i, rule) in self.reclassification.iter().enumerate() {
            if rule.target.is_empty() {
                return Err(ProdcatError::validation(
                    "reclassification rule with empty target",
                ));
            }
            if rule
                .legacy_labels
                .iter()
                .chain(&rule.name_contains)
                .any(String::is_empty)
            {
                return Err(ProdcatError::validation(format!(
                    "reclassification rule '{}' has an empty label or substring",
                    rule.target
                )));
            }
            if self.reclassification[..i]
                .iter()
                .any(|r| r.target == rule.target)
            {
                return Err(ProdcatError::validation(format!(
                    "duplicate reclassification target '{}'",
                    rule.target
                )));
            }
            if let Some(earlier) = self.reclassification[..i]
                .iter()
                .find(|r| r.legacy_labels.contains(&rule.target))
            {
                return Err(ProdcatError::validation(format!(
                    "target '{}' is a legacy label of earlier rule '{}'; \
                     every run would move its records again",
                    rule.target, earlier.target
                )));
            }
        }

        let mut overlaps = Vec::new();
        for (i, a) in self.reclassification.iter().enumerate() {
            for b in &self.reclassification[i + 1..] {
                for label in a.legacy_labels.iter().filter(|l| b.legacy_labels.contains(l)) {
                    overlaps.push(RuleOverlap::Label {
                        first: a.target.clone(),
                        second: b.target.clone(),
                        label: label.clone(),
                    });
                }
                for sa in &a.name_contains {
                    for sb in &b.name_contains {
                        let (shorter, longer) = if sa.len() <= sb.len() { (sa, sb) } else { (sb, sa) };
                        if longer.contains(shorter.as_str()) {
                            overlaps.push(RuleOverlap::Substring {
                                first: a.target.clone(),
                                second: b.target.clone(),
                                shorter: shorter.clone(),
                                longer: longer.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(overlaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid_and_disjoint() {
        let table = RuleTable::default();
        let overlaps = table.validate().expect("valid default table");
        assert!(overlaps.is_empty(), "unexpected overlaps: {overlaps:?}");
    }

    #[test]
    fn membership_is_case_sensitive_equality() {
        let table = RuleTable::default();
        let rule = table.membership_rule("marine-composites").unwrap();
        assert!(rule.matches_value("Marine"));
        assert!(rule.matches_value("Composites"));
        assert!(!rule.matches_value("marine"));
        assert!(!rule.matches_value("Marine "));
        assert!(!rule.matches_value("Industrial"));
    }

    #[test]
    fn membership_contains_is_literal() {
        let table = RuleTable::default();
        let rule = table.membership_rule("pending-chemistry").unwrap();
        assert!(rule.matches_value("ADD now"));
        assert!(rule.matches_value("Phase 2"));
        assert!(!rule.matches_value("Y"));
    }

    #[test]
    fn reclassify_by_label_and_name() {
        let table = RuleTable::default();
        assert_eq!(table.reclassify(Some("acrylic"), "OS2"), Some("acrylic_incl_psa"));
        assert_eq!(table.reclassify(None, "PSA Tape"), Some("acrylic_incl_psa"));
        assert_eq!(table.reclassify(Some("neoprene"), "C-R560"), Some("rubber_based"));
        assert_eq!(table.reclassify(Some("epoxy"), "Neoprene Contact"), Some("rubber_based"));
        assert_eq!(table.reclassify(Some("epoxy"), "Epoxy Putty"), None);
    }

    #[test]
    fn name_match_is_case_sensitive() {
        let table = RuleTable::default();
        assert_eq!(table.reclassify(Some("epoxy"), "acrylic primer"), None);
    }

    #[test]
    fn reclassify_is_idempotent() {
        let table = RuleTable::default();
        let samples = [
            (Some("acrylic"), "Neoprene X"),
            (Some("rubber"), "Acrylic Rubber Tape"),
            (None, "Rubber Cement"),
            (Some("methacrylate"), "MMA"),
            (Some("polyurethane"), "PU Sealant"),
        ];
        for (chemistry, name) in samples {
            let first = table.reclassify(chemistry, name).map(str::to_string);
            let after = first.as_deref().or(chemistry);
            assert_eq!(table.reclassify(after, name), None, "{name} not stable");
        }
    }

    #[test]
    fn earlier_rule_wins() {
        let table = RuleTable::default();
        // Matches both families by name; precedence gives it to the first.
        assert_eq!(
            table.reclassify(Some("rubber"), "Acrylic Rubber Tape"),
            Some("acrylic_incl_psa")
        );
        // Already in the first family: the second never takes it.
        assert_eq!(table.reclassify(Some("acrylic_incl_psa"), "Rubber Seal"), None);
    }

    #[test]
    fn families_are_disjoint_on_samples() {
        let table = RuleTable::default();
        let (acrylic, rubber) = (&table.reclassification[0], &table.reclassification[1]);
        for (chemistry, name) in [
            (Some("acrylic"), "OS2"),
            (Some("pressure_sensitive_adhesive"), "T215"),
            (None, "Pressure Sensitive Tape"),
            (Some("neoprene"), "C-R560"),
            (None, "Rubber Cement"),
            (Some("rubber"), "R190"),
        ] {
            assert!(
                !(acrylic.matches(chemistry, name) && rubber.matches(chemistry, name)),
                "{name} matched both families"
            );
        }
    }

    #[test]
    fn validate_reports_overlaps() {
        let mut table = RuleTable::default();
        table.reclassification[1].legacy_labels.push("acrylic".into());
        table.reclassification[1].name_contains.push("PSA Tape".into());
        let overlaps = table.validate().unwrap();
        assert_eq!(overlaps.len(), 2);
        assert!(overlaps.iter().any(|o| matches!(o, RuleOverlap::Label { label, .. } if label == "acrylic")));
        assert!(overlaps[1].to_string().contains("'PSA Tape' contains 'PSA'"));
    }

    #[test]
    fn validate_rejects_empty_substring() {
        let mut table = RuleTable::default();
        table.reclassification[0].name_contains.push(String::new());
        assert!(table.validate().is_err());
    }

    #[test]
    fn validate_rejects_target_relabelled_by_earlier_rule() {
        let table = RuleTable {
            membership: Vec::new(),
            reclassification: vec![
                ReclassificationRule {
                    target: "x".into(),
                    legacy_labels: vec!["y".into()],
                    name_contains: Vec::new(),
                },
                ReclassificationRule {
                    target: "y".into(),
                    legacy_labels: vec!["z".into()],
                    name_contains: Vec::new(),
                },
            ],
        };
        let err = table.validate().unwrap_err();
        assert!(matches!(err, ProdcatError::Validation { .. }));
        assert!(err.to_string().contains("'y'"));

        // The reverse order is stable: the later rule never reclaims `x`.
        let mut reversed = table.clone();
        reversed.reclassification.reverse();
        assert!(reversed.validate().unwrap().is_empty());
    }

    #[test]
    fn parse_from_toml() {
        let table = RuleTable::from_toml_str(
            r#"
[[membership]]
name = "construction"
column = "Industry"
equals = ["Construction"]

[[reclassification]]
target = "epoxy_family"
legacy_labels = ["epoxy", "two_part_epoxy"]
name_contains = ["Epoxy"]
"#,
        )
        .expect("parse rules");
        assert_eq!(table.membership[0].column, "Industry");
        assert_eq!(table.reclassify(Some("two_part_epoxy"), "X"), Some("epoxy_family"));
    }

    #[test]
    fn default_table_serializes() {
        let toml_str = toml::to_string_pretty(&RuleTable::default()).expect("serialize");
        let parsed = RuleTable::from_toml_str(&toml_str).expect("reparse");
        assert_eq!(parsed, RuleTable::default());
    }
}

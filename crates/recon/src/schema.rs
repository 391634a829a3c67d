//! Schema reconciliation: partition raw column names into canonical columns.
//!
//! Keyword rules claim columns first, in priority order. Whatever is left is
//! clustered greedily by the similarity oracle: each unclaimed column seeds a
//! group and is compared only against later unclaimed columns. The result is
//! order-dependent; discovery order is first-seen across tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ColumnGroup, ColumnGroups, GroupOrigin, RawTable};
use crate::similarity::{SimilarityOracle, COLUMN_CONTEXT};

/// A canonical column name and the header spellings that denote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub canonical: String,
    pub variants: Vec<String>,
}

impl KeywordRule {
    /// Equal to, or contains, any variant after whitespace/case folding.
    pub fn matches(&self, column: &str) -> bool {
        let column = fold_label(column);
        if column.is_empty() {
            return false;
        }
        self.variants.iter().any(|variant| {
            let variant = fold_label(variant);
            !variant.is_empty() && (column == variant || column.contains(&variant))
        })
    }
}

/// Header comparison form: whitespace removed, lower-cased.
pub fn fold_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Distinct column names in first-seen order with their table frequency.
#[derive(Debug, Clone, Default)]
pub struct ColumnCensus {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl ColumnCensus {
    pub fn from_columns<'c>(columns: impl IntoIterator<Item = &'c [String]>) -> Self {
        let mut census = Self::default();
        for table in columns {
            for name in table {
                let count = census.counts.entry(name.clone()).or_insert(0);
                if *count == 0 {
                    census.order.push(name.clone());
                }
                *count += 1;
            }
        }
        census
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn frequency(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    fn position(&self, name: &str) -> usize {
        self.order
            .iter()
            .position(|n| n == name)
            .unwrap_or(usize::MAX)
    }
}

pub struct SchemaReconciler<'a> {
    rules: &'a [KeywordRule],
    oracle: &'a dyn SimilarityOracle,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(rules: &'a [KeywordRule], oracle: &'a dyn SimilarityOracle) -> Self {
        Self { rules, oracle }
    }

    pub fn reconcile(&self, tables: &[RawTable]) -> ColumnGroups {
        self.reconcile_columns(tables.iter().map(|t| t.columns.as_slice()))
    }

    pub fn reconcile_columns<'c>(
        &self,
        columns: impl IntoIterator<Item = &'c [String]>,
    ) -> ColumnGroups {
        let census = ColumnCensus::from_columns(columns);
        let names = census.names();
        let mut claimed = vec![false; names.len()];
        let mut groups = Vec::new();

        // Keyword pass
        for rule in self.rules {
            let mut members = Vec::new();
            for (i, name) in names.iter().enumerate() {
                if !claimed[i] && rule.matches(name) {
                    claimed[i] = true;
                    members.push(name.clone());
                }
            }
            if members.is_empty() {
                continue;
            }
            if members.len() > 1 {
                log::info!("column '{}' <- {:?}", rule.canonical, members);
            }
            groups.push(ColumnGroup {
                canonical: rule.canonical.clone(),
                members,
                origin: GroupOrigin::Keyword,
            });
        }

        // Similarity pass, seed-only comparison
        for i in 0..names.len() {
            if claimed[i] {
                continue;
            }
            claimed[i] = true;
            let seed = &names[i];
            let mut members = vec![seed.clone()];
            for j in (i + 1)..names.len() {
                if claimed[j] {
                    continue;
                }
                let answer = self.oracle.similar(seed, &names[j], COLUMN_CONTEXT);
                if answer.verdict {
                    log::debug!(
                        "column '{}' ~ '{}' (score {})",
                        seed,
                        names[j],
                        answer.score
                    );
                    claimed[j] = true;
                    members.push(names[j].clone());
                }
            }
            let canonical = self.pick_canonical(&members, &census);
            if members.len() > 1 {
                log::info!("column '{}' <- {:?}", canonical, members);
            }
            groups.push(ColumnGroup {
                canonical,
                members,
                origin: GroupOrigin::Similarity,
            });
        }

        let groups = disambiguate_canonicals(groups);
        ColumnGroups::new(groups)
    }

    fn pick_canonical(&self, members: &[String], census: &ColumnCensus) -> String {
        if members.len() > 2 {
            let candidates: Vec<&str> = members.iter().map(String::as_str).collect();
            if let Some(choice) = self.oracle.pick_canonical(&candidates, COLUMN_CONTEXT) {
                if members.contains(&choice) {
                    return choice;
                }
            }
        }
        most_frequent(members, census)
    }
}

/// Highest frequency wins; ties go to the earliest-seen name.
fn most_frequent(members: &[String], census: &ColumnCensus) -> String {
    let mut best = &members[0];
    for member in &members[1..] {
        let (f, bf) = (census.frequency(member), census.frequency(best));
        if f > bf || (f == bf && census.position(member) < census.position(best)) {
            best = member;
        }
    }
    best.clone()
}

/// A similarity group whose representative equals an earlier group's canonical
/// name would fold two columns into one on output. Suffix it instead.
fn disambiguate_canonicals(mut groups: Vec<ColumnGroup>) -> Vec<ColumnGroup> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for group in &mut groups {
        let n = seen.entry(group.canonical.clone()).or_insert(0);
        if *n > 0 {
            let renamed = format!("{}_{}", group.canonical, *n + 1);
            log::warn!(
                "canonical column '{}' already taken, using '{}'",
                group.canonical,
                renamed
            );
            group.canonical = renamed;
        }
        *n += 1;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupTables;
    use crate::similarity::{EditDistanceScorer, Similarity};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fold_label_strips_space_and_case() {
        assert_eq!(fold_label(" E - Mail "), "e-mail");
        assert_eq!(fold_label("연 락 처"), "연락처");
    }

    #[test]
    fn keyword_rules_merge_variants() {
        let tables = LookupTables::builtin();
        let scorer = EditDistanceScorer::default();
        let reconciler = SchemaReconciler::new(tables.column_rules(), &scorer);
        let a = cols(&["이름", "학교", "전공"]);
        let b = cols(&["성명", "대학교", "전공분야"]);
        let groups = reconciler.reconcile_columns([a.as_slice(), b.as_slice()]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups.canonical_for("성명"), Some("이름"));
        assert_eq!(groups.canonical_for("대학교"), Some("학교"));
        assert_eq!(groups.canonical_for("전공분야"), Some("전공"));
    }

    #[test]
    fn domain_rule_claims_before_generic() {
        let tables = LookupTables::builtin();
        let scorer = EditDistanceScorer::default();
        let reconciler = SchemaReconciler::new(tables.column_rules(), &scorer);
        let a = cols(&["발령학교", "소속학교"]);
        let groups = reconciler.reconcile_columns([a.as_slice()]);
        assert_eq!(groups.canonical_for("발령학교"), Some("발령분회"));
        assert_eq!(groups.canonical_for("소속학교"), Some("학교"));
    }

    #[test]
    fn similarity_groups_use_most_frequent_member() {
        let scorer = EditDistanceScorer::new(60);
        let reconciler = SchemaReconciler::new(&[], &scorer);
        let a = cols(&["비고란"]);
        let b = cols(&["비고", "기타"]);
        let c = cols(&["비고"]);
        let groups =
            reconciler.reconcile_columns([a.as_slice(), b.as_slice(), c.as_slice()]);
        let group = groups.get("비고").unwrap();
        assert_eq!(group.members, vec!["비고란".to_string(), "비고".to_string()]);
        assert_eq!(group.origin, GroupOrigin::Similarity);
        assert_eq!(groups.canonical_for("기타"), Some("기타"));
    }

    #[test]
    fn frequency_ties_go_to_first_seen() {
        let scorer = EditDistanceScorer::new(50);
        let reconciler = SchemaReconciler::new(&[], &scorer);
        let a = cols(&["메모1", "메모2"]);
        let groups = reconciler.reconcile_columns([a.as_slice()]);
        assert_eq!(groups.canonical_for("메모2"), Some("메모1"));
    }

    struct Picky;

    impl SimilarityOracle for Picky {
        fn similar(&self, a: &str, _b: &str, _context: &str) -> Similarity {
            Similarity { score: 99, verdict: true, suggested: a.into() }
        }

        fn pick_canonical(&self, candidates: &[&str], _context: &str) -> Option<String> {
            candidates.last().map(|c| c.to_string())
        }
    }

    #[test]
    fn oracle_ranks_groups_larger_than_two() {
        let reconciler = SchemaReconciler::new(&[], &Picky);
        let three = cols(&["a", "b", "c"]);
        let groups = reconciler.reconcile_columns([three.as_slice()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.groups()[0].canonical, "c");

        let two = cols(&["a", "b"]);
        let groups = reconciler.reconcile_columns([two.as_slice()]);
        assert_eq!(groups.groups()[0].canonical, "a");
    }

    #[test]
    fn colliding_canonical_is_suffixed() {
        let rules = vec![KeywordRule {
            canonical: "메모".into(),
            variants: vec!["비고".into()],
        }];
        let scorer = EditDistanceScorer::default();
        let reconciler = SchemaReconciler::new(&rules, &scorer);
        let a = cols(&["비고", "메모"]);
        let groups = reconciler.reconcile_columns([a.as_slice()]);
        assert_eq!(groups.canonical_for("비고"), Some("메모"));
        assert_eq!(groups.canonical_for("메모"), Some("메모_2"));
    }
}

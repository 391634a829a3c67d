//! Value normalization and record deduplication.

use std::collections::HashSet;

use crate::model::CanonicalRecord;

/// How a value is folded before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// School and university names: level-of-education affixes are dropped.
    Institution,
    Generic,
}

impl ValueType {
    /// Key columns whose name mentions a school or union unit compare as
    /// institutions.
    pub fn for_column(column: &str) -> Self {
        if INSTITUTION_COLUMN_TOKENS.iter().any(|t| column.contains(t)) {
            Self::Institution
        } else {
            Self::Generic
        }
    }
}

const INSTITUTION_COLUMN_TOKENS: &[&str] = &["학교", "분회"];

/// Stripped in this order; longer forms come before their prefixes.
const INSTITUTION_AFFIXES: &[&str] = &[
    "大學校", "大学校", "大学", "대학교", "대학", "고등학교", "고교", "중학교", "중학",
];

pub fn normalize(value: &str, kind: ValueType) -> String {
    let value = value.trim();
    match kind {
        ValueType::Generic => value.to_lowercase(),
        ValueType::Institution => {
            let mut folded: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            for affix in INSTITUTION_AFFIXES {
                folded = folded.replace(affix, "");
            }
            folded.to_lowercase()
        }
    }
}

/// Composite comparison key for one record.
pub type DedupKey = Vec<String>;

pub fn dedup_key(record: &CanonicalRecord, key_columns: &[String]) -> DedupKey {
    key_columns
        .iter()
        .map(|column| normalize(record.get(column), ValueType::for_column(column)))
        .collect()
}

/// Keep the first record per distinct key, preserving order. No keys, no-op.
pub fn deduplicate(records: Vec<CanonicalRecord>, key_columns: &[String]) -> Vec<CanonicalRecord> {
    if key_columns.is_empty() {
        return records;
    }
    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(records.len());
    let before = records.len();
    let kept: Vec<CanonicalRecord> = records
        .into_iter()
        .filter(|record| seen.insert(dedup_key(record, key_columns)))
        .collect();
    if kept.len() < before {
        log::info!(
            "dedup on {:?}: removed {} duplicate row(s)",
            key_columns,
            before - kept.len()
        );
    }
    kept
}

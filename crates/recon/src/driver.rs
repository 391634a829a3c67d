//! Unification driver: reconcile schema, map rows, concatenate, dedup.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::extract::{FieldExtractor, RowLayout};
use crate::lookup::LookupTables;
use crate::model::{
    CanonicalRecord, CanonicalTable, ColumnGroups, KftaField, KftaRecord, RawTable,
};
use crate::normalize::deduplicate;
use crate::report::{RunReport, TableSummary};
use crate::schema::SchemaReconciler;
use crate::similarity::{Memoized, SimilarityOracle, VERIFY_CONFIDENCE_FLOOR};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// The fixed twelve KFTA columns.
    #[default]
    Kfta,
    /// Canonical column names in first-seen order.
    Generic,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kfta => write!(f, "kfta"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputLayout {
    #[default]
    Auto,
    /// Columns are addressed by header name.
    Named,
    /// Columns are addressed by position; see [`RowLayout`].
    Positional,
}

impl std::fmt::Display for InputLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Named => write!(f, "named"),
            Self::Positional => write!(f, "positional"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifyOptions {
    pub format: OutputFormat,
    pub layout: InputLayout,
    pub row_layout: RowLayout,
    /// Dedup key columns, by canonical (or KFTA) name. Empty disables dedup.
    pub key_columns: Vec<String>,
    pub confidence_floor: u8,
}

impl Default for UnifyOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Kfta,
            layout: InputLayout::Auto,
            row_layout: RowLayout::default(),
            key_columns: Vec::new(),
            confidence_floor: VERIFY_CONFIDENCE_FLOOR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnifyResult {
    pub table: CanonicalTable,
    pub groups: ColumnGroups,
    pub report: RunReport,
}

/// Run one unification over already-loaded tables.
///
/// Never fails: an empty input yields an empty table. The oracle is wrapped in
/// a memo that lives for this call only.
pub fn unify(
    tables: &LookupTables,
    options: &UnifyOptions,
    oracle: &dyn SimilarityOracle,
    inputs: &[RawTable],
) -> UnifyResult {
    let oracle = Memoized::new(oracle);
    let mut report = RunReport {
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        lookup_version: tables.version().to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
        format: options.format,
        ..RunReport::default()
    };

    if inputs.is_empty() {
        log::warn!("no input tables, producing an empty result");
    }

    let groups = SchemaReconciler::new(tables.column_rules(), &oracle).reconcile(inputs);
    report.merged_groups = groups.merged().cloned().collect();

    let extractor = FieldExtractor::new(tables)
        .with_layout(options.row_layout.clone())
        .with_oracle(&oracle, options.confidence_floor);

    let (columns, records) = match options.format {
        OutputFormat::Generic => {
            let columns = generic_columns(&groups, inputs);
            let mut records = Vec::new();
            for table in inputs {
                let before = records.len();
                records.extend(named_generic_rows(table, &groups, &columns));
                report.rows_in += table.rows.len();
                report.tables.push(TableSummary {
                    label: table.label(),
                    layout: InputLayout::Named,
                    rows: records.len() - before,
                });
            }
            (columns, records)
        }
        OutputFormat::Kfta => {
            let mut records = Vec::new();
            for table in inputs {
                let layout = resolve_layout(options.layout, tables, &groups, table, &options.row_layout);
                let before = records.len();
                match layout {
                    InputLayout::Positional => {
                        for row in table.rows_with_header() {
                            report.rows_in += 1;
                            if !extractor.is_valid_row(row) {
                                report.rows_rejected += 1;
                                log::debug!("{}: rejected row {:?}", table.label(), row);
                                continue;
                            }
                            records.push(extractor.extract_row(row));
                        }
                    }
                    _ => {
                        report.rows_in += table.rows.len();
                        records.extend(named_kfta_rows(table, tables, &groups, &extractor));
                    }
                }
                log::info!(
                    "{}: {} row(s) converted ({})",
                    table.label(),
                    records.len() - before,
                    layout
                );
                report.tables.push(TableSummary {
                    label: table.label(),
                    layout,
                    rows: records.len() - before,
                });
            }
            report.unresolved_authorities = records.iter().filter(|r| unresolved(r)).count();
            let columns: Vec<String> = KftaField::ALL.iter().map(|f| f.label().to_string()).collect();
            let records: Vec<CanonicalRecord> =
                records.into_iter().map(KftaRecord::into_canonical).collect();
            (columns, records)
        }
    };
    report.rows_emitted = records.len();

    let (keys, dropped) = resolve_keys(options, tables, &groups, &columns);
    for key in &dropped {
        log::warn!("key column '{}' matches no output column, ignored", key);
    }
    let records = deduplicate(records, &keys);
    report.rows_after_dedup = records.len();
    report.key_columns = keys;
    report.dropped_keys = dropped;
    report.oracle_fallbacks = oracle.fallback_count();

    log::info!(
        "unified {} table(s): {} row(s) out ({} before dedup)",
        inputs.len(),
        report.rows_after_dedup,
        report.rows_emitted
    );

    UnifyResult {
        table: CanonicalTable { columns, records },
        groups,
        report,
    }
}

/// Group canonical names ordered by where their first member was seen.
pub fn generic_columns(groups: &ColumnGroups, inputs: &[RawTable]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for table in inputs {
        for raw in &table.columns {
            if let Some(canonical) = groups.canonical_for(raw) {
                if seen.insert(canonical.to_string()) {
                    columns.push(canonical.to_string());
                }
            }
        }
    }
    columns
}

fn named_generic_rows<'t>(
    table: &'t RawTable,
    groups: &'t ColumnGroups,
    columns: &'t [String],
) -> impl Iterator<Item = CanonicalRecord> + 't {
    table.rows.iter().map(move |row| {
        let mut record: CanonicalRecord = columns.iter().map(|c| (c.as_str(), "")).collect();
        let mut filled = HashSet::new();
        for (idx, raw) in table.columns.iter().enumerate() {
            let Some(canonical) = groups.canonical_for(raw) else {
                continue;
            };
            // A table with two columns in one group keeps the first.
            if filled.insert(canonical) {
                record.set(canonical, crate::model::cell_at(row, idx));
            }
        }
        record
    })
}

fn named_kfta_rows(
    table: &RawTable,
    tables: &LookupTables,
    groups: &ColumnGroups,
    extractor: &FieldExtractor<'_>,
) -> Vec<KftaRecord> {
    let fields: Vec<Option<KftaField>> = table
        .columns
        .iter()
        .map(|raw| groups.canonical_for(raw).and_then(|c| tables.kfta_field_for(c)))
        .collect();

    table
        .rows
        .iter()
        .map(|row| {
            let mut record = KftaRecord::default();
            for (idx, field) in fields.iter().enumerate() {
                if let Some(field) = field {
                    record.fill(*field, crate::model::cell_at(row, idx));
                }
            }
            let title = tables.normalize_position(record.get(KftaField::Title));
            record.set(KftaField::Title, title);
            extractor.finalize(&mut record);
            record
        })
        .collect()
}

/// Decide how one table is read. `Auto` picks positional for KFTA-style sheets:
/// no recognizable name column, or a name column at the layout's name position
/// on a table wide enough to hold the current unit.
pub fn resolve_layout(
    requested: InputLayout,
    tables: &LookupTables,
    groups: &ColumnGroups,
    table: &RawTable,
    layout: &RowLayout,
) -> InputLayout {
    if requested != InputLayout::Auto {
        return requested;
    }
    let name_columns: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, raw)| {
            groups
                .canonical_for(raw)
                .and_then(|c| tables.kfta_field_for(c))
                == Some(KftaField::PersonName)
        })
        .map(|(idx, _)| idx)
        .collect();

    if name_columns.is_empty()
        || (name_columns.contains(&layout.name) && table.columns.len() > layout.current_unit)
    {
        InputLayout::Positional
    } else {
        InputLayout::Named
    }
}

/// Map requested key names onto output columns: raw names go through the
/// column groups, then (for KFTA output) through the alias table.
fn resolve_keys(
    options: &UnifyOptions,
    tables: &LookupTables,
    groups: &ColumnGroups,
    columns: &[String],
) -> (Vec<String>, Vec<String>) {
    let mut keys = Vec::new();
    let mut dropped = Vec::new();
    for key in &options.key_columns {
        let canonical = groups.canonical_for(key).unwrap_or(key.as_str());
        let mapped = match options.format {
            OutputFormat::Kfta => tables
                .kfta_field_for(canonical)
                .map(|f| f.label().to_string())
                .unwrap_or_else(|| canonical.to_string()),
            OutputFormat::Generic => canonical.to_string(),
        };
        if columns.contains(&mapped) {
            if !keys.contains(&mapped) {
                keys.push(mapped);
            }
        } else {
            dropped.push(key.clone());
        }
    }
    (keys, dropped)
}

fn unresolved(record: &KftaRecord) -> bool {
    [
        (KftaField::NewUnit, KftaField::NewAuthority),
        (KftaField::CurrentUnit, KftaField::CurrentAuthority),
    ]
    .iter()
    .any(|(unit, authority)| !record.is_empty(*unit) && record.is_empty(*authority))
}

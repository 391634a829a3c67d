//! Run report: what went in, what came out, and what had to degrade.

use serde::Serialize;

use crate::driver::{InputLayout, OutputFormat};
use crate::model::ColumnGroup;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub label: String,
    /// Layout the table was actually read with (never `Auto`).
    pub layout: InputLayout,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub engine_version: String,
    pub lookup_version: String,
    pub run_at: String,
    pub format: OutputFormat,
    pub tables: Vec<TableSummary>,
    /// Rows examined. Positional tables count their header line too.
    pub rows_in: usize,
    /// Rows refused by the row validity gate.
    pub rows_rejected: usize,
    pub rows_emitted: usize,
    pub rows_after_dedup: usize,
    /// Key columns actually used for dedup.
    pub key_columns: Vec<String>,
    /// Requested key columns that matched no output column.
    pub dropped_keys: Vec<String>,
    /// Groups that merged more than one raw column name.
    pub merged_groups: Vec<ColumnGroup>,
    pub oracle_fallbacks: usize,
    /// Output rows with a unit but no authority.
    pub unresolved_authorities: usize,
}

impl RunReport {
    pub fn duplicates_removed(&self) -> usize {
        self.rows_emitted.saturating_sub(self.rows_after_dedup)
    }

    /// Plain-text report for operators.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        out.push("=".repeat(60));
        out.push("sheetmerge run report".to_string());
        out.push("=".repeat(60));
        out.push(format!("run at:          {}", self.run_at));
        out.push(format!(
            "engine/lookup:   {} / {}",
            self.engine_version, self.lookup_version
        ));
        out.push(format!("output format:   {}", self.format));
        out.push(String::new());

        out.push(format!("tables: {}", self.tables.len()));
        for table in &self.tables {
            out.push(format!(
                "  {} ({}, {} rows)",
                table.label, table.layout, table.rows
            ));
        }
        out.push(String::new());

        out.push(format!("rows examined:   {}", self.rows_in));
        out.push(format!("rows rejected:   {}", self.rows_rejected));
        out.push(format!("rows emitted:    {}", self.rows_emitted));
        if self.key_columns.is_empty() {
            out.push("dedup:           off".to_string());
        } else {
            out.push(format!(
                "dedup on {:?}: {} removed, {} kept",
                self.key_columns,
                self.duplicates_removed(),
                self.rows_after_dedup
            ));
        }
        if !self.dropped_keys.is_empty() {
            out.push(format!("unknown key columns ignored: {:?}", self.dropped_keys));
        }

        if !self.merged_groups.is_empty() {
            out.push(String::new());
            out.push("column mapping:".to_string());
            for group in &self.merged_groups {
                out.push(format!("  * {}", group.canonical));
                for member in group.members.iter().filter(|m| **m != group.canonical) {
                    out.push(format!("    - {member}"));
                }
            }
        }

        if self.oracle_fallbacks > 0 || self.unresolved_authorities > 0 {
            out.push(String::new());
            out.push("degraded:".to_string());
            if self.oracle_fallbacks > 0 {
                out.push(format!(
                    "  semantic oracle fell back to edit distance {} time(s)",
                    self.oracle_fallbacks
                ));
            }
            if self.unresolved_authorities > 0 {
                out.push(format!(
                    "  {} row(s) with a unit but no authority",
                    self.unresolved_authorities
                ));
            }
        }
        out.join("\n")
    }
}

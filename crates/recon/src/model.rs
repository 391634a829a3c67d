use std::collections::HashMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One loaded sheet or delimited file. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// File the table came from (display only).
    pub source: String,
    /// Sheet name for workbook inputs.
    pub sheet: Option<String>,
    pub columns: Vec<String>,
    /// Header line cells as read, before blank cells were given names.
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            source: source.into(),
            sheet: None,
            header: columns.clone(),
            columns,
            rows,
        }
    }

    pub fn with_header(mut self, header: Vec<String>) -> Self {
        self.header = header;
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Human label: `file` or `file [sheet]`.
    pub fn label(&self) -> String {
        match &self.sheet {
            Some(sheet) => format!("{} [{}]", self.source, sheet),
            None => self.source.clone(),
        }
    }

    /// Cell text at (row, col), trimmed. Absent positions read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    /// The raw header line followed by the data rows, for layouts where the
    /// header line carries no meaning of its own.
    pub fn rows_with_header(&self) -> impl Iterator<Item = &[String]> {
        std::iter::once(self.header.as_slice()).chain(self.rows.iter().map(|r| r.as_slice()))
    }
}

/// Positional cell access for one row. Missing positions read as empty.
pub fn cell_at(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|v| v.trim()).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Column groups
// ---------------------------------------------------------------------------

/// How a group came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrigin {
    Keyword,
    Similarity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnGroup {
    pub canonical: String,
    /// Raw column names, in discovery order.
    pub members: Vec<String>,
    pub origin: GroupOrigin,
}

/// Partition of every raw column name into canonical groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnGroups {
    groups: Vec<ColumnGroup>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ColumnGroups {
    /// Build from groups. A raw name listed in two groups stays with the first.
    pub fn new(groups: Vec<ColumnGroup>) -> Self {
        let mut index = HashMap::new();
        let mut kept = Vec::with_capacity(groups.len());
        for mut group in groups {
            group.members.retain(|m| !index.contains_key(m));
            if group.members.is_empty() {
                continue;
            }
            let slot = kept.len();
            for member in &group.members {
                index.insert(member.clone(), slot);
            }
            kept.push(group);
        }
        Self { groups: kept, index }
    }

    pub fn groups(&self) -> &[ColumnGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Canonical name for a raw column, if it was seen.
    pub fn canonical_for(&self, raw: &str) -> Option<&str> {
        self.index.get(raw).map(|&i| self.groups[i].canonical.as_str())
    }

    pub fn get(&self, canonical: &str) -> Option<&ColumnGroup> {
        self.groups.iter().find(|g| g.canonical == canonical)
    }

    /// Groups that merged more than one raw name.
    pub fn merged(&self) -> impl Iterator<Item = &ColumnGroup> {
        self.groups.iter().filter(|g| g.members.len() > 1)
    }
}

// ---------------------------------------------------------------------------
// KFTA record
// ---------------------------------------------------------------------------

/// The twelve fields of the fixed KFTA output format, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KftaField {
    CurrentAuthority,
    CurrentUnit,
    PersonName,
    NewAuthority,
    NewUnit,
    Subject,
    Title,
    RoleClass,
    CategoryLabel,
    HandlingCode,
    LocalityClass,
    UnitCode,
}

impl KftaField {
    pub const ALL: [KftaField; 12] = [
        Self::CurrentAuthority,
        Self::CurrentUnit,
        Self::PersonName,
        Self::NewAuthority,
        Self::NewUnit,
        Self::Subject,
        Self::Title,
        Self::RoleClass,
        Self::CategoryLabel,
        Self::HandlingCode,
        Self::LocalityClass,
        Self::UnitCode,
    ];

    /// Passthrough fields with no default cell position; checked for
    /// misplaced school names after Subject.
    pub const AUXILIARY: [KftaField; 5] = [
        Self::RoleClass,
        Self::CategoryLabel,
        Self::HandlingCode,
        Self::LocalityClass,
        Self::UnitCode,
    ];

    /// Column header used in output files.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CurrentAuthority => "현재교육청",
            Self::CurrentUnit => "현재분회",
            Self::PersonName => "이름",
            Self::NewAuthority => "발령교육청",
            Self::NewUnit => "발령분회",
            Self::Subject => "과목",
            Self::Title => "직위",
            Self::RoleClass => "직종분류",
            Self::CategoryLabel => "분류명",
            Self::HandlingCode => "취급코드",
            Self::LocalityClass => "시군구분",
            Self::UnitCode => "교호기호등",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.label() == label)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for KftaField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A fixed-shape KFTA record. Every field is present; missing is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KftaRecord {
    values: [String; 12],
}

impl KftaRecord {
    pub fn get(&self, field: KftaField) -> &str {
        &self.values[field.slot()]
    }

    pub fn set(&mut self, field: KftaField, value: impl Into<String>) {
        self.values[field.slot()] = value.into();
    }

    pub fn is_empty(&self, field: KftaField) -> bool {
        self.values[field.slot()].is_empty()
    }

    /// Set only if the field is still empty and the value is not.
    pub fn fill(&mut self, field: KftaField, value: &str) {
        if self.is_empty(field) && !value.is_empty() {
            self.set(field, value);
        }
    }

    pub fn clear(&mut self, field: KftaField) {
        self.values[field.slot()].clear();
    }

    pub fn into_canonical(self) -> CanonicalRecord {
        let mut record = CanonicalRecord::default();
        for (field, value) in KftaField::ALL.iter().zip(self.values) {
            record.set(field.label(), value);
        }
        record
    }
}

/// Resolved (authority, school) pair for one unit reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchoolResolution {
    pub authority: String,
    pub school: String,
}

impl SchoolResolution {
    pub fn new(authority: impl Into<String>, school: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            school: school.into(),
        }
    }

    pub fn unresolved(school: impl Into<String>) -> Self {
        Self::new(String::new(), school)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One output row keyed by column name. Absent columns read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: HashMap<String, String>,
}

impl CanonicalRecord {
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CanonicalRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = CanonicalRecord::default();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

/// The unified output: ordered columns plus records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalTable {
    pub columns: Vec<String>,
    pub records: Vec<CanonicalRecord>,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows as ordered cell vectors, following `columns`.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.records
            .iter()
            .map(|r| self.columns.iter().map(|c| r.get(c)).collect())
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Vec<&str> {
        self.records.iter().map(|r| r.get(column)).collect()
    }
}

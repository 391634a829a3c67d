//! Field extraction for positional personnel-order sheets.
//!
//! Each row is mapped to a fixed twelve-field [`KftaRecord`]. Primary fields
//! come from fixed cell positions; a post-processing pass then moves school
//! names out of fields where they do not belong, backfills authorities from
//! their units and evicts authority names from non-authority fields. Nothing
//! here fails: unresolvable values are passed through or left empty.

pub mod region;
pub mod remarks;
pub mod school;
pub mod strategy;

use serde::{Deserialize, Serialize};

use crate::lookup::LookupTables;
use crate::model::{cell_at, KftaField, KftaRecord, SchoolResolution};
use crate::similarity::{SimilarityOracle, VERIFY_CONFIDENCE_FLOOR};

use school::{expand_abbreviation, is_school_like};
use strategy::UnitContext;

/// Zero-based cell positions of a personnel-order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowLayout {
    pub name: usize,
    /// Checked for a second header line.
    pub header_probe: usize,
    pub title: usize,
    pub new_unit: usize,
    pub current_unit: usize,
    pub subject: usize,
    pub remarks: usize,
    pub role_class: Option<usize>,
    pub category_label: Option<usize>,
    pub handling_code: Option<usize>,
    pub locality_class: Option<usize>,
    pub unit_code: Option<usize>,
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            name: 2,
            header_probe: 3,
            title: 4,
            new_unit: 5,
            current_unit: 7,
            subject: 8,
            remarks: 9,
            role_class: None,
            category_label: None,
            handling_code: None,
            locality_class: None,
            unit_code: None,
        }
    }
}

impl RowLayout {
    /// Configured cell position of an auxiliary field.
    fn auxiliary_position(&self, field: KftaField) -> Option<usize> {
        match field {
            KftaField::RoleClass => self.role_class,
            KftaField::CategoryLabel => self.category_label,
            KftaField::HandlingCode => self.handling_code,
            KftaField::LocalityClass => self.locality_class,
            KftaField::UnitCode => self.unit_code,
            _ => None,
        }
    }
}

/// Markers of a second header line in the probe cell; all must be present.
const SECOND_HEADER_MARKERS: &[&str] = &["비고", "전소속"];

/// Fields that must never hold an authority name.
const NON_AUTHORITY_FIELDS: [KftaField; 10] = [
    KftaField::PersonName,
    KftaField::NewUnit,
    KftaField::CurrentUnit,
    KftaField::Subject,
    KftaField::Title,
    KftaField::RoleClass,
    KftaField::CategoryLabel,
    KftaField::HandlingCode,
    KftaField::LocalityClass,
    KftaField::UnitCode,
];

/// Unit field paired with the authority field it feeds.
const UNIT_PAIRS: [(KftaField, KftaField); 2] = [
    (KftaField::NewUnit, KftaField::NewAuthority),
    (KftaField::CurrentUnit, KftaField::CurrentAuthority),
];

pub struct FieldExtractor<'a> {
    tables: &'a LookupTables,
    layout: RowLayout,
    oracle: Option<&'a dyn SimilarityOracle>,
    confidence_floor: u8,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(tables: &'a LookupTables) -> Self {
        Self {
            tables,
            layout: RowLayout::default(),
            oracle: None,
            confidence_floor: VERIFY_CONFIDENCE_FLOOR,
        }
    }

    pub fn with_layout(mut self, layout: RowLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Consult `oracle` for secondary-school verification.
    pub fn with_oracle(mut self, oracle: &'a dyn SimilarityOracle, confidence_floor: u8) -> Self {
        self.oracle = Some(oracle);
        self.confidence_floor = confidence_floor;
        self
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Row validity gate: a non-header name, and no second header line.
    pub fn is_valid_row(&self, row: &[String]) -> bool {
        let name = cell_at(row, self.layout.name);
        if name.is_empty() || self.tables.is_header_keyword(name) {
            return false;
        }
        let probe = cell_at(row, self.layout.header_probe);
        !SECOND_HEADER_MARKERS.iter().all(|m| probe.contains(m))
    }

    /// Resolve one unit reference; also returns the strategy that answered.
    pub fn resolve_unit(&self, text: &str) -> (&'static str, SchoolResolution) {
        let ctx = UnitContext::new(self.tables, text).with_oracle(self.oracle, self.confidence_floor);
        strategy::resolve(&ctx)
    }

    /// Map one row to a record, including post-processing.
    pub fn extract_row(&self, row: &[String]) -> KftaRecord {
        let layout = &self.layout;
        let cell = move |idx: usize| cell_at(row, idx);
        let mut record = KftaRecord::default();

        record.set(KftaField::PersonName, cell(layout.name));
        record.set(
            KftaField::Title,
            self.tables.normalize_position(cell(layout.title)),
        );

        let new_unit = cell(layout.new_unit);
        if !new_unit.is_empty() {
            let (_, r) = self.resolve_unit(new_unit);
            record.set(KftaField::NewAuthority, r.authority);
            record.set(KftaField::NewUnit, r.school);
        }

        let current = self.current_unit(
            record.get(KftaField::Title),
            cell(layout.current_unit),
            cell(layout.remarks),
        );
        record.set(KftaField::CurrentAuthority, current.authority);
        record.set(KftaField::CurrentUnit, current.school);

        record.set(KftaField::Subject, cell(layout.subject));
        for field in KftaField::AUXILIARY {
            if let Some(idx) = layout.auxiliary_position(field) {
                record.set(field, cell(idx));
            }
        }

        self.finalize(&mut record);
        record
    }

    fn current_unit(&self, title: &str, unit: &str, remarks: &str) -> SchoolResolution {
        let new_kindergarten_head =
            title.contains("유치원") && (title.contains("원감") || title.contains("신규"));
        if new_kindergarten_head && !remarks.is_empty() {
            let r = remarks::parse_remarks(self.tables, remarks);
            log::debug!("remarks '{}' -> ({}, {})", remarks, r.authority, r.school);
            return r;
        }

        if self.tables.is_region_only(unit) {
            let region_authority = self
                .tables
                .region_in_text(unit)
                .and_then(|region| self.tables.authority_for_region(region))
                .unwrap_or_default();
            if remarks.is_empty() {
                return SchoolResolution::new(region_authority, "");
            }
            let school = expand_abbreviation(self.tables, remarks);
            let authority = self
                .tables
                .campus_authority(&school)
                .unwrap_or(region_authority);
            return SchoolResolution::new(authority, school);
        }

        if unit.is_empty() {
            return SchoolResolution::default();
        }
        self.resolve_unit(unit).1
    }

    /// Rescue, backfill and cleanup. Safe to run on any record.
    pub fn finalize(&self, record: &mut KftaRecord) {
        self.rescue_misplaced_units(record);
        self.backfill_authorities(record);
        self.evict_stray_authorities(record);
    }

    /// Subject first, then the auxiliary fields in output order.
    fn rescue_misplaced_units(&self, record: &mut KftaRecord) {
        for field in std::iter::once(KftaField::Subject).chain(KftaField::AUXILIARY) {
            let value = record.get(field).to_string();
            if value.is_empty() || !is_school_like(&value) {
                continue;
            }
            let Some(&(unit, authority)) = UNIT_PAIRS.iter().find(|(unit, _)| record.is_empty(*unit))
            else {
                log::debug!("school-like '{}' left in {}: both units filled", value, field);
                continue;
            };
            let (_, r) = self.resolve_unit(&value);
            log::debug!("moved '{}' from {} to {} as '{}'", value, field, unit, r.school);
            record.set(unit, r.school);
            record.fill(authority, &r.authority);
            record.clear(field);
        }
    }

    fn backfill_authorities(&self, record: &mut KftaRecord) {
        for (unit, authority) in UNIT_PAIRS {
            if record.is_empty(unit) || !record.is_empty(authority) {
                continue;
            }
            let school = record.get(unit).to_string();
            let found = self.tables.campus_authority(&school).or_else(|| {
                self.tables
                    .region_in_text(&school)
                    .and_then(|region| self.tables.authority_for_region(region))
            });
            match found {
                Some(found) => record.set(authority, found),
                None => log::debug!("no authority for {} '{}'", unit, school),
            }
        }
    }

    fn evict_stray_authorities(&self, record: &mut KftaRecord) {
        let office = self.tables.province_office();
        for field in NON_AUTHORITY_FIELDS {
            let value = record.get(field).to_string();
            if value.is_empty() || !self.tables.has_authority_token(&value) {
                continue;
            }
            // The provincial office is itself a valid unit.
            if matches!(field, KftaField::NewUnit | KftaField::CurrentUnit) && value == office {
                continue;
            }
            if record.is_empty(KftaField::NewAuthority) {
                record.set(KftaField::NewAuthority, value.as_str());
            } else if record.is_empty(KftaField::CurrentAuthority) {
                record.set(KftaField::CurrentAuthority, value.as_str());
            } else {
                log::debug!("dropped authority '{}' from {}", value, field);
            }
            record.clear(field);
        }
    }
}

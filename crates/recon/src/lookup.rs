//! Static reference data: regions, authorities, abbreviations, collisions.
//!
//! Loaded once from TOML (the embedded default or a deployment override) and
//! passed by reference into the reconciler and extractor. Nothing here is
//! mutated after construction.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::UnifyError;
use crate::model::KftaField;
use crate::schema::KeywordRule;

const BUILTIN_GANGWON: &str = include_str!("../data/gangwon.toml");

// ---------------------------------------------------------------------------
// File shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LookupFile {
    version: String,
    #[serde(default)]
    province_office: String,
    #[serde(default)]
    province_office_authority: String,
    regions: Vec<(String, String)>,
    #[serde(default)]
    other_regions: Vec<String>,
    #[serde(default)]
    campus_keywords: Vec<(String, String)>,
    #[serde(default)]
    school_authorities: Vec<(String, String)>,
    abbreviations: Vec<(String, String)>,
    #[serde(default)]
    kindergarten_exceptions: Vec<String>,
    #[serde(default)]
    region_schools: Vec<(String, String, String)>,
    #[serde(default)]
    positions: Vec<(String, String)>,
    #[serde(default)]
    role_keywords: Vec<String>,
    #[serde(default)]
    header_keywords: Vec<String>,
    #[serde(default)]
    authority_tokens: Vec<String>,
    #[serde(default)]
    kfta_aliases: Vec<(String, String)>,
    #[serde(default)]
    column_rules: Vec<KeywordRule>,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LookupTables {
    version: String,
    province_office: String,
    province_office_authority: String,
    /// Scan order matters for free-text region search.
    regions: Vec<(String, String)>,
    region_index: HashMap<String, String>,
    other_regions: Vec<String>,
    /// Longest keyword first.
    campus_keywords: Vec<(String, String)>,
    school_authorities: HashMap<String, String>,
    /// Longest suffix first, duplicates already resolved.
    abbreviations: Vec<(String, String)>,
    kindergarten_exceptions: Vec<String>,
    /// region -> expanded name -> canonical name
    region_schools: HashMap<String, HashMap<String, String>>,
    /// expanded name -> authority -> canonical name
    authority_schools: HashMap<String, HashMap<String, String>>,
    positions: HashMap<String, String>,
    role_keywords: Vec<String>,
    header_keywords: Vec<String>,
    authority_tokens: Vec<String>,
    kfta_aliases: HashMap<String, KftaField>,
    column_rules: Vec<KeywordRule>,
}

impl LookupTables {
    /// The Gangwon reference data compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_toml(BUILTIN_GANGWON).expect("embedded lookup tables are valid")
    }

    pub fn from_toml(input: &str) -> Result<Self, UnifyError> {
        let file: LookupFile =
            toml::from_str(input).map_err(|e| UnifyError::LookupParse(e.to_string()))?;
        Self::build(file)
    }

    fn build(file: LookupFile) -> Result<Self, UnifyError> {
        if file.regions.is_empty() {
            return Err(UnifyError::LookupValidation("regions table is empty".into()));
        }
        if file.abbreviations.is_empty() {
            return Err(UnifyError::LookupValidation(
                "abbreviations table is empty".into(),
            ));
        }
        for rule in &file.column_rules {
            if rule.canonical.trim().is_empty() || rule.variants.is_empty() {
                return Err(UnifyError::LookupValidation(format!(
                    "column rule '{}' needs a canonical name and at least one variant",
                    rule.canonical
                )));
            }
        }

        let region_index: HashMap<String, String> = file.regions.iter().cloned().collect();

        let mut campus_keywords = file.campus_keywords;
        campus_keywords.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let abbreviations = resolve_abbreviations(file.abbreviations);

        let mut region_schools: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut authority_schools: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (region, name, canonical) in file.region_schools {
            let authority = region_index.get(&region).ok_or_else(|| {
                UnifyError::LookupValidation(format!(
                    "region_schools: unknown region '{region}' for '{name}'"
                ))
            })?;
            authority_schools
                .entry(name.clone())
                .or_default()
                .insert(authority.clone(), canonical.clone());
            region_schools
                .entry(region)
                .or_default()
                .insert(name, canonical);
        }

        let mut kfta_aliases = HashMap::new();
        for (alias, label) in file.kfta_aliases {
            let field = KftaField::from_label(&label).ok_or_else(|| {
                UnifyError::LookupValidation(format!(
                    "kfta_aliases: '{alias}' points at unknown field '{label}'"
                ))
            })?;
            kfta_aliases.insert(alias, field);
        }

        Ok(Self {
            version: file.version,
            province_office: file.province_office,
            province_office_authority: file.province_office_authority,
            regions: file.regions,
            region_index,
            other_regions: file.other_regions,
            campus_keywords,
            school_authorities: file.school_authorities.into_iter().collect(),
            abbreviations,
            kindergarten_exceptions: file.kindergarten_exceptions,
            region_schools,
            authority_schools,
            positions: file.positions.into_iter().collect(),
            role_keywords: file.role_keywords,
            header_keywords: file.header_keywords,
            authority_tokens: file.authority_tokens,
            kfta_aliases,
            column_rules: file.column_rules,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    // -- regions ----------------------------------------------------------

    /// (region, authority) pairs in scan order.
    pub fn regions(&self) -> &[(String, String)] {
        &self.regions
    }

    pub fn authority_for_region(&self, region: &str) -> Option<&str> {
        self.region_index.get(region).map(String::as_str)
    }

    pub fn is_other_region(&self, token: &str) -> bool {
        self.other_regions.iter().any(|r| r == token)
    }

    /// First region (in scan order) that occurs anywhere in `text`.
    pub fn region_in_text(&self, text: &str) -> Option<&str> {
        self.regions
            .iter()
            .find(|(region, _)| text.contains(region.as_str()))
            .map(|(region, _)| region.as_str())
    }

    /// True when `text` is a bare region, or ends in one (e.g. "강원 춘천").
    pub fn is_region_only(&self, text: &str) -> bool {
        let text = text.trim();
        !text.is_empty()
            && self
                .regions
                .iter()
                .any(|(region, _)| text == region || text.ends_with(region.as_str()))
    }

    // -- authorities ------------------------------------------------------

    /// Authority inferred from an embedded campus keyword, longest first.
    pub fn campus_authority(&self, school: &str) -> Option<&str> {
        self.campus_keywords
            .iter()
            .find(|(keyword, _)| school.contains(keyword.as_str()))
            .map(|(_, authority)| authority.as_str())
    }

    /// Authority for a school known by its exact name.
    pub fn school_authority(&self, school: &str) -> Option<&str> {
        self.school_authorities.get(school).map(String::as_str)
    }

    pub fn has_authority_token(&self, text: &str) -> bool {
        self.authority_tokens.iter().any(|t| text.contains(t.as_str()))
    }

    pub fn province_office(&self) -> &str {
        &self.province_office
    }

    pub fn province_office_authority(&self) -> &str {
        &self.province_office_authority
    }

    // -- schools ----------------------------------------------------------

    pub fn abbreviations(&self) -> &[(String, String)] {
        &self.abbreviations
    }

    pub fn is_kindergarten_exception(&self, text: &str) -> bool {
        self.kindergarten_exceptions.iter().any(|k| k == text)
    }

    pub fn region_school(&self, region: &str, school: &str) -> Option<&str> {
        self.region_schools
            .get(region)
            .and_then(|m| m.get(school))
            .map(String::as_str)
    }

    pub fn authority_school(&self, school: &str, authority: &str) -> Option<&str> {
        self.authority_schools
            .get(school)
            .and_then(|m| m.get(authority))
            .map(String::as_str)
    }

    // -- titles and headers -----------------------------------------------

    /// Normalized title, or the trimmed input when it has no mapping.
    pub fn normalize_position(&self, title: &str) -> String {
        let title = title.trim();
        self.positions
            .get(title)
            .cloned()
            .unwrap_or_else(|| title.to_string())
    }

    pub fn role_keywords(&self) -> &[String] {
        &self.role_keywords
    }

    pub fn is_header_keyword(&self, text: &str) -> bool {
        self.header_keywords.iter().any(|k| k == text)
    }

    // -- columns ----------------------------------------------------------

    pub fn column_rules(&self) -> &[KeywordRule] {
        &self.column_rules
    }

    /// KFTA field a canonical column name feeds in fixed-format output.
    pub fn kfta_field_for(&self, canonical: &str) -> Option<KftaField> {
        self.kfta_aliases
            .get(canonical)
            .copied()
            .or_else(|| KftaField::from_label(canonical))
    }
}

/// Keep the last definition of each suffix, then order longest first.
/// The sort is stable so equal-length suffixes keep their file order.
fn resolve_abbreviations(entries: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut resolved: Vec<(String, String)> = Vec::with_capacity(entries.len());
    for (suffix, expansion) in entries {
        if let Some(existing) = resolved.iter_mut().find(|(s, _)| *s == suffix) {
            if existing.1 != expansion {
                log::debug!(
                    "abbreviation '{}' redefined: '{}' replaces '{}'",
                    suffix,
                    expansion,
                    existing.1
                );
            }
            existing.1 = expansion;
        } else {
            resolved.push((suffix, expansion));
        }
    }
    resolved.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    resolved
}

//! Unit resolution strategies, tried in order until one answers.

use crate::lookup::LookupTables;
use crate::model::SchoolResolution;
use crate::similarity::SimilarityOracle;

use super::region::{disambiguate, parse_region_prefix};
use super::school::{clean_school_name, expand_abbreviation, is_secondary};

/// Everything a strategy may look at for one unit reference.
pub struct UnitContext<'a> {
    pub tables: &'a LookupTables,
    pub oracle: Option<&'a dyn SimilarityOracle>,
    pub confidence_floor: u8,
    /// Cell text with trailing descriptors removed.
    pub text: String,
    /// `text` after abbreviation expansion.
    pub expanded: String,
}

impl<'a> UnitContext<'a> {
    pub fn new(tables: &'a LookupTables, text: &str) -> Self {
        let text = clean_school_name(tables, text);
        let expanded = expand_abbreviation(tables, &text);
        Self {
            tables,
            oracle: None,
            confidence_floor: crate::similarity::VERIFY_CONFIDENCE_FLOOR,
            text,
            expanded,
        }
    }

    pub fn with_oracle(mut self, oracle: Option<&'a dyn SimilarityOracle>, floor: u8) -> Self {
        self.oracle = oracle;
        self.confidence_floor = floor;
        self
    }
}

pub type Strategy = fn(&UnitContext<'_>) -> Option<SchoolResolution>;

/// Priority order. The last entry always answers.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("verified", verified),
    ("region_prefix", region_prefix),
    ("known_school", known_school),
    ("campus_keyword", campus_keyword),
    ("embedded_region", embedded_region),
    ("pass_through", pass_through),
];

/// Run the strategies; returns the name of the one that answered.
pub fn resolve(ctx: &UnitContext<'_>) -> (&'static str, SchoolResolution) {
    if ctx.text.is_empty() {
        return ("empty", SchoolResolution::default());
    }
    for &(name, strategy) in STRATEGIES {
        if let Some(resolution) = strategy(ctx) {
            log::debug!(
                "unit '{}' -> ({}, {}) via {}",
                ctx.text,
                resolution.authority,
                resolution.school,
                name
            );
            return (name, resolution);
        }
    }
    ("pass_through", SchoolResolution::unresolved(ctx.expanded.clone()))
}

/// Oracle verification for secondary schools, above the confidence floor.
pub fn verified(ctx: &UnitContext<'_>) -> Option<SchoolResolution> {
    let oracle = ctx.oracle?;
    if !is_secondary(&ctx.text) {
        return None;
    }
    let answer = oracle.verify_and_expand(&ctx.text, ctx.tables.regions())?;
    if answer.confidence < ctx.confidence_floor || answer.full_name.trim().is_empty() {
        log::debug!(
            "verification of '{}' discarded (confidence {} < {})",
            ctx.text,
            answer.confidence,
            ctx.confidence_floor
        );
        return None;
    }
    Some(SchoolResolution::new(answer.authority, answer.full_name.trim()))
}

/// "REGION NAME" with the region split off, then disambiguated.
pub fn region_prefix(ctx: &UnitContext<'_>) -> Option<SchoolResolution> {
    parse_region_prefix(ctx.tables, &ctx.text)
}

/// Exact full-name entry.
pub fn known_school(ctx: &UnitContext<'_>) -> Option<SchoolResolution> {
    let authority = ctx.tables.school_authority(&ctx.expanded)?;
    Some(SchoolResolution::new(authority, ctx.expanded.clone()))
}

/// Secondary schools with a campus keyword somewhere in the name.
pub fn campus_keyword(ctx: &UnitContext<'_>) -> Option<SchoolResolution> {
    if !is_secondary(&ctx.text) {
        return None;
    }
    let authority = ctx.tables.campus_authority(&ctx.expanded)?;
    Some(SchoolResolution::new(authority, ctx.expanded.clone()))
}

/// Elementary schools and kindergartens with a region inside the name.
pub fn embedded_region(ctx: &UnitContext<'_>) -> Option<SchoolResolution> {
    if is_secondary(&ctx.text) {
        return None;
    }
    let region = ctx.tables.region_in_text(&ctx.text)?;
    let authority = ctx.tables.authority_for_region(region)?;
    let school = disambiguate(ctx.tables, None, authority, &ctx.expanded, &ctx.text);
    Some(SchoolResolution::new(authority, school))
}

pub fn pass_through(ctx: &UnitContext<'_>) -> Option<SchoolResolution> {
    log::debug!("no authority for unit '{}', passing through", ctx.text);
    Some(SchoolResolution::unresolved(ctx.expanded.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::{Similarity, Verification};

    fn run(text: &str) -> (&'static str, SchoolResolution) {
        let tables = LookupTables::builtin();
        let ctx = UnitContext::new(&tables, text);
        resolve(&ctx)
    }

    #[test]
    fn region_prefix_wins_for_spaced_text() {
        let (name, r) = run("원주 중앙초");
        assert_eq!(name, "region_prefix");
        assert_eq!(r.school, "원주중앙초등학교");
        assert_eq!(r.authority, "강원특별자치도원주교육지원청");
    }

    #[test]
    fn known_school_table() {
        let (name, r) = run("동광산과고");
        assert_eq!(name, "known_school");
        assert_eq!(
            r,
            SchoolResolution::new("강원특별자치도원주교육지원청", "동광산업과학고등학교")
        );
        let (_, r) = run("동산중학교");
        assert_eq!(r.authority, "강원특별자치도춘천교육지원청");
    }

    #[test]
    fn campus_keyword_for_secondary() {
        let (name, r) = run("강릉제일고");
        assert_eq!(name, "campus_keyword");
        assert_eq!(r.school, "강릉제일고등학교");
        assert_eq!(r.authority, "강원특별자치도강릉교육지원청");

        let (name, r) = run("춘천중학교");
        assert_eq!(name, "campus_keyword");
        assert_eq!(r, SchoolResolution::new("강원특별자치도춘천교육지원청", "춘천중학교"));
    }

    #[test]
    fn embedded_region_for_elementary() {
        let (name, r) = run("춘천교대부설초등학교");
        assert_eq!(name, "embedded_region");
        assert_eq!(r.authority, "강원특별자치도춘천교육지원청");
        assert_eq!(r.school, "춘천교대부설초등학교");
    }

    #[test]
    fn unknown_unit_passes_through() {
        let (name, r) = run("남산초");
        assert_eq!(name, "pass_through");
        assert_eq!(r, SchoolResolution::unresolved("남산초등학교"));
        assert_eq!(run("").1, SchoolResolution::default());
    }

    struct Verifier(u8);

    impl SimilarityOracle for Verifier {
        fn similar(&self, a: &str, _b: &str, _context: &str) -> Similarity {
            Similarity::failed(a)
        }

        fn verify_and_expand(&self, _name: &str, _regions: &[(String, String)]) -> Option<Verification> {
            Some(Verification {
                full_name: "홍천여자중학교".into(),
                region: "홍천".into(),
                authority: "강원특별자치도홍천교육지원청".into(),
                confidence: self.0,
                explanation: String::new(),
            })
        }
    }

    #[test]
    fn verification_respects_confidence_floor() {
        let tables = LookupTables::builtin();

        let sure = Verifier(80);
        let ctx = UnitContext::new(&tables, "홍천여중").with_oracle(Some(&sure), 50);
        let (name, r) = resolve(&ctx);
        assert_eq!(name, "verified");
        assert_eq!(r.school, "홍천여자중학교");

        let unsure = Verifier(30);
        let ctx = UnitContext::new(&tables, "홍천여중").with_oracle(Some(&unsure), 50);
        let (name, r) = resolve(&ctx);
        assert_eq!(name, "campus_keyword");
        assert_eq!(r.authority, "강원특별자치도홍천교육지원청");
    }

    #[test]
    fn verification_skips_elementary() {
        let tables = LookupTables::builtin();
        let sure = Verifier(99);
        let ctx = UnitContext::new(&tables, "원주 중앙초").with_oracle(Some(&sure), 50);
        assert_eq!(resolve(&ctx).0, "region_prefix");
    }
}

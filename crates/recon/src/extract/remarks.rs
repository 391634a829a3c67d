//! Free-text remarks of the form "REGION SCHOOL ROLE".
//!
//! Newly appointed kindergarten vice-principals carry their previous post in
//! the remarks cell rather than the current-unit cell.

use crate::lookup::LookupTables;
use crate::model::SchoolResolution;

use super::region::lookup_with_region;
use super::school::expand_abbreviation;

pub fn parse_remarks(tables: &LookupTables, text: &str) -> SchoolResolution {
    let text = text.trim();
    if text.is_empty() {
        return SchoolResolution::default();
    }

    let office = tables.province_office();
    if !office.is_empty() && text.starts_with(office) {
        return SchoolResolution::new(tables.province_office_authority(), office);
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() >= 2 && tables.authority_for_region(tokens[0]).is_some() {
        let rest = tokens[1..].join(" ");
        let school = strip_role(tables, &rest);
        return lookup_with_region(tables, tokens[0], school);
    }

    SchoolResolution::unresolved(expand_abbreviation(tables, strip_role(tables, text)))
}

/// Drop one trailing role keyword ("교사", "원감", ...).
fn strip_role<'t>(tables: &LookupTables, text: &'t str) -> &'t str {
    for keyword in tables.role_keywords() {
        if let Some(head) = text.strip_suffix(keyword.as_str()) {
            return head.trim();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_school_role() {
        let tables = LookupTables::builtin();
        let r = parse_remarks(&tables, "인제 월학초유 교사");
        assert_eq!(
            r,
            SchoolResolution::new("강원특별자치도인제교육지원청", "월학초등학교")
        );
    }

    #[test]
    fn collision_resolved_through_region() {
        let tables = LookupTables::builtin();
        let r = parse_remarks(&tables, "홍천 남산초 교사");
        assert_eq!(r.school, "홍천남산초등학교");
    }

    #[test]
    fn provincial_office() {
        let tables = LookupTables::builtin();
        let r = parse_remarks(&tables, "강원특별자치도교육청 유아교육과");
        assert_eq!(
            r,
            SchoolResolution::new("강원특별자치도춘천교육지원청", "강원특별자치도교육청")
        );
    }

    #[test]
    fn bare_school_has_no_authority() {
        let tables = LookupTables::builtin();
        assert_eq!(
            parse_remarks(&tables, "월학초유 교사"),
            SchoolResolution::unresolved("월학초등학교")
        );
        assert_eq!(parse_remarks(&tables, "  "), SchoolResolution::default());
    }
}

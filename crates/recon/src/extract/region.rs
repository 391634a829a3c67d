//! Region-prefix parsing and same-name school disambiguation.

use crate::lookup::LookupTables;
use crate::model::SchoolResolution;

use super::school::expand_abbreviation;

/// Longest remainder, in characters, that may be split off a region without a
/// separating space.
const MAX_UNSPACED_REMAINDER: usize = 10;

/// Abbreviated elementary markers that license an unspaced split.
const UNSPACED_MARKERS: &[&str] = &["초유", "초"];

/// A region token found at the start of a unit reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPrefix<'t> {
    pub region: &'t str,
    pub remainder: &'t str,
    /// False for regions outside the province; those carry no authority.
    pub in_province: bool,
}

/// Find a region prefix that may be stripped from `text`.
///
/// With a space after the region the split is unconditional. Without one it
/// is only taken when the remainder is short and ends in an abbreviated
/// elementary marker with a proper-name stem, so "춘천중학교" stays whole.
pub fn split_region_prefix<'t>(tables: &LookupTables, text: &'t str) -> Option<RegionPrefix<'t>> {
    let text = text.trim();

    for (region, _) in tables.regions() {
        let Some(rest) = text.strip_prefix(region.as_str()) else {
            continue;
        };
        if rest.starts_with(char::is_whitespace) {
            let remainder = rest.trim();
            if !remainder.is_empty() {
                return Some(RegionPrefix {
                    region: &text[..region.len()],
                    remainder,
                    in_province: true,
                });
            }
        } else if unspaced_split_allowed(rest) {
            return Some(RegionPrefix {
                region: &text[..region.len()],
                remainder: rest,
                in_province: true,
            });
        }
    }

    let (head, rest) = text.split_once(char::is_whitespace)?;
    let remainder = rest.trim();
    if tables.is_other_region(head) && !remainder.is_empty() {
        return Some(RegionPrefix {
            region: head,
            remainder,
            in_province: false,
        });
    }
    None
}

fn unspaced_split_allowed(rest: &str) -> bool {
    if rest.is_empty() || rest.chars().count() > MAX_UNSPACED_REMAINDER {
        return false;
    }
    if rest.chars().any(char::is_whitespace) {
        return false;
    }
    UNSPACED_MARKERS.iter().any(|marker| {
        rest.strip_suffix(marker)
            .is_some_and(|stem| !stem.is_empty())
    })
}

/// Parse "REGION NAME" text into (authority, canonical name). `None` when
/// no region can be split off or the region has no authority entry.
pub fn parse_region_prefix(tables: &LookupTables, text: &str) -> Option<SchoolResolution> {
    let prefix = split_region_prefix(tables, text)?;
    if !prefix.in_province {
        log::debug!(
            "'{}' is outside the province, no authority",
            text.trim()
        );
        return Some(SchoolResolution::unresolved(expand_abbreviation(
            tables,
            prefix.remainder,
        )));
    }
    tables.authority_for_region(prefix.region)?;
    Some(lookup_with_region(tables, prefix.region, prefix.remainder))
}

/// Canonical name for a school that several authorities share a name for.
/// Region-indexed first, then authority-indexed; `expanded` when unknown.
pub fn disambiguate(
    tables: &LookupTables,
    region: Option<&str>,
    authority: &str,
    expanded: &str,
    original: &str,
) -> String {
    if let Some(region) = region {
        if let Some(name) = tables
            .region_school(region, expanded)
            .or_else(|| tables.region_school(region, original))
        {
            return name.to_string();
        }
    }
    if !authority.is_empty() {
        if let Some(name) = tables
            .authority_school(expanded, authority)
            .or_else(|| tables.authority_school(original, authority))
        {
            return name.to_string();
        }
    }
    expanded.to_string()
}

/// Resolve a school known to sit in `region`.
pub fn lookup_with_region(tables: &LookupTables, region: &str, school: &str) -> SchoolResolution {
    let school = school.trim();
    let authority = tables.authority_for_region(region).unwrap_or_default();
    let expanded = expand_abbreviation(tables, school);
    let name = disambiguate(tables, Some(region), authority, &expanded, school);
    SchoolResolution::new(authority, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNCHEON: &str = "강원특별자치도춘천교육지원청";

    #[test]
    fn spaced_region_is_split() {
        let tables = LookupTables::builtin();
        let r = parse_region_prefix(&tables, "춘천 남산초").unwrap();
        assert_eq!(r, SchoolResolution::new(CHUNCHEON, "춘천남산초등학교"));
        assert!(r.authority.ends_with("춘천교육지원청"));

        let r = parse_region_prefix(&tables, "인제 기린유치원").unwrap();
        assert_eq!(r.school, "기린유치원");
    }

    #[test]
    fn school_named_after_region_is_kept() {
        let tables = LookupTables::builtin();
        for name in ["춘천중학교", "춘천고등학교", "춘천교대부설초등학교", "춘천기계공업고등학교"] {
            assert_eq!(parse_region_prefix(&tables, name), None, "{name}");
        }
    }

    #[test]
    fn unspaced_split_needs_marker_and_stem() {
        let tables = LookupTables::builtin();
        let split = split_region_prefix(&tables, "원주중앙초").unwrap();
        assert_eq!((split.region, split.remainder), ("원주", "중앙초"));
        assert!(split_region_prefix(&tables, "속초초").is_none());
        assert!(split_region_prefix(&tables, "속초유").is_none());
        assert!(split_region_prefix(&tables, "춘천여고").is_none());
        assert!(split_region_prefix(&tables, "춘천").is_none());
    }

    #[test]
    fn other_province_region_has_no_authority() {
        let tables = LookupTables::builtin();
        assert_eq!(
            parse_region_prefix(&tables, "서울 성원초등학교"),
            Some(SchoolResolution::unresolved("성원초등학교"))
        );
        assert_eq!(
            parse_region_prefix(&tables, "경기 수원초"),
            Some(SchoolResolution::unresolved("수원초등학교"))
        );
    }

    #[test]
    fn disambiguation_by_region_then_authority() {
        let tables = LookupTables::builtin();
        assert_eq!(
            disambiguate(&tables, Some("홍천"), "", "원당초등학교", "원당초"),
            "홍천원당초등학교"
        );
        assert_eq!(
            disambiguate(&tables, None, "강원특별자치도양구교육지원청", "원당초등학교", "원당초"),
            "양구원당초등학교"
        );
        assert_eq!(
            disambiguate(&tables, Some("인제"), "", "원당초등학교", "원당초"),
            "원당초등학교"
        );
    }

    #[test]
    fn lookup_with_region_expands_then_disambiguates() {
        let tables = LookupTables::builtin();
        let r = lookup_with_region(&tables, "춘천", "중앙초");
        assert_eq!(r, SchoolResolution::new(CHUNCHEON, "춘천중앙초등학교"));
        let r = lookup_with_region(&tables, "인제", "월학초유");
        assert_eq!(r.school, "월학초등학교");
    }
}

//! School-name shape tests and abbreviation expansion.

use std::sync::OnceLock;

use regex::Regex;

use crate::lookup::LookupTables;

/// Substrings that mark a school name outright.
const SCHOOL_MARKERS: &[&str] = &[
    "초등학교", "중학교", "고등학교", "유치원", "초교", "중교", "고교", "여중", "여고", "남중",
    "남고", "공고", "상고", "농고", "정산고", "산과고",
];

const ATTACHED_KINDERGARTEN_MARKERS: &[&str] = &["병설유치원", "병설유"];

const LEVEL_CHARS: &[char] = &['초', '중', '고', '유'];

/// `NAME(초)` style level notation.
fn level_notation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)\((초|중|고|유)\)$").expect("static pattern"))
}

fn level_word(marker: &str) -> &'static str {
    match marker {
        "초" => "초등학교",
        "중" => "중학교",
        "고" => "고등학교",
        _ => "유치원",
    }
}

/// Middle or high school reference, abbreviated or not.
pub fn is_secondary(text: &str) -> bool {
    text.contains("중학") || text.contains("고등") || text.ends_with('중') || text.ends_with('고')
}

pub fn is_school_like(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if SCHOOL_MARKERS.iter().any(|m| text.contains(m)) {
        return true;
    }
    if text.chars().count() > 1 && text.ends_with(LEVEL_CHARS) {
        return true;
    }
    if text.contains("병설유") || text.contains("초유") {
        return true;
    }
    level_notation().is_match(text)
}

/// Drop a trailing duty descriptor ("동광산과고 전문상담") when the head is a
/// school name on its own. Region-led text is left alone.
pub fn clean_school_name(tables: &LookupTables, text: &str) -> String {
    let text = text.trim();
    let Some((head, tail)) = text.split_once(char::is_whitespace) else {
        return text.to_string();
    };
    let tail = tail.trim();
    if tables.authority_for_region(head).is_some() || tables.is_other_region(head) {
        return text.to_string();
    }
    if is_school_like(head) && !is_school_like(tail) {
        log::debug!("dropped descriptor '{}' from '{}'", tail, text);
        return head.to_string();
    }
    text.to_string()
}

/// Expand an abbreviated school name to its official form. Unknown shapes pass
/// through trimmed.
pub fn expand_abbreviation(tables: &LookupTables, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some(caps) = level_notation().captures(text) {
        return format!("{}{}", &caps[1], level_word(&caps[2]));
    }

    // "신림초/교사"
    let name = text.split('/').next().unwrap_or(text).trim();

    for marker in ATTACHED_KINDERGARTEN_MARKERS {
        if name.contains(marker) {
            let stem = name.replace(marker, "");
            let stem = stem.trim();
            return if stem.ends_with('초') {
                format!("{stem}등학교")
            } else {
                stem.to_string()
            };
        }
    }

    if tables.is_kindergarten_exception(name) {
        let stem = name.strip_suffix('유').unwrap_or(name);
        return format!("{stem}유치원");
    }
    if let Some(stem) = name.strip_suffix("초유") {
        return format!("{stem}초등학교");
    }

    for (suffix, expansion) in tables.abbreviations() {
        if let Some(base) = name.strip_suffix(suffix.as_str()) {
            return format!("{base}{expansion}");
        }
    }
    name.to_string()
}

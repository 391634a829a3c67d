//! Prompt text and lenient answer parsing.

use serde::Deserialize;
use sheetmerge_recon::{Similarity, Verification};

use crate::client::OracleError;

pub fn similarity(a: &str, b: &str, context: &str) -> String {
    format!(
        r#"You compare labels found in Korean education spreadsheets.
Decide whether the two texts mean the same thing.

Context: {context}
Text 1: "{a}"
Text 2: "{b}"

Treat as the same: synonyms ("이름" / "성명", "학교" / "대학교"), narrower
forms of one concept ("전공" / "전공분야"), translations ("name" / "이름"),
abbreviations ("HP" / "휴대폰", "email" / "이메일") and Hanja spellings
("大學" / "대학").

Answer with JSON only:
{{"similarity": <0-100>, "is_similar": <true when similarity >= 70>, "reason": "<short reason>", "mapping": "<suggested unified label>"}}"#
    )
}

pub fn pick_canonical(candidates: &[&str], context: &str) -> String {
    let quoted: Vec<String> = candidates.iter().map(|c| format!("\"{}\"", c)).collect();
    format!(
        r#"These labels ({context}) all mean the same thing:
{}

Pick the single most standard one. Prefer Korean over English, the full
form over an abbreviation, and the most common wording.
Answer with the chosen label only, exactly as written above."#,
        quoted.join(", ")
    )
}

pub fn verify(name: &str, regions: &[(String, String)]) -> String {
    let region_list: Vec<&str> = regions.iter().map(|(r, _)| r.as_str()).collect();
    format!(
        r#"You know the schools of Gangwon State, Korea.

School reference: "{name}"
Gangwon regions: {}

1. Expand an abbreviated name to the official one
   ("춘천공고" -> "춘천공업고등학교", "원주여고" -> "원주여자고등학교", "삼척중" -> "삼척중학교").
2. Name the Gangwon region the school belongs to, from the list above.
3. Rate your confidence 0-100: existing Gangwon school 90-100, probable
   Gangwon school 70-89, school outside Gangwon 50-69, unclear 0-49.

Answer with JSON only:
{{"full_name": "<official name>", "region": "<region from the list, or empty>", "confidence": <0-100>, "explanation": "<short reason>"}}"#,
        region_list.join(", ")
    )
}

/// Strip an optional markdown code fence around a JSON answer.
pub fn strip_json_block(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

#[derive(Deserialize)]
struct SimilarityAnswer {
    #[serde(default)]
    similarity: f64,
    #[serde(default)]
    is_similar: bool,
    #[serde(default)]
    mapping: String,
}

#[derive(Deserialize)]
struct VerifyAnswer {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    explanation: String,
}

fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

pub fn parse_similarity(text: &str, a: &str) -> Result<Similarity, OracleError> {
    let answer: SimilarityAnswer = serde_json::from_str(strip_json_block(text))
        .map_err(|e| OracleError::Parse(format!("{} in {:?}", e, text)))?;
    let suggested = if answer.mapping.trim().is_empty() {
        a.to_string()
    } else {
        answer.mapping.trim().to_string()
    };
    Ok(Similarity {
        score: clamp_score(answer.similarity),
        verdict: answer.is_similar,
        suggested,
    })
}

/// The chosen label, with surrounding quotes and whitespace removed.
pub fn parse_pick(text: &str) -> String {
    text.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}

/// Parse a verification answer; the region maps to its authority through the
/// caller's table (unknown regions give an empty authority).
pub fn parse_verification(
    text: &str,
    name: &str,
    regions: &[(String, String)],
) -> Result<Verification, OracleError> {
    let answer: VerifyAnswer = serde_json::from_str(strip_json_block(text))
        .map_err(|e| OracleError::Parse(format!("{} in {:?}", e, text)))?;
    let region = answer.region.trim().to_string();
    let authority = regions
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, a)| a.clone())
        .unwrap_or_default();
    let full_name = match answer.full_name.trim() {
        "" => name.to_string(),
        full => full.to_string(),
    };
    Ok(Verification {
        full_name,
        region,
        authority,
        confidence: clamp_score(answer.confidence),
        explanation: answer.explanation,
    })
}

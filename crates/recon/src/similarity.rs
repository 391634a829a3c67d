//! Similarity Oracle: "are these two labels the same concept?"
//!
//! Callers only ever see [`SimilarityOracle`]. The deterministic
//! [`EditDistanceScorer`] is always available; a semantic backend (see the
//! `sheetmerge-oracle` crate) can be layered in front of it with
//! [`OracleChain`], which falls back to the scorer whenever the backend fails.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Default verdict threshold for the edit-distance scorer.
pub const DEFAULT_THRESHOLD: u8 = 85;

/// Confidence floor below which a verification answer is discarded.
pub const VERIFY_CONFIDENCE_FLOOR: u8 = 50;

/// Context label used when comparing column headers.
pub const COLUMN_CONTEXT: &str = "spreadsheet column name";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Similarity {
    /// 0..=100
    pub score: u8,
    pub verdict: bool,
    /// Suggested unified form of the two labels.
    pub suggested: String,
}

impl Similarity {
    /// The failure verdict: never similar, zero score.
    pub fn failed(a: &str) -> Self {
        Self {
            score: 0,
            verdict: false,
            suggested: a.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.score == 0 && !self.verdict
    }
}

/// Result of a school-name verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub full_name: String,
    pub region: String,
    /// Resolved through the region table the caller supplied.
    pub authority: String,
    /// 0..=100
    pub confidence: u8,
    pub explanation: String,
}

pub trait SimilarityOracle: Send + Sync {
    /// Compare two labels under a context label. Never fails: backends that
    /// cannot answer return [`Similarity::failed`].
    fn similar(&self, a: &str, b: &str, context: &str) -> Similarity;

    /// Pick the most standard label among equivalent candidates. `None` when
    /// the backend has no opinion; the caller then uses frequency.
    fn pick_canonical(&self, _candidates: &[&str], _context: &str) -> Option<String> {
        None
    }

    /// Expand an abbreviated school name and locate its region. `None` when
    /// the backend cannot verify names at all.
    fn verify_and_expand(&self, _name: &str, _regions: &[(String, String)]) -> Option<Verification> {
        None
    }

    /// Answers that had to come from a fallback backend so far.
    fn fallback_count(&self) -> usize {
        0
    }
}

// ---------------------------------------------------------------------------
// Deterministic scorer
// ---------------------------------------------------------------------------

/// Indel similarity over characters, 0..=100: `2 * lcs / (len_a + len_b)`.
#[derive(Debug, Clone, Copy)]
pub struct EditDistanceScorer {
    pub threshold: u8,
}

impl Default for EditDistanceScorer {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl EditDistanceScorer {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.min(100),
        }
    }

    pub fn ratio(a: &str, b: &str) -> u8 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let total = a.len() + b.len();
        if total == 0 {
            return 100;
        }
        let matched = longest_common_subsequence(&a, &b);
        ((200 * matched) as f64 / total as f64).round() as u8
    }
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

impl SimilarityOracle for EditDistanceScorer {
    fn similar(&self, a: &str, b: &str, _context: &str) -> Similarity {
        let score = Self::ratio(a, b);
        Similarity {
            score,
            verdict: score >= self.threshold,
            // Longer label is usually the more complete form.
            suggested: if b.chars().count() > a.chars().count() {
                b.to_string()
            } else {
                a.to_string()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Run-scoped memo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    a: String,
    b: String,
    context: String,
}

/// Append-only answer cache for one run. Create one per run and drop it with
/// the run; nothing is shared across runs.
#[derive(Debug, Default)]
pub struct OracleMemo {
    similar: Mutex<HashMap<MemoKey, Similarity>>,
    verify: Mutex<HashMap<String, Verification>>,
}

impl OracleMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn similar_or_insert_with(
        &self,
        a: &str,
        b: &str,
        context: &str,
        compute: impl FnOnce() -> Similarity,
    ) -> Similarity {
        let key = MemoKey {
            a: a.to_string(),
            b: b.to_string(),
            context: context.to_string(),
        };
        if let Some(hit) = lock(&self.similar).get(&key) {
            return hit.clone();
        }
        let value = compute();
        // Failures are not cached so a transient outage does not stick.
        if !value.is_failure() {
            lock(&self.similar).insert(key, value.clone());
        }
        value
    }

    pub fn verify_or_insert_with(
        &self,
        name: &str,
        compute: impl FnOnce() -> Option<Verification>,
    ) -> Option<Verification> {
        if let Some(hit) = lock(&self.verify).get(name) {
            return Some(hit.clone());
        }
        let value = compute()?;
        if value.confidence > 0 {
            lock(&self.verify).insert(name.to_string(), value.clone());
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        lock(&self.similar).len() + lock(&self.verify).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A poisoned memo still holds valid answers.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An oracle with a run-scoped memo in front of it.
pub struct Memoized<'a> {
    inner: &'a dyn SimilarityOracle,
    memo: OracleMemo,
}

impl<'a> Memoized<'a> {
    pub fn new(inner: &'a dyn SimilarityOracle) -> Self {
        Self {
            inner,
            memo: OracleMemo::new(),
        }
    }

    pub fn memo(&self) -> &OracleMemo {
        &self.memo
    }
}

impl SimilarityOracle for Memoized<'_> {
    fn similar(&self, a: &str, b: &str, context: &str) -> Similarity {
        self.memo
            .similar_or_insert_with(a, b, context, || self.inner.similar(a, b, context))
    }

    fn pick_canonical(&self, candidates: &[&str], context: &str) -> Option<String> {
        self.inner.pick_canonical(candidates, context)
    }

    fn verify_and_expand(&self, name: &str, regions: &[(String, String)]) -> Option<Verification> {
        self.memo
            .verify_or_insert_with(name, || self.inner.verify_and_expand(name, regions))
    }

    fn fallback_count(&self) -> usize {
        self.inner.fallback_count()
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Semantic backend in front, deterministic scorer behind it.
pub struct OracleChain {
    semantic: Option<Box<dyn SimilarityOracle>>,
    scorer: EditDistanceScorer,
    fallbacks: std::sync::atomic::AtomicUsize,
}

impl OracleChain {
    pub fn deterministic(threshold: u8) -> Self {
        Self {
            semantic: None,
            scorer: EditDistanceScorer::new(threshold),
            fallbacks: Default::default(),
        }
    }

    pub fn with_semantic(threshold: u8, semantic: Box<dyn SimilarityOracle>) -> Self {
        Self {
            semantic: Some(semantic),
            scorer: EditDistanceScorer::new(threshold),
            fallbacks: Default::default(),
        }
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic.is_some()
    }
}

impl SimilarityOracle for OracleChain {
    fn similar(&self, a: &str, b: &str, context: &str) -> Similarity {
        if let Some(semantic) = &self.semantic {
            let answer = semantic.similar(a, b, context);
            if !answer.is_failure() {
                return answer;
            }
            self.fallbacks
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            log::debug!(
                "semantic oracle gave no answer for '{}' / '{}', using edit distance",
                a,
                b
            );
        }
        self.scorer.similar(a, b, context)
    }

    fn pick_canonical(&self, candidates: &[&str], context: &str) -> Option<String> {
        let semantic = self.semantic.as_ref()?;
        semantic
            .pick_canonical(candidates, context)
            .filter(|choice| candidates.contains(&choice.as_str()))
    }

    fn verify_and_expand(&self, name: &str, regions: &[(String, String)]) -> Option<Verification> {
        self.semantic.as_ref()?.verify_and_expand(name, regions)
    }

    /// Semantic answers replaced by the deterministic scorer.
    fn fallback_count(&self) -> usize {
        self.fallbacks.load(std::sync::atomic::Ordering::Relaxed)
    }
}

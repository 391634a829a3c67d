//! Gemini-backed Similarity Oracle.
//!
//! Blocking reqwest client (no Tokio runtime required). Every failure stays
//! inside this crate: the [`SimilarityOracle`] implementation logs it and
//! answers with the failure verdict so the caller can fall back.
//!
//! [`SimilarityOracle`]: sheetmerge_recon::SimilarityOracle

mod client;
mod oracle;
pub mod prompt;

pub use client::{model_candidates, GeminiClient, GeminiOptions, OracleError, DEFAULT_ENDPOINT, DEFAULT_MODELS};
pub use oracle::GeminiOracle;

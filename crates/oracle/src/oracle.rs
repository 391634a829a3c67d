use sheetmerge_recon::{Similarity, SimilarityOracle, Verification};

use crate::client::{GeminiClient, GeminiOptions, OracleError};
use crate::prompt;

/// Semantic oracle answering through a [`GeminiClient`]. Errors are logged
/// and turned into "no answer" so the caller's fallback takes over.
pub struct GeminiOracle {
    client: GeminiClient,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>, options: &GeminiOptions) -> Result<Self, OracleError> {
        Ok(Self {
            client: GeminiClient::new(api_key, options)?,
        })
    }

    pub fn with_base_url(self, base: impl Into<String>) -> Self {
        Self {
            client: self.client.with_base_url(base),
        }
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }
}

impl SimilarityOracle for GeminiOracle {
    fn similar(&self, a: &str, b: &str, context: &str) -> Similarity {
        let answer = self
            .client
            .generate(&prompt::similarity(a, b, context))
            .and_then(|text| prompt::parse_similarity(&text, a));
        match answer {
            Ok(similarity) => {
                log::debug!(
                    "'{}' vs '{}': {} ({})",
                    a,
                    b,
                    similarity.score,
                    similarity.verdict
                );
                similarity
            }
            Err(e) => {
                log::warn!("similarity of '{}' / '{}' failed: {}", a, b, e);
                Similarity::failed(a)
            }
        }
    }

    fn pick_canonical(&self, candidates: &[&str], context: &str) -> Option<String> {
        if candidates.len() < 2 {
            return candidates.first().map(|c| c.to_string());
        }
        match self.client.generate(&prompt::pick_canonical(candidates, context)) {
            Ok(text) => {
                let choice = prompt::parse_pick(&text);
                if candidates.contains(&choice.as_str()) {
                    Some(choice)
                } else {
                    log::warn!("ranking answer '{}' is not a candidate, ignored", choice);
                    None
                }
            }
            Err(e) => {
                log::warn!("ranking {:?} failed: {}", candidates, e);
                None
            }
        }
    }

    fn verify_and_expand(&self, name: &str, regions: &[(String, String)]) -> Option<Verification> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let answer = self
            .client
            .generate(&prompt::verify(name, regions))
            .and_then(|text| prompt::parse_verification(&text, name, regions));
        match answer {
            Ok(verification) => Some(verification),
            Err(e) => {
                log::warn!("verification of '{}' failed: {}", name, e);
                None
            }
        }
    }
}

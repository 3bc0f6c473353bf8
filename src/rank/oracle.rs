use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Token-list similarity scorer.
///
/// `None` means "unknown" (no embedding for the tokens, service down); the
/// ranker counts it as zero.
pub trait SimilarityOracle {
    fn score(&self, a: &[String], b: &[String]) -> Option<f64>;

    /// Score many pairs at once. Backends with a batch endpoint override this.
    fn score_batch(&self, pairs: &[(Vec<String>, Vec<String>)]) -> Vec<Option<f64>> {
        pairs.iter().map(|(a, b)| self.score(a, b)).collect()
    }
}

impl<T: SimilarityOracle + ?Sized> SimilarityOracle for &T {
    fn score(&self, a: &[String], b: &[String]) -> Option<f64> {
        (**self).score(a, b)
    }

    fn score_batch(&self, pairs: &[(Vec<String>, Vec<String>)]) -> Vec<Option<f64>> {
        (**self).score_batch(pairs)
    }
}

impl<T: SimilarityOracle + ?Sized> SimilarityOracle for Box<T> {
    fn score(&self, a: &[String], b: &[String]) -> Option<f64> {
        (**self).score(a, b)
    }

    fn score_batch(&self, pairs: &[(Vec<String>, Vec<String>)]) -> Vec<Option<f64>> {
        (**self).score_batch(pairs)
    }
}

// ============================================================================
// Lexical oracle (offline)
// ============================================================================

/// Jaccard overlap of the two token sets.
pub struct LexicalOracle;

impl SimilarityOracle for LexicalOracle {
    fn score(&self, a: &[String], b: &[String]) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return None;
        }
        let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
        let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
        let shared = a.intersection(&b).count() as f64;
        let total = a.union(&b).count() as f64;
        Some(shared / total)
    }
}

// ============================================================================
// HTTP oracle
// ============================================================================

/// Remote similarity service: `POST {src_tokens, tgt_tokens}` -> `{score}`.
///
/// Any transport or decoding failure is reported as unknown.
pub struct HttpOracle {
    endpoint: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    src_tokens: &'a [String],
    tgt_tokens: &'a [String],
}

#[derive(Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    score: Option<f64>,
}

impl HttpOracle {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

impl SimilarityOracle for HttpOracle {
    fn score(&self, a: &[String], b: &[String]) -> Option<f64> {
        let request = ScoreRequest {
            src_tokens: a,
            tgt_tokens: b,
        };

        let response = match self.client.post(&self.endpoint).json(&request).send() {
            Ok(r) => r,
            Err(e) => {
                warn!("Similarity oracle unreachable: {}", e);
                return None;
            }
        };

        let parsed: ScoreResponse = match response.json() {
            Ok(p) => p,
            Err(e) => {
                warn!("Similarity oracle returned an unreadable body: {}", e);
                return None;
            }
        };

        parsed.score.map(|s| s.clamp(0.0, 1.0))
    }
}

// ============================================================================
// Memoization
// ============================================================================

/// Caches scores per token-list pair for the lifetime of a session.
pub struct MemoOracle<O> {
    inner: O,
    cache: RefCell<HashMap<(Vec<String>, Vec<String>), Option<f64>>>,
}

impl<O: SimilarityOracle> MemoOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<O: SimilarityOracle> SimilarityOracle for MemoOracle<O> {
    fn score(&self, a: &[String], b: &[String]) -> Option<f64> {
        let key = (a.to_vec(), b.to_vec());
        if let Some(hit) = self.cache.borrow().get(&key) {
            return *hit;
        }
        let score = self.inner.score(a, b);
        self.cache.borrow_mut().insert(key, score);
        score
    }

    fn score_batch(&self, pairs: &[(Vec<String>, Vec<String>)]) -> Vec<Option<f64>> {
        let missing: Vec<(Vec<String>, Vec<String>)> = {
            let cache = self.cache.borrow();
            pairs
                .iter()
                .filter(|pair| !cache.contains_key(*pair))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            let scores = self.inner.score_batch(&missing);
            let mut cache = self.cache.borrow_mut();
            for (pair, score) in missing.into_iter().zip(scores) {
                cache.insert(pair, score);
            }
        }

        let cache = self.cache.borrow();
        pairs
            .iter()
            .map(|pair| cache.get(pair).copied().flatten())
            .collect()
    }
}

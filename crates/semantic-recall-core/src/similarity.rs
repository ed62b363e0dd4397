//! Cosine similarity and top-K ranking over a candidate set.
//!
//! Ranking is a brute-force scan: every candidate is scored, scores below
//! `min_score` are dropped, the rest are stably sorted by descending score and
//! truncated to `k`. Equal scores keep the order the candidates were supplied
//! in. Large candidate sets are scored in parallel with rayon; the indexed
//! collect keeps results in input order, so parallelism never changes the
//! outcome.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::models::{AnalysisRecord, SimilarityResult};

/// Candidate count at which scoring switches to the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2048;

/// Compute cosine similarity between two vectors.
///
/// Does not assume unit length. Returns a value in `[-1.0, 1.0]`, `0.0` when
/// either vector has zero norm, and [`Error::InvalidInput`] when lengths
/// differ.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::invalid(format!(
            "cannot compare vectors of length {} and {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return Ok(0.0);
    }

    Ok((dot / denom).clamp(-1.0, 1.0) as f32)
}

/// Ranking settings.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    pub parallel_threshold: usize,
}

impl Default for Ranker {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl Ranker {
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// Score `candidates` against `query` and return at most `k` of them,
    /// best first, each paired with its score.
    pub fn top_k<T, F>(
        &self,
        query: &[f32],
        candidates: Vec<T>,
        k: usize,
        min_score: f32,
        vector: F,
    ) -> Result<Vec<(T, f32)>>
    where
        T: Send + Sync,
        F: Fn(&T) -> Option<&[f32]> + Sync,
    {
        if k == 0 || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let score = |c: &T| -> Result<f32> {
            let v = vector(c).ok_or_else(|| Error::invalid("candidate has no embedding"))?;
            cosine_similarity(query, v)
        };

        let parallel = candidates.len() >= self.parallel_threshold;
        tracing::debug!(candidates = candidates.len(), k, min_score, parallel, "ranking");

        let scores: Vec<f32> = if parallel {
            candidates.par_iter().map(score).collect::<Result<_>>()?
        } else {
            candidates.iter().map(score).collect::<Result<_>>()?
        };

        let mut ranked: Vec<(T, f32)> = candidates
            .into_iter()
            .zip(scores)
            .filter(|(_, s)| *s >= min_score)
            .collect();

        // `sort_by` is stable: ties stay in input order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// [`top_k`](Self::top_k) over stored records, producing [`SimilarityResult`]s.
    pub fn rank_records(
        &self,
        query: &[f32],
        records: Vec<AnalysisRecord>,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<SimilarityResult>> {
        let ranked = self.top_k(query, records, k, min_score, |r| r.embedding.as_deref())?;
        Ok(ranked
            .into_iter()
            .map(|(record, score)| SimilarityResult { record, score })
            .collect())
    }
}

/// [`Ranker::top_k`] with default settings.
pub fn top_k<T, F>(
    query: &[f32],
    candidates: Vec<T>,
    k: usize,
    min_score: f32,
    vector: F,
) -> Result<Vec<(T, f32)>>
where
    T: Send + Sync,
    F: Fn(&T) -> Option<&[f32]> + Sync,
{
    Ranker::default().top_k(query, candidates, k, min_score, vector)
}

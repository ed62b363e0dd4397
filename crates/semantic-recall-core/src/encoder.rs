//! Text encoder trait plus the two weight-free encoders.
//!
//! - [`DisabledEncoder`]: always reports [`EncoderError::ModelUnavailable`].
//! - [`HashingEncoder`]: signed feature hashing over word tokens, mean
//!   pooled and L2-normalized. Deterministic, offline, needs no model files.
//!
//! Neural backends (fastembed, tract) live in the app crate and implement the
//! same [`TextEncoder`] trait. All encoders must be pure functions of their
//! input: the same text always yields bit-identical vectors.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::embedding::{mean_pool, normalize_l2};
use crate::error::EncoderError;
use crate::models::ActiveModel;

/// A loaded, read-only text encoder.
///
/// Encoding is CPU-bound and synchronous; async callers should run it on a
/// blocking thread. Implementations must tolerate concurrent calls.
pub trait TextEncoder: Send + Sync {
    /// Model identifier stored next to every vector this encoder produces.
    fn model_name(&self) -> &str;
    /// Output dimension `D`.
    fn dims(&self) -> usize;
    /// Maximum number of tokens considered per text; the rest is dropped.
    fn max_tokens(&self) -> usize;
    /// Encode texts in order. Output has one unit-length vector per input.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError>;

    fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        self.encode_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::EncodingFailed("encoder returned no vector".into()))
    }

    fn active_model(&self) -> ActiveModel {
        ActiveModel::new(self.model_name(), self.dims())
    }
}

/// Produces the process-wide encoder on first use.
///
/// Called at most once per successful initialization; the service guards it
/// with a single-flight lock.
#[async_trait]
pub trait EncoderLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn TextEncoder>, EncoderError>;
}

/// Reject empty or whitespace-only texts before any model work.
pub fn check_inputs(texts: &[String]) -> Result<(), EncoderError> {
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(EncoderError::InvalidInput(format!(
            "text at position {} is empty",
            pos
        )));
    }
    Ok(())
}

/// Verify a backend returned one `dims`-long vector per input.
pub fn check_outputs(
    outputs: &[Vec<f32>],
    expected_len: usize,
    dims: usize,
) -> Result<(), EncoderError> {
    if outputs.len() != expected_len {
        return Err(EncoderError::EncodingFailed(format!(
            "expected {} vectors, model returned {}",
            expected_len,
            outputs.len()
        )));
    }
    if let Some(bad) = outputs.iter().find(|v| v.len() != dims) {
        return Err(EncoderError::EncodingFailed(format!(
            "expected {}-dimensional vectors, model returned {}",
            dims,
            bad.len()
        )));
    }
    Ok(())
}

// ============ Disabled ============

/// Encoder used when no model is configured.
pub struct DisabledEncoder;

impl TextEncoder for DisabledEncoder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn max_tokens(&self) -> usize {
        0
    }
    fn encode_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        Err(EncoderError::ModelUnavailable(
            "embedding backend is disabled".into(),
        ))
    }
}

// ============ Feature hashing ============

const HASH_PROJECTIONS: u8 = 4;

/// Weight-free encoder: every word token maps to a sparse signed vector via
/// SHA-256, token vectors are mean pooled, and the result is normalized.
///
/// Texts sharing vocabulary land close together, which is enough for offline
/// deployments and deterministic tests.
pub struct HashingEncoder {
    model_name: String,
    dims: usize,
    max_tokens: usize,
}

impl HashingEncoder {
    pub fn new(model_name: impl Into<String>, dims: usize, max_tokens: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dims,
            max_tokens,
        }
    }

    /// Lowercased alphanumeric word tokens, cut at `max_tokens`.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .take(self.max_tokens)
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn token_vector(&self, token: &str, out: &mut [f32]) {
        for projection in 0..HASH_PROJECTIONS {
            let mut hasher = Sha256::new();
            hasher.update([projection]);
            hasher.update(token.as_bytes());
            let digest = hasher.finalize();
            let mut idx_bytes = [0u8; 8];
            idx_bytes.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(idx_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            out[idx] += sign;
        }
    }

    fn encode_one(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let tokens = self.tokenize(text);
        if tokens.is_empty() {
            return Err(EncoderError::EncodingFailed(
                "text contains no word tokens".into(),
            ));
        }
        let mut hidden = vec![0f32; tokens.len() * self.dims];
        for (row, token) in hidden.chunks_exact_mut(self.dims).zip(&tokens) {
            self.token_vector(token, row);
        }
        let mask = vec![1i64; tokens.len()];
        Ok(normalize_l2(mean_pool(&hidden, &mask, self.dims)))
    }
}

impl TextEncoder for HashingEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn max_tokens(&self) -> usize {
        self.max_tokens
    }
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        check_inputs(texts)?;
        if self.dims == 0 {
            return Err(EncoderError::ModelUnavailable(
                "hashing encoder configured with zero dimensions".into(),
            ));
        }
        texts.iter().map(|t| self.encode_one(t)).collect()
    }
}

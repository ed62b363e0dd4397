//! Text encoder backends and their construction from configuration.
//!
//! | `encoder.backend` | Encoder |
//! |-------------------|---------|
//! | `"disabled"` | none; loading reports `ModelUnavailable` |
//! | `"hashing"` | [`HashingEncoder`] (weight-free, from the core crate) |
//! | `"local"` | fastembed or tract, depending on enabled features |
//!
//! Local backends read `model.onnx` (or `onnx/model.onnx`) and the tokenizer
//! files from `encoder.model_dir`. Nothing is ever downloaded: a missing file
//! is a [`EncoderError::ModelUnavailable`].

#[cfg(feature = "local-embeddings-fastembed")]
mod local_fastembed;
#[cfg(feature = "local-embeddings-tract")]
mod local_tract;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semantic_recall_core::encoder::{EncoderLoader, HashingEncoder, TextEncoder};
use semantic_recall_core::EncoderError;

use crate::config::EncoderConfig;

/// Build the configured encoder. Blocking: may read large model files.
pub fn create_encoder(config: &EncoderConfig) -> Result<Arc<dyn TextEncoder>, EncoderError> {
    match config.backend.as_str() {
        "disabled" => Err(EncoderError::ModelUnavailable(
            "encoder backend is disabled".into(),
        )),
        "hashing" => {
            let (model, dims) = model_and_dims(config)?;
            Ok(Arc::new(HashingEncoder::new(model, dims, config.max_tokens)))
        }
        "local" => create_local(config),
        other => Err(EncoderError::ModelUnavailable(format!(
            "unknown encoder backend: {}",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn create_local(config: &EncoderConfig) -> Result<Arc<dyn TextEncoder>, EncoderError> {
    Ok(Arc::new(local_fastembed::FastembedEncoder::load(config)?))
}

#[cfg(all(
    feature = "local-embeddings-tract",
    not(feature = "local-embeddings-fastembed")
))]
fn create_local(config: &EncoderConfig) -> Result<Arc<dyn TextEncoder>, EncoderError> {
    Ok(Arc::new(local_tract::TractEncoder::load(config)?))
}

#[cfg(not(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
)))]
fn create_local(_config: &EncoderConfig) -> Result<Arc<dyn TextEncoder>, EncoderError> {
    Err(EncoderError::ModelUnavailable(
        "local encoder requires one of: --features local-embeddings-fastembed, --features local-embeddings-tract".into(),
    ))
}

fn model_and_dims(config: &EncoderConfig) -> Result<(String, usize), EncoderError> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| EncoderError::ModelUnavailable("encoder.model is not set".into()))?;
    let dims = config
        .dims
        .filter(|d| *d > 0)
        .ok_or_else(|| EncoderError::ModelUnavailable("encoder.dims is not set".into()))?;
    Ok((model, dims))
}

/// Files making up a local model directory.
#[cfg_attr(
    not(any(
        feature = "local-embeddings-fastembed",
        feature = "local-embeddings-tract"
    )),
    allow(dead_code)
)]
pub(crate) struct ModelFiles {
    pub onnx: PathBuf,
    pub tokenizer: PathBuf,
    pub dir: PathBuf,
}

#[cfg_attr(
    not(any(
        feature = "local-embeddings-fastembed",
        feature = "local-embeddings-tract"
    )),
    allow(dead_code)
)]
impl ModelFiles {
    pub fn locate(config: &EncoderConfig) -> Result<Self, EncoderError> {
        let dir = config
            .model_dir
            .clone()
            .ok_or_else(|| EncoderError::ModelUnavailable("encoder.model_dir is not set".into()))?;
        let onnx = [dir.join("model.onnx"), dir.join("onnx").join("model.onnx")]
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                EncoderError::ModelUnavailable(format!(
                    "no model.onnx found in {}",
                    dir.display()
                ))
            })?;
        let tokenizer = require_file(&dir, "tokenizer.json")?;
        Ok(Self {
            onnx,
            tokenizer,
            dir,
        })
    }

    /// Read a file from the model directory, failing if it is missing.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, EncoderError> {
        let path = require_file(&self.dir, name)?;
        read_bytes(&path)
    }
}

fn require_file(dir: &Path, name: &str) -> Result<PathBuf, EncoderError> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(EncoderError::ModelUnavailable(format!(
            "missing model file {}",
            path.display()
        )));
    }
    Ok(path)
}

#[cfg_attr(
    not(any(
        feature = "local-embeddings-fastembed",
        feature = "local-embeddings-tract"
    )),
    allow(dead_code)
)]
pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, EncoderError> {
    std::fs::read(path).map_err(|e| {
        EncoderError::ModelUnavailable(format!("failed to read {}: {}", path.display(), e))
    })
}

/// [`EncoderLoader`] that builds the encoder described by an [`EncoderConfig`]
/// on a blocking thread.
pub struct ConfiguredLoader {
    config: EncoderConfig,
}

impl ConfiguredLoader {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EncoderLoader for ConfiguredLoader {
    async fn load(&self) -> Result<Arc<dyn TextEncoder>, EncoderError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || create_encoder(&config))
            .await
            .map_err(|e| EncoderError::ModelUnavailable(format!("model loader panicked: {}", e)))?
    }
}

//! fastembed-based local encoder (primary platforms).
//!
//! The model is built from files already on disk through fastembed's
//! user-defined model path, so no Hugging Face download ever happens.
//! fastembed applies the tokenizer truncation at `max_tokens` and mean pools
//! over the attention mask; vectors are re-normalized here so every backend
//! honours the same unit-length contract.

use fastembed::{
    InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use std::sync::Mutex;

use semantic_recall_core::embedding::normalize_l2;
use semantic_recall_core::encoder::{check_inputs, check_outputs, TextEncoder};
use semantic_recall_core::EncoderError;

use super::{model_and_dims, read_bytes, ModelFiles};
use crate::config::EncoderConfig;

pub struct FastembedEncoder {
    model_name: String,
    dims: usize,
    max_tokens: usize,
    batch_size: usize,
    // `TextEmbedding::embed` needs exclusive access to the ONNX session.
    inner: Mutex<TextEmbedding>,
}

impl FastembedEncoder {
    pub fn load(config: &EncoderConfig) -> Result<Self, EncoderError> {
        let (model_name, dims) = model_and_dims(config)?;
        let files = ModelFiles::locate(config)?;

        let tokenizer_files = TokenizerFiles {
            tokenizer_file: read_bytes(&files.tokenizer)?,
            config_file: files.read("config.json")?,
            special_tokens_map_file: files.read("special_tokens_map.json")?,
            tokenizer_config_file: files.read("tokenizer_config.json")?,
        };
        let user_model = UserDefinedEmbeddingModel::new(read_bytes(&files.onnx)?, tokenizer_files)
            .with_pooling(Pooling::Mean);

        let options = InitOptionsUserDefined::new().with_max_length(config.max_tokens);
        let embedding = TextEmbedding::try_new_from_user_defined(user_model, options)
            .map_err(|e| {
                EncoderError::ModelUnavailable(format!(
                    "failed to initialize local embedding model: {}",
                    e
                ))
            })?;

        tracing::info!(
            model = %model_name,
            dims,
            dir = %files.dir.display(),
            "loaded fastembed encoder"
        );

        Ok(Self {
            model_name,
            dims,
            max_tokens: config.max_tokens,
            batch_size: config.batch_size,
            inner: Mutex::new(embedding),
        })
    }
}

impl TextEncoder for FastembedEncoder {
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
        let mut model = self
            .inner
            .lock()
            .map_err(|_| EncoderError::EncodingFailed("encoder lock poisoned".into()))?;
        let vectors = model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EncoderError::EncodingFailed(format!("local embedding failed: {}", e)))?;
        drop(model);

        let vectors: Vec<Vec<f32>> = vectors.into_iter().map(normalize_l2).collect();
        check_outputs(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

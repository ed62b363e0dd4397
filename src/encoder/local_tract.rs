//! Tract-based local encoder (fallback for musl and Intel Mac).
//!
//! Pure-Rust path: the ONNX graph runs on tract-onnx and text is tokenized
//! with the tokenizers crate. No ONNX Runtime or system deps. Both the
//! tokenizer and the optimized plan are loaded once and reused per batch.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use tract_onnx::prelude::*;

use semantic_recall_core::embedding::{mean_pool, normalize_l2};
use semantic_recall_core::encoder::{check_inputs, check_outputs, TextEncoder};
use semantic_recall_core::EncoderError;

use super::{model_and_dims, ModelFiles};
use crate::config::EncoderConfig;

type Plan = TypedRunnableModel<TypedModel>;

pub struct TractEncoder {
    model_name: String,
    dims: usize,
    max_tokens: usize,
    batch_size: usize,
    tokenizer: tokenizers::Tokenizer,
    plan: Plan,
}

fn unavailable(what: &str, e: impl std::fmt::Display) -> EncoderError {
    EncoderError::ModelUnavailable(format!("{}: {}", what, e))
}

fn failed(what: &str, e: impl std::fmt::Display) -> EncoderError {
    EncoderError::EncodingFailed(format!("{}: {}", what, e))
}

impl TractEncoder {
    pub fn load(config: &EncoderConfig) -> Result<Self, EncoderError> {
        let (model_name, dims) = model_and_dims(config)?;
        let files = ModelFiles::locate(config)?;

        let tokenizer = tokenizers::Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| unavailable("load tokenizer", e))?;

        let plan = tract_onnx::onnx()
            .model_for_path(&files.onnx)
            .map_err(|e| unavailable("load ONNX", e))?
            .into_optimized()
            .map_err(|e| unavailable("optimize", e))?
            .into_runnable()
            .map_err(|e| unavailable("build tract runnable", e))?;

        tracing::info!(
            model = %model_name,
            dims,
            dir = %files.dir.display(),
            "loaded tract encoder"
        );

        Ok(Self {
            model_name,
            dims,
            max_tokens: config.max_tokens,
            batch_size: config.batch_size.max(1),
            tokenizer,
            plan,
        })
    }

    fn encode_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        let encodings = chunk
            .iter()
            .map(|s| {
                self.tokenizer
                    .encode(s.as_str(), true)
                    .map_err(|e| failed("tokenize", e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(1)
            .clamp(1, self.max_tokens);

        let rows = encodings.len();
        let mut input_ids = vec![0i64; rows * seq_len];
        let mut attention_mask = vec![0i64; rows * seq_len];
        let mut token_type_ids = vec![0i64; rows * seq_len];

        for (i, enc) in encodings.iter().enumerate() {
            let len = enc.get_ids().len().min(seq_len);
            for j in 0..len {
                input_ids[i * seq_len + j] = enc.get_ids()[j] as i64;
                attention_mask[i * seq_len + j] = 1;
                token_type_ids[i * seq_len + j] = enc.get_type_ids()[j] as i64;
            }
        }

        let to_tensor = |data: Vec<i64>| -> Result<Tensor, EncoderError> {
            ndarray::Array2::from_shape_vec((rows, seq_len), data)
                .map(Tensor::from)
                .map_err(|e| failed("input shape", e))
        };

        let mut inputs: TVec<TValue> = tvec!(
            to_tensor(input_ids)?.into(),
            to_tensor(attention_mask.clone())?.into()
        );
        // BERT-style exports take token_type_ids as a third input.
        if self.plan.model().inputs.len() == 3 {
            inputs.push(to_tensor(token_type_ids)?.into());
        }

        let outputs = self.plan.run(inputs).map_err(|e| failed("inference", e))?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::EncodingFailed("no output tensor".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| failed("output to array", e))?;

        let shape = view.shape().to_vec();
        match shape.as_slice() {
            // [batch, dims]: already pooled (sentence_embedding).
            [b, _] if *b == rows => Ok((0..rows)
                .map(|i| normalize_l2(view.slice(ndarray::s![i, ..]).iter().copied().collect()))
                .collect()),
            // [batch, seq_len, dims]: last_hidden_state, pool over the mask.
            [b, s, d] if *b == rows && *s == seq_len => Ok((0..rows)
                .map(|i| {
                    let hidden: Vec<f32> =
                        view.slice(ndarray::s![i, .., ..]).iter().copied().collect();
                    let mask = &attention_mask[i * seq_len..(i + 1) * seq_len];
                    normalize_l2(mean_pool(&hidden, mask, *d))
                })
                .collect()),
            _ => Err(EncoderError::EncodingFailed(format!(
                "unexpected output shape: {:?}",
                shape
            ))),
        }
    }
}

impl TextEncoder for TractEncoder {
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
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            all.extend(self.encode_chunk(chunk)?);
        }
        check_outputs(&all, texts.len(), self.dims)?;
        Ok(all)
    }
}

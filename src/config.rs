//! TOML configuration parsing and validation.
//!
//! The configuration is resolved once by the caller (CLI or host
//! application) and handed to the service fully formed; nothing inside the
//! embedding subsystem falls back to environment variables or global state.
//!
//! ```toml
//! [db]
//! path = "./data/recall.sqlite"
//!
//! [encoder]
//! backend = "local"
//! model = "all-minilm-l6-v2"
//! model_dir = "./models/all-minilm-l6-v2"
//! dims = 384
//!
//! [search]
//! default_top_k = 5
//! min_score = 0.3
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EncoderConfig {
    /// `local`, `hashing`, or `disabled`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Directory holding `model.onnx` and the tokenizer files for `local`.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: None,
            model_dir: None,
            dims: None,
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
        }
    }
}

impl EncoderConfig {
    pub fn is_enabled(&self) -> bool {
        self.backend != "disabled"
    }
}

fn default_backend() -> String {
    "disabled".to_string()
}
fn default_max_tokens() -> usize {
    256
}
fn default_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_context_size")]
    pub context_size: usize,
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            min_score: default_min_score(),
            context_size: default_context_size(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_score() -> f32 {
    0.3
}
fn default_context_size() -> usize {
    3
}
fn default_parallel_threshold() -> usize {
    semantic_recall_core::similarity::DEFAULT_PARALLEL_THRESHOLD
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        bail!("db.max_connections must be > 0");
    }

    let encoder = &config.encoder;
    match encoder.backend.as_str() {
        "disabled" | "hashing" | "local" => {}
        other => bail!(
            "Unknown encoder backend: '{}'. Must be disabled, hashing, or local.",
            other
        ),
    }
    if encoder.is_enabled() {
        if encoder.dims.is_none() || encoder.dims == Some(0) {
            bail!(
                "encoder.dims must be > 0 when backend is '{}'",
                encoder.backend
            );
        }
        if encoder.model.is_none() {
            bail!(
                "encoder.model must be specified when backend is '{}'",
                encoder.backend
            );
        }
    }
    if encoder.backend == "local" && encoder.model_dir.is_none() {
        bail!("encoder.model_dir must be specified when backend is 'local'");
    }
    if encoder.max_tokens == 0 {
        bail!("encoder.max_tokens must be > 0");
    }
    if encoder.batch_size == 0 {
        bail!("encoder.batch_size must be > 0");
    }

    if config.search.default_top_k == 0 {
        bail!("search.default_top_k must be >= 1");
    }
    if !config.search.min_score.is_finite() {
        bail!("search.min_score must be a finite number");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config("[db]\npath = \"/tmp/r.sqlite\"\n").unwrap();
        assert_eq!(config.encoder.backend, "disabled");
        assert!(!config.encoder.is_enabled());
        assert_eq!(config.encoder.max_tokens, 256);
        assert_eq!(config.search.default_top_k, 5);
        assert_eq!(config.db.max_connections, 5);
    }

    #[test]
    fn test_hashing_backend_requires_dims_and_model() {
        let missing = "[db]\npath = \"x\"\n[encoder]\nbackend = \"hashing\"\n";
        assert!(parse_config(missing).is_err());

        let ok = "[db]\npath = \"x\"\n[encoder]\nbackend = \"hashing\"\nmodel = \"h\"\ndims = 64\n";
        let config = parse_config(ok).unwrap();
        assert_eq!(config.encoder.dims, Some(64));
    }

    #[test]
    fn test_local_backend_requires_model_dir() {
        let toml = "[db]\npath = \"x\"\n[encoder]\nbackend = \"local\"\nmodel = \"all-minilm-l6-v2\"\ndims = 384\n";
        let err = parse_config(toml).unwrap_err();
        assert!(err.to_string().contains("model_dir"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml = "[db]\npath = \"x\"\n[encoder]\nbackend = \"openai\"\n";
        assert!(parse_config(toml).is_err());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let toml = "[db]\npath = \"x\"\n[search]\ndefault_top_k = 0\n";
        assert!(parse_config(toml).is_err());
    }
}

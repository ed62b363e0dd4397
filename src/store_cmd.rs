//! `recall store`: persist one analysis and embed it.

use anyhow::{bail, Result};
use std::sync::Arc;

use semantic_recall_core::store::VectorStore;
use semantic_recall_core::NewAnalysis;

use crate::config::Config;
use crate::service::EmbeddingService;
use crate::sqlite_store::SqliteStore;

pub async fn run_store(config: &Config, new: NewAnalysis) -> Result<()> {
    if new.source_text.trim().is_empty() {
        bail!("--text must not be empty");
    }

    let store = SqliteStore::connect(config).await?;
    let service = EmbeddingService::from_config(Arc::new(store), config);
    let id = service.store_analysis_with_embedding(new).await?;

    let embedded = service
        .store()
        .get(id)
        .await?
        .and_then(|r| r.embedding_model);
    service.store().pool().close().await;

    println!("stored analysis {}", id);
    match embedded {
        Some(model) => println!("  embedding: {}", model),
        None => println!("  embedding: none (run `recall embed pending` once a model is available)"),
    }
    Ok(())
}

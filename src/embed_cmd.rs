//! `recall embed pending` and `recall embed rebuild`.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::service::{BackfillReport, EmbeddingService};
use crate::sqlite_store::SqliteStore;

async fn open_service(config: &Config) -> Result<EmbeddingService<SqliteStore>> {
    if !config.encoder.is_enabled() {
        bail!("Encoder is disabled. Set [encoder] backend in config.");
    }
    let store = SqliteStore::connect(config).await?;
    Ok(EmbeddingService::from_config(Arc::new(store), config))
}

fn print_report(title: &str, report: &BackfillReport) {
    println!("{}", title);
    if report.pending == 0 {
        println!("  all records up to date");
        return;
    }
    println!("  total pending: {}", report.pending);
    println!("  embedded: {}", report.embedded);
    println!("  skipped: {}", report.skipped);
}

/// Embed records that are missing an embedding from the configured model.
pub async fn run_embed_pending(config: &Config, limit: Option<usize>) -> Result<()> {
    let service = open_service(config).await?;
    let report = service.embed_pending(limit).await?;
    service.store().pool().close().await;
    print_report("embed pending", &report);
    Ok(())
}

/// Delete all embeddings and regenerate them with the configured model.
pub async fn run_embed_rebuild(config: &Config) -> Result<()> {
    let service = open_service(config).await?;
    let report = service.rebuild_embeddings().await?;
    service.store().pool().close().await;
    print_report("embed rebuild", &report);
    Ok(())
}

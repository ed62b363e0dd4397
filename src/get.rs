//! `recall get <id>`: print one stored analysis.

use anyhow::Result;

use semantic_recall_core::store::VectorStore;
use semantic_recall_core::{AnalysisRecord, RecordId};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

pub async fn get_analysis(config: &Config, id: RecordId) -> Result<AnalysisRecord> {
    let store = SqliteStore::connect(config).await?;
    let record = store.get(id).await;
    store.pool().close().await;
    record?.ok_or_else(|| anyhow::anyhow!("analysis record not found: {}", id))
}

/// CLI entry point: print the record, or `--json` for machine output.
pub async fn run_get(config: &Config, id: RecordId, json: bool) -> Result<()> {
    let record = get_analysis(config, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("--- Analysis ---");
    println!("id:           {}", record.id);
    println!("recording_id: {}", record.recording_id);
    println!("project_id:   {}", record.project_id);
    println!("category:     {}", record.category);
    println!("created_at:   {}", format_ts_iso(record.created_at));
    if let Some(score) = record.confidence_score {
        println!("confidence:   {:.2}", score);
    }
    if let Some(ms) = record.processing_time_ms {
        println!("processed in: {} ms", ms);
    }
    match (&record.embedding_model, &record.embedding) {
        (Some(model), Some(v)) => println!("embedding:    {} ({} dims)", model, v.len()),
        _ => println!("embedding:    none"),
    }
    println!();

    println!("--- Content ---");
    println!("{}", record.content);
    println!();

    println!("--- Source Text ---");
    println!("{}", record.source_text);
    Ok(())
}

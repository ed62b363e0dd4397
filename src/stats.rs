//! Database statistics and embedding coverage.
//!
//! Used by `recall stats` to confirm analyses are being stored and embedded
//! with the model the config names.

use anyhow::Result;

use semantic_recall_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let stats = store.stats().await;
    store.pool().close().await;
    let stats = stats?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Semantic Recall Database Stats");
    println!("=============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Analyses:    {}", stats.records);
    println!(
        "  Embedded:    {} ({:.0}%)",
        stats.embedded,
        percent(stats.embedded, stats.records)
    );
    match (config.encoder.is_enabled(), &config.encoder.model) {
        (true, Some(model)) => println!("  Active model: {}", model),
        _ => println!("  Active model: none (encoder disabled)"),
    }

    if !stats.by_model.is_empty() {
        println!();
        println!("  By model:");
        for (model, count) in &stats.by_model {
            println!("    {:<28} {}", model, count);
        }
    }
    println!();
    Ok(())
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{} B", b),
    }
}

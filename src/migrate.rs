//! Database schema migrations (idempotent).
//!
//! One table, `analyses`, holds each record and its optional embedding. A
//! `CHECK` constraint keeps the embedding columns all-or-nothing and the
//! blob exactly `4 × embedding_dims` bytes long.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recording_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            category TEXT NOT NULL,
            content TEXT NOT NULL,
            source_text TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            confidence_score REAL,
            processing_time_ms INTEGER,
            embedding BLOB,
            embedding_model TEXT,
            embedding_dims INTEGER,
            CHECK (
                (embedding IS NULL AND embedding_model IS NULL AND embedding_dims IS NULL)
                OR (embedding IS NOT NULL AND embedding_model IS NOT NULL
                    AND embedding_dims > 0 AND length(embedding) = 4 * embedding_dims)
            )
        )
        "#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_analyses_project_id ON analyses(project_id)",
        "CREATE INDEX IF NOT EXISTS idx_analyses_category ON analyses(category)",
        "CREATE INDEX IF NOT EXISTS idx_analyses_created_at ON analyses(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_analyses_embedding_model ON analyses(embedding_model)",
        "CREATE INDEX IF NOT EXISTS idx_analyses_project_category_created \
         ON analyses(project_id, category, created_at)",
    ];
    for sql in indexes {
        sqlx::query(sql).execute(pool).await?;
    }

    tracing::debug!("schema migrations applied");
    Ok(())
}

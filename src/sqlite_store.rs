//! SQLite-backed [`VectorStore`] implementation.
//!
//! Every write is a single SQL statement, so a record is never observed
//! half-written and a cancelled embedding update either lands completely or
//! not at all. Candidate queries are built with [`QueryBuilder`] so only the
//! filter clauses actually present reach SQLite, letting it pick the
//! `project_id` / `category` / `created_at` indexes.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use semantic_recall_core::embedding::{blob_to_vec, vec_to_blob};
use semantic_recall_core::store::{Inserted, StoreStats, VectorStore};
use semantic_recall_core::{
    ActiveModel, AnalysisRecord, Category, Error, NewAnalysis, RecordId, Result, SearchFilter,
    StorageError,
};

use crate::config::Config;
use crate::db;

const COLUMNS: &str = "id, recording_id, project_id, category, content, source_text, \
     created_at, confidence_score, processing_time_ms, embedding, embedding_model, embedding_dims";

/// SQLite implementation of the [`VectorStore`] trait over the `analyses` table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database named in `config`. Run `recall init` first.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn storage(err: sqlx::Error) -> Error {
    Error::Storage(StorageError::backend(err))
}

fn row_to_record(row: &SqliteRow) -> Result<AnalysisRecord> {
    let id: RecordId = row.try_get("id").map_err(storage)?;
    let blob: Option<Vec<u8>> = row.try_get("embedding").map_err(storage)?;
    let dims: Option<i64> = row.try_get("embedding_dims").map_err(storage)?;
    let category: String = row.try_get("category").map_err(storage)?;

    let embedding = match (blob, dims) {
        (Some(blob), Some(dims)) if dims > 0 => Some(blob_to_vec(&blob, dims as usize).map_err(
            |e| StorageError::Corrupt {
                id,
                reason: e.to_string(),
            },
        )?),
        (None, _) => None,
        (Some(_), dims) => {
            return Err(StorageError::Corrupt {
                id,
                reason: format!("embedding present with invalid dimension {:?}", dims),
            }
            .into())
        }
    };

    Ok(AnalysisRecord {
        id,
        recording_id: row.try_get("recording_id").map_err(storage)?,
        project_id: row.try_get("project_id").map_err(storage)?,
        category: Category::from(category),
        content: row.try_get("content").map_err(storage)?,
        source_text: row.try_get("source_text").map_err(storage)?,
        created_at: row.try_get("created_at").map_err(storage)?,
        embedding,
        embedding_model: row.try_get("embedding_model").map_err(storage)?,
        confidence_score: row.try_get("confidence_score").map_err(storage)?,
        processing_time_ms: row.try_get("processing_time_ms").map_err(storage)?,
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn insert(&self, new: NewAnalysis) -> Result<Inserted> {
        let created_at = new
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        let result = sqlx::query(
            r#"
            INSERT INTO analyses (id, recording_id, project_id, category, content,
                                  source_text, created_at, confidence_score, processing_time_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(new.id)
        .bind(&new.recording_id)
        .bind(&new.project_id)
        .bind(new.category.as_str())
        .bind(&new.content)
        .bind(&new.source_text)
        .bind(created_at)
        .bind(new.confidence_score)
        .bind(new.processing_time_ms)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let id = new.id.unwrap_or_else(|| result.last_insert_rowid());
        let created = result.rows_affected() > 0;
        if !created {
            tracing::debug!(id, "record already present, insert skipped");
        }
        Ok(Inserted { id, created })
    }

    async fn update_embedding(&self, id: RecordId, embedding: &[f32], model: &str) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::invalid("embedding must not be empty"));
        }
        let blob = vec_to_blob(embedding);

        let result = sqlx::query(
            "UPDATE analyses SET embedding = ?, embedding_model = ?, embedding_dims = ? WHERE id = ?",
        )
        .bind(&blob)
        .bind(model)
        .bind(embedding.len() as i64)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    async fn query_candidates(
        &self,
        filter: &SearchFilter,
        model: &ActiveModel,
    ) -> Result<Vec<AnalysisRecord>> {
        filter.validate()?;
        if filter.is_unsatisfiable() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM analyses WHERE embedding IS NOT NULL AND embedding_model = ",
            COLUMNS
        ));
        qb.push_bind(model.name.clone());

        if let Some(project_id) = &filter.project_id {
            qb.push(" AND project_id = ");
            qb.push_bind(project_id.clone());
        }
        if let Some(categories) = &filter.categories {
            qb.push(" AND category IN (");
            let mut list = qb.separated(", ");
            for category in categories {
                list.push_bind(category.as_str().to_string());
            }
            list.push_unseparated(")");
        }
        if let Some(range) = &filter.date_range {
            qb.push(" AND created_at BETWEEN ");
            qb.push_bind(range.start);
            qb.push(" AND ");
            qb.push_bind(range.end);
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(storage)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = row_to_record(row)?;
            let dims = record.embedding.as_ref().map(Vec::len).unwrap_or(0);
            if dims != model.dims {
                return Err(StorageError::Corrupt {
                    id: record.id,
                    reason: format!(
                        "{}-dimensional embedding tagged with model '{}' ({} dimensions)",
                        dims, model.name, model.dims
                    ),
                }
                .into());
            }
            records.push(record);
        }

        tracing::debug!(candidates = records.len(), model = %model.name, "queried candidates");
        Ok(records)
    }

    async fn get(&self, id: RecordId) -> Result<Option<AnalysisRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM analyses WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn pending_embeddings(
        &self,
        model: &ActiveModel,
        limit: Option<usize>,
    ) -> Result<Vec<AnalysisRecord>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            "SELECT {} FROM analyses \
             WHERE embedding IS NULL OR embedding_model != ? \
             ORDER BY created_at ASC, id ASC LIMIT ?",
            COLUMNS
        ))
        .bind(&model.name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn clear_embeddings(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE analyses SET embedding = NULL, embedding_model = NULL, embedding_dims = NULL \
             WHERE embedding IS NOT NULL",
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analyses")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let rows = sqlx::query(
            "SELECT embedding_model, COUNT(*) AS n FROM analyses \
             WHERE embedding IS NOT NULL GROUP BY embedding_model ORDER BY embedding_model",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut by_model = Vec::with_capacity(rows.len());
        for row in &rows {
            let model: String = row.try_get("embedding_model").map_err(storage)?;
            let n: i64 = row.try_get("n").map_err(storage)?;
            by_model.push((model, n as u64));
        }

        Ok(StoreStats {
            records: records as u64,
            embedded: by_model.iter().map(|(_, n)| n).sum(),
            by_model,
        })
    }
}

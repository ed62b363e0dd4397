//! Storage abstraction for analysis records and their embeddings.
//!
//! The [`VectorStore`] trait defines every persistence operation the
//! embedding service needs, so the SQLite backend and the in-memory backend
//! are interchangeable.
//!
//! Implementations must be `Send + Sync` and must never expose a
//! half-written record: an insert is visible only once it returns, and an
//! embedding only once [`update_embedding`](VectorStore::update_embedding)
//! returns.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{ActiveModel, AnalysisRecord, NewAnalysis, RecordId, SearchFilter};

/// Record and embedding counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub records: u64,
    pub embedded: u64,
    /// Embedded record count per model name, sorted by name.
    pub by_model: Vec<(String, u64)>,
}

/// Outcome of [`VectorStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub id: RecordId,
    /// False when a record with the supplied id already existed and nothing
    /// was written.
    pub created: bool,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](VectorStore::insert) | Persist a new record, assigning its id |
/// | [`update_embedding`](VectorStore::update_embedding) | Attach or replace a record's vector |
/// | [`query_candidates`](VectorStore::query_candidates) | Filtered records embedded by the active model |
/// | [`get`](VectorStore::get) | Fetch one record by id |
/// | [`pending_embeddings`](VectorStore::pending_embeddings) | Records lacking a current embedding |
/// | [`clear_embeddings`](VectorStore::clear_embeddings) | Drop every stored vector |
/// | [`stats`](VectorStore::stats) | Counts for diagnostics |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist a record atomically and return its id.
    ///
    /// Uses `new.id` when supplied; if a record with that id already exists
    /// the call changes nothing and reports `created: false`.
    async fn insert(&self, new: NewAnalysis) -> Result<Inserted>;

    /// Attach or replace the embedding of an existing record.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) if `id` is unknown.
    async fn update_embedding(&self, id: RecordId, embedding: &[f32], model: &str) -> Result<()>;

    /// Records matching `filter` whose embedding was produced by `model`.
    ///
    /// Order is unspecified.
    async fn query_candidates(
        &self,
        filter: &SearchFilter,
        model: &ActiveModel,
    ) -> Result<Vec<AnalysisRecord>>;

    async fn get(&self, id: RecordId) -> Result<Option<AnalysisRecord>>;

    /// Records with no embedding, or one produced by a different model,
    /// oldest first.
    async fn pending_embeddings(
        &self,
        model: &ActiveModel,
        limit: Option<usize>,
    ) -> Result<Vec<AnalysisRecord>>;

    /// Remove all embeddings. Returns how many records lost one.
    async fn clear_embeddings(&self) -> Result<u64>;

    async fn stats(&self) -> Result<StoreStats>;
}

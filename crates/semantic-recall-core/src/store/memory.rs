//! In-memory [`VectorStore`] for tests and embedded use.
//!
//! Records live in a `BTreeMap` behind a `std::sync::RwLock`; the write lock
//! serializes all mutations, including repeated writes to the same id.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result, StorageError};
use crate::models::{ActiveModel, AnalysisRecord, NewAnalysis, RecordId, SearchFilter};

use super::{Inserted, StoreStats, VectorStore};

#[derive(Default)]
struct Inner {
    next_id: RecordId,
    records: BTreeMap<RecordId, AnalysisRecord>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a record half-written
    // (each mutation is a single map operation), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert(&self, new: NewAnalysis) -> Result<Inserted> {
        let mut inner = self.write();
        let id = match new.id {
            Some(id) if inner.records.contains_key(&id) => {
                return Ok(Inserted { id, created: false })
            }
            Some(id) => id,
            None => inner.next_id.max(1),
        };
        let next_id = id.checked_add(1).ok_or_else(|| {
            Error::invalid(format!("record id {} leaves no room for later ids", id))
        })?;
        inner.next_id = inner.next_id.max(next_id);
        let created_at = new
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        inner
            .records
            .insert(id, AnalysisRecord::from_new(id, created_at, new));
        Ok(Inserted { id, created: true })
    }

    async fn update_embedding(&self, id: RecordId, embedding: &[f32], model: &str) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::invalid("embedding must not be empty"));
        }
        let mut inner = self.write();
        let record = inner.records.get_mut(&id).ok_or(Error::NotFound(id))?;
        record.embedding = Some(embedding.to_vec());
        record.embedding_model = Some(model.to_string());
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
        let inner = self.read();
        let mut records = Vec::new();
        for record in inner.records.values() {
            if !record.is_embedded_with(model) || !filter.matches(record) {
                continue;
            }
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
            records.push(record.clone());
        }
        Ok(records)
    }

    async fn get(&self, id: RecordId) -> Result<Option<AnalysisRecord>> {
        Ok(self.read().records.get(&id).cloned())
    }

    async fn pending_embeddings(
        &self,
        model: &ActiveModel,
        limit: Option<usize>,
    ) -> Result<Vec<AnalysisRecord>> {
        let inner = self.read();
        let mut pending: Vec<AnalysisRecord> = inner
            .records
            .values()
            .filter(|r| !r.is_embedded_with(model))
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        if let Some(limit) = limit {
            pending.truncate(limit);
        }
        Ok(pending)
    }

    async fn clear_embeddings(&self) -> Result<u64> {
        let mut inner = self.write();
        let mut cleared = 0u64;
        for record in inner.records.values_mut() {
            if record.embedding.take().is_some() {
                cleared += 1;
            }
            record.embedding_model = None;
        }
        Ok(cleared)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.read();
        let mut by_model: HashMap<String, u64> = HashMap::new();
        for record in inner.records.values() {
            if let (Some(_), Some(model)) = (&record.embedding, &record.embedding_model) {
                *by_model.entry(model.clone()).or_default() += 1;
            }
        }
        let mut by_model: Vec<(String, u64)> = by_model.into_iter().collect();
        by_model.sort();
        Ok(StoreStats {
            records: inner.records.len() as u64,
            embedded: by_model.iter().map(|(_, n)| n).sum(),
            by_model,
        })
    }
}

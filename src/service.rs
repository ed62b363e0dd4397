//! Embedding service: the orchestrator between encoder and store.
//!
//! The service owns the encoder lifecycle as an explicit state machine:
//!
//! ```text
//! Uninitialized ──▶ Initializing ──▶ Ready
//!                         │
//!                         └────────▶ Failed ──(initialize)──▶ Initializing
//! ```
//!
//! The first operation needing the encoder loads it. Concurrent first users
//! wait on one async mutex, so the model is loaded at most once. `Failed` is
//! sticky: later operations report the same error until [`initialize`] is
//! called again.
//!
//! Encoding and ranking are CPU-bound and run on tokio's blocking pool.
//!
//! [`initialize`]: EmbeddingService::initialize

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinError;

use semantic_recall_core::encoder::{EncoderLoader, TextEncoder};
use semantic_recall_core::similarity::Ranker;
use semantic_recall_core::store::{Inserted, VectorStore};
use semantic_recall_core::{
    AnalysisRecord, Category, EncoderError, Error, NewAnalysis, RecordId, Result, SearchFilter,
    SimilarityResult, StorageError,
};

use crate::config::Config;
use crate::encoder::ConfiguredLoader;

/// Encoder lifecycle state, as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

enum Slot {
    Uninitialized,
    Initializing,
    Ready(Arc<dyn TextEncoder>),
    Failed(EncoderError),
}

impl Slot {
    fn state(&self) -> ServiceState {
        match self {
            Slot::Uninitialized => ServiceState::Uninitialized,
            Slot::Initializing => ServiceState::Initializing,
            Slot::Ready(_) => ServiceState::Ready,
            Slot::Failed(_) => ServiceState::Failed,
        }
    }
}

/// Tunables taken from the `[encoder]` and `[search]` config sections.
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    /// Records encoded per call during backfill.
    pub batch_size: usize,
    pub parallel_threshold: usize,
    /// Score floor applied by [`EmbeddingService::historical_context`].
    pub context_min_score: f32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            parallel_threshold: semantic_recall_core::similarity::DEFAULT_PARALLEL_THRESHOLD,
            context_min_score: 0.3,
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.encoder.batch_size,
            parallel_threshold: config.search.parallel_threshold,
            context_min_score: config.search.min_score,
        }
    }
}

/// Outcome of an embedding backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Records selected for (re-)embedding.
    pub pending: usize,
    pub embedded: usize,
    /// Records whose `source_text` could not be encoded.
    pub skipped: usize,
}

pub struct EmbeddingService<S: VectorStore> {
    store: Arc<S>,
    loader: Box<dyn EncoderLoader>,
    options: ServiceOptions,
    slot: RwLock<Slot>,
    init_guard: Mutex<()>,
}

impl<S: VectorStore> EmbeddingService<S> {
    pub fn new(store: Arc<S>, loader: Box<dyn EncoderLoader>, options: ServiceOptions) -> Self {
        Self {
            store,
            loader,
            options,
            slot: RwLock::new(Slot::Uninitialized),
            init_guard: Mutex::new(()),
        }
    }

    /// Service wired to the encoder backend named in `config`.
    pub fn from_config(store: Arc<S>, config: &Config) -> Self {
        Self::new(
            store,
            Box::new(ConfiguredLoader::new(config.encoder.clone())),
            ServiceOptions::from_config(config),
        )
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn state(&self) -> ServiceState {
        self.read_slot(Slot::state)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// Load the encoder now.
    ///
    /// Returns immediately if already `Ready`. From `Failed` this retries the
    /// load, which is the only way out of that state.
    pub async fn initialize(&self) -> std::result::Result<(), EncoderError> {
        let _guard = self.init_guard.lock().await;
        if matches!(self.state(), ServiceState::Ready) {
            return Ok(());
        }
        self.load_locked().await.map(|_| ())
    }

    /// Persist an analysis, then try to embed its `source_text`.
    ///
    /// The record is kept even when encoding fails: the failure is logged and
    /// the id is returned with the embedding left empty.
    ///
    /// When `new.id` names a record that already exists, nothing is written
    /// over it. The stored record is embedded from its own `source_text` if
    /// the active model has not embedded it yet.
    pub async fn store_analysis_with_embedding(&self, new: NewAnalysis) -> Result<RecordId> {
        let mut source_text = new.source_text.clone();
        let Inserted { id, created } = self.store.insert(new).await?;

        let existing = if created {
            None
        } else {
            let record = self.store.get(id).await?.ok_or(Error::NotFound(id))?;
            source_text = record.source_text.clone();
            Some(record)
        };

        let encoder = match self.encoder().await {
            Ok(encoder) => encoder,
            Err(e) => {
                tracing::warn!(id, error = %e, "stored analysis without embedding");
                return Ok(id);
            }
        };
        if matches!(&existing, Some(record) if record.is_embedded_with(&encoder.active_model())) {
            tracing::debug!(id, "record already embedded by the active model");
            return Ok(id);
        }

        let model = encoder.model_name().to_string();
        let encoded = encode(encoder, vec![source_text])
            .await
            .and_then(|mut vectors| {
                vectors.pop().ok_or_else(|| {
                    EncoderError::EncodingFailed("encoder returned no vector".into())
                })
            });
        let vector = match encoded {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(id, error = %e, "stored analysis without embedding");
                return Ok(id);
            }
        };

        match self.store.update_embedding(id, &vector, &model).await {
            Ok(()) => {
                tracing::debug!(id, model = %model, "embedding attached");
                Ok(id)
            }
            Err(Error::NotFound(missing)) => {
                tracing::error!(id = missing, "record disappeared before its embedding was attached");
                Err(Error::NotFound(missing))
            }
            Err(e) => Err(e),
        }
    }

    /// Rank stored analyses by similarity to `query`.
    ///
    /// Only records embedded by the active model are considered. Results
    /// scoring below `min_score` are dropped; at most `top_k` are returned,
    /// best first.
    pub async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<SimilarityResult>> {
        if query.trim().is_empty() {
            return Err(Error::invalid("query text is empty"));
        }
        if top_k == 0 {
            return Err(Error::invalid("top_k must be at least 1"));
        }
        filter.validate()?;

        let encoder = self.encoder().await?;
        let model = encoder.active_model();
        let query_vec = encode(encoder, vec![query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EncoderError::EncodingFailed("encoder returned no vector".into()))?;

        let candidates = self.store.query_candidates(filter, &model).await?;
        let candidate_count = candidates.len();

        let ranker = Ranker::new(self.options.parallel_threshold);
        let results = rejoin(
            tokio::task::spawn_blocking(move || {
                ranker.rank_records(&query_vec, candidates, top_k, min_score)
            })
            .await,
        )
        .map_err(ranking_failed)??;

        tracing::debug!(
            model = %model.name,
            candidates = candidate_count,
            returned = results.len(),
            "search complete"
        );
        Ok(results)
    }

    /// Past analyses of one project and category similar to `text`, as a
    /// single block of text for prompt context.
    ///
    /// Matched `content` fields are joined in ranked order, separated by a
    /// blank line, at most `size` of them. Empty when nothing qualifies.
    pub async fn historical_context(
        &self,
        text: &str,
        project_id: &str,
        category: Category,
        size: usize,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::invalid("context text is empty"));
        }
        if size == 0 {
            return Ok(String::new());
        }
        let filter = SearchFilter::for_project(project_id).with_category(category);
        let results = self
            .search(text, &filter, size, self.options.context_min_score)
            .await?;
        Ok(results
            .into_iter()
            .map(|r| r.record.content)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Embed records that have no embedding from the active model.
    ///
    /// Records are encoded in batches of `batch_size`. A batch the encoder
    /// rejects is retried one record at a time so a single bad `source_text`
    /// only skips that record. An unavailable model aborts the backfill.
    pub async fn embed_pending(&self, limit: Option<usize>) -> Result<BackfillReport> {
        let encoder = self.encoder().await?;
        let model = encoder.active_model();
        let pending = self.store.pending_embeddings(&model, limit).await?;

        let mut report = BackfillReport {
            pending: pending.len(),
            ..BackfillReport::default()
        };
        if pending.is_empty() {
            tracing::info!(model = %model.name, "no records pending embedding");
            return Ok(report);
        }

        for batch in pending.chunks(self.options.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|r| r.source_text.clone()).collect();
            let vectors: Vec<Option<Vec<f32>>> = match encode(encoder.clone(), texts).await {
                Ok(vectors) => vectors.into_iter().map(Some).collect(),
                Err(e @ EncoderError::ModelUnavailable(_)) => return Err(e.into()),
                Err(e) => {
                    tracing::debug!(error = %e, "batch rejected, encoding records one by one");
                    self.encode_each(&encoder, batch).await?
                }
            };

            for (record, vector) in batch.iter().zip(vectors) {
                match vector {
                    Some(v) => {
                        self.store
                            .update_embedding(record.id, &v, &model.name)
                            .await?;
                        report.embedded += 1;
                    }
                    None => report.skipped += 1,
                }
            }
            tracing::info!(
                embedded = report.embedded,
                skipped = report.skipped,
                pending = report.pending,
                "embedding backfill progress"
            );
        }

        Ok(report)
    }

    /// Drop every stored embedding and re-embed all records with the active
    /// model.
    ///
    /// The encoder is loaded first, so an unavailable model leaves existing
    /// embeddings untouched.
    pub async fn rebuild_embeddings(&self) -> Result<BackfillReport> {
        self.encoder().await?;
        let cleared = self.store.clear_embeddings().await?;
        tracing::info!(cleared, "cleared embeddings for rebuild");
        self.embed_pending(None).await
    }

    async fn encode_each(
        &self,
        encoder: &Arc<dyn TextEncoder>,
        batch: &[AnalysisRecord],
    ) -> Result<Vec<Option<Vec<f32>>>> {
        let mut out = Vec::with_capacity(batch.len());
        for record in batch {
            match encode(encoder.clone(), vec![record.source_text.clone()]).await {
                Ok(mut v) => out.push(v.pop()),
                Err(e @ EncoderError::ModelUnavailable(_)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(id = record.id, error = %e, "skipping record that cannot be encoded");
                    out.push(None);
                }
            }
        }
        Ok(out)
    }

    /// The loaded encoder, loading it on first use.
    async fn encoder(&self) -> std::result::Result<Arc<dyn TextEncoder>, EncoderError> {
        if let Some(encoder) = self.ready_encoder() {
            return Ok(encoder);
        }

        let _guard = self.init_guard.lock().await;
        let current = self.read_slot(|slot| match slot {
            Slot::Ready(encoder) => Some(Ok(encoder.clone())),
            Slot::Failed(e) => Some(Err(e.clone())),
            // `Initializing` under the guard means an earlier load was
            // cancelled; start over.
            Slot::Uninitialized | Slot::Initializing => None,
        });
        match current {
            Some(result) => result,
            None => self.load_locked().await,
        }
    }

    fn ready_encoder(&self) -> Option<Arc<dyn TextEncoder>> {
        self.read_slot(|slot| match slot {
            Slot::Ready(encoder) => Some(encoder.clone()),
            _ => None,
        })
    }

    /// Run the loader. Caller must hold `init_guard`.
    async fn load_locked(&self) -> std::result::Result<Arc<dyn TextEncoder>, EncoderError> {
        self.set_slot(Slot::Initializing);
        tracing::info!("loading embedding model");

        match self.loader.load().await {
            Ok(encoder) => {
                tracing::info!(
                    model = encoder.model_name(),
                    dims = encoder.dims(),
                    max_tokens = encoder.max_tokens(),
                    "embedding model ready"
                );
                self.set_slot(Slot::Ready(encoder.clone()));
                Ok(encoder)
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding model failed to load");
                self.set_slot(Slot::Failed(e.clone()));
                Err(e)
            }
        }
    }

    fn read_slot<T>(&self, f: impl FnOnce(&Slot) -> T) -> T {
        let slot = self.slot.read().unwrap_or_else(|p| p.into_inner());
        f(&slot)
    }

    fn set_slot(&self, next: Slot) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *slot = next;
    }
}

async fn encode(
    encoder: Arc<dyn TextEncoder>,
    texts: Vec<String>,
) -> std::result::Result<Vec<Vec<f32>>, EncoderError> {
    rejoin(tokio::task::spawn_blocking(move || encoder.encode_batch(&texts)).await)
        .map_err(|e| EncoderError::EncodingFailed(format!("encoder task cancelled: {}", e)))?
}

fn ranking_failed(err: JoinError) -> Error {
    Error::Storage(StorageError::backend(err))
}

/// Re-raise a panic from a blocking task; surface cancellation as an error.
fn rejoin<T>(joined: std::result::Result<T, JoinError>) -> std::result::Result<T, JoinError> {
    match joined {
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        other => other,
    }
}

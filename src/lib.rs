//! # Semantic Recall
//!
//! Local semantic embedding and similarity search over analysis records.
//!
//! Every stored analysis is encoded from its source text into a fixed-length,
//! L2-normalized vector by a model that runs on this machine. Queries are
//! encoded the same way and ranked by cosine similarity against the records
//! of the active model, optionally narrowed by project, category, and date.
//!
//! ## Architecture
//!
//! ```text
//!               ┌──────────────────────┐
//!  caller ────▶ │   EmbeddingService   │ ────▶ ranked results
//!               └───┬──────────────┬───┘
//!                   │              │
//!          ┌────────▼─────┐  ┌─────▼────────┐
//!          │ TextEncoder  │  │ VectorStore  │
//!          │ fastembed /  │  │ SQLite (WAL) │
//!          │ tract / hash │  │ or in-memory │
//!          └──────────────┘  └──────┬───────┘
//!                                   │
//!                            ┌──────▼──────┐
//!                            │   Ranker    │
//!                            │ cosine+topK │
//!                            └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init
//! recall store --recording r1 --project acme --category financial \
//!     --content "Revenue up 12%." --text "Q3 revenue grew twelve percent..."
//! recall search "revenue growth" --project acme
//! recall embed pending
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`encoder`] | Local encoder backends |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`service`] | Embedding service orchestrator |
//! | [`store_cmd`], [`search`], [`get`] | `recall store`, `search`, `context`, `get` |
//! | [`embed_cmd`] | `recall embed pending` / `rebuild` |
//! | [`stats`] | `recall stats` |
//!
//! Data types, similarity ranking, and the store and encoder traits live in
//! [`semantic_recall_core`]; the commonly used ones are re-exported here.

pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod encoder;
pub mod get;
pub mod migrate;
pub mod search;
pub mod service;
pub mod sqlite_store;
pub mod stats;
pub mod store_cmd;

pub use semantic_recall_core::{
    ActiveModel, AnalysisRecord, Category, DateRange, EncoderError, Error, NewAnalysis, RecordId,
    SearchFilter, SimilarityResult, StorageError,
};

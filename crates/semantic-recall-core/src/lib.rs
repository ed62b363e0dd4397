//! # Semantic Recall Core
//!
//! Runtime-agnostic logic for Semantic Recall: analysis record models,
//! the embedding byte codec, similarity ranking, the vector store trait,
//! and the text encoder trait.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Concrete model
//! backends and the SQLite store live in the `semantic-recall` app crate.

pub mod embedding;
pub mod encoder;
pub mod error;
pub mod models;
pub mod similarity;
pub mod store;

pub use error::{EncoderError, Error, Result, StorageError};
pub use models::{
    ActiveModel, AnalysisRecord, Category, DateRange, NewAnalysis, RecordId, SearchFilter,
    SimilarityResult,
};

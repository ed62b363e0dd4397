//! Error taxonomy shared by the encoder, store, and service layers.
//!
//! Encoder failures are recoverable when storing an analysis (the record is
//! kept without an embedding) but fatal for a search. Storage failures always
//! propagate to the caller.

use thiserror::Error;

use crate::models::RecordId;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised while loading or running a text encoder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncoderError {
    /// Model weights or tokenizer could not be found or loaded.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    /// Input was accepted but the model could not produce a vector for it.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
    /// Caller error, e.g. empty text.
    #[error("invalid encoder input: {0}")]
    InvalidInput(String),
}

/// Failures raised by a [`VectorStore`](crate::store::VectorStore) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O, connection, or constraint failure in the backing database.
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A persisted row violates the record layout (bad blob length, bad category).
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: RecordId, reason: String },
}

impl StorageError {
    /// Wrap any backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageError::Backend(Box::new(err))
    }
}

/// Top-level error returned by store and service operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("analysis record {0} not found")]
    NotFound(RecordId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_error_converts() {
        let err: Error = EncoderError::ModelUnavailable("missing".into()).into();
        assert!(matches!(err, Error::Encoder(EncoderError::ModelUnavailable(_))));
        assert_eq!(err.to_string(), "embedding model unavailable: missing");
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: Error = StorageError::backend(io).into();
        assert!(matches!(err, Error::Storage(StorageError::Backend(_))));
        assert!(err.to_string().contains("disk full"));
    }
}

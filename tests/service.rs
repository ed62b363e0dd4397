//! Embedding service over a real SQLite store with the hashing encoder.

use std::sync::Arc;

use semantic_recall::config::{parse_config, Config};
use semantic_recall::service::{EmbeddingService, ServiceState};
use semantic_recall::sqlite_store::SqliteStore;
use semantic_recall::{migrate, Category, EncoderError, Error, NewAnalysis, SearchFilter};
use semantic_recall_core::encoder::{HashingEncoder, TextEncoder};
use semantic_recall_core::store::VectorStore;
use tempfile::TempDir;

fn config(tmp: &TempDir, encoder: &str) -> Config {
    parse_config(&format!(
        "[db]\npath = \"{}\"\n\n{}\n",
        tmp.path().join("recall.sqlite").display(),
        encoder
    ))
    .unwrap()
}

fn hashing(model: &str) -> String {
    format!("[encoder]\nbackend = \"hashing\"\nmodel = \"{}\"\ndims = 128\n", model)
}

async fn open(cfg: &Config) -> Arc<EmbeddingService<SqliteStore>> {
    let store = SqliteStore::connect(cfg).await.unwrap();
    migrate::migrate(store.pool()).await.unwrap();
    Arc::new(EmbeddingService::from_config(Arc::new(store), cfg))
}

fn analysis(project: &str, category: &str, content: &str, source: &str) -> NewAnalysis {
    NewAnalysis::new("rec-1", project, category, content, source)
}

#[tokio::test]
async fn test_graceful_degradation_without_model() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp, "[encoder]\nbackend = \"disabled\"\n");
    let service = open(&cfg).await;

    let id = service
        .store_analysis_with_embedding(analysis("p1", "summary", "s", "meeting recap"))
        .await
        .unwrap();

    let record = service.store().get(id).await.unwrap().unwrap();
    assert!(record.embedding.is_none());
    assert!(record.embedding_model.is_none());
    assert_eq!(service.state(), ServiceState::Failed);

    let err = service
        .search("meeting", &SearchFilter::default(), 3, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Encoder(EncoderError::ModelUnavailable(_))
    ));
}

#[tokio::test]
async fn test_model_isolation() {
    let tmp = TempDir::new().unwrap();

    let v1 = open(&config(&tmp, &hashing("hash-v1"))).await;
    v1.store_analysis_with_embedding(analysis("p1", "risk", "old", "currency exposure risk"))
        .await
        .unwrap();
    v1.store().pool().close().await;

    let v2 = open(&config(&tmp, &hashing("hash-v2"))).await;
    let new_id = v2
        .store_analysis_with_embedding(analysis("p1", "risk", "new", "currency exposure risk"))
        .await
        .unwrap();

    let hits = v2
        .search("currency exposure risk", &SearchFilter::default(), 10, -1.0)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, new_id);
    assert_eq!(hits[0].record.embedding_model.as_deref(), Some("hash-v2"));

    // The v1 record is pending for v2 until re-embedded.
    let report = v2.embed_pending(None).await.unwrap();
    assert_eq!(report.embedded, 1);
    let hits = v2
        .search("currency exposure risk", &SearchFilter::default(), 10, -1.0)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn test_search_ranking_threshold_and_filters() {
    let tmp = TempDir::new().unwrap();
    let service = open(&config(&tmp, &hashing("hash-v1"))).await;

    let exact = service
        .store_analysis_with_embedding(analysis(
            "p1",
            "financial",
            "exact",
            "operating margin expanded on lower freight costs",
        ))
        .await
        .unwrap();
    let partial = service
        .store_analysis_with_embedding(analysis(
            "p1",
            "financial",
            "partial",
            "operating margin expanded while hiring slowed across regions",
        ))
        .await
        .unwrap();
    service
        .store_analysis_with_embedding(analysis(
            "p1",
            "sentiment",
            "other category",
            "operating margin expanded on lower freight costs",
        ))
        .await
        .unwrap();

    let filter = SearchFilter::for_project("p1").with_category(Category::Financial);
    let hits = service
        .search(
            "operating margin expanded on lower freight costs",
            &filter,
            10,
            -1.0,
        )
        .await
        .unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.record.id).collect();
    assert_eq!(ids, vec![exact, partial]);
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert!(hits[0].score > hits[1].score);

    let above = service
        .search(
            "operating margin expanded on lower freight costs",
            &filter,
            10,
            0.999,
        )
        .await
        .unwrap();
    assert_eq!(above.len(), 1);

    let none = service
        .search(
            "operating margin",
            &SearchFilter::for_project("p-unknown"),
            10,
            -1.0,
        )
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let tmp = TempDir::new().unwrap();
    let service = open(&config(&tmp, &hashing("hash-v1"))).await;
    let err = service
        .search("", &SearchFilter::default(), 5, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_historical_context_respects_size() {
    let tmp = TempDir::new().unwrap();
    let service = open(&config(&tmp, &hashing("hash-v1"))).await;
    for (content, source) in [
        ("A", "customers praised onboarding speed"),
        ("B", "customers praised onboarding support"),
        ("C", "customers praised onboarding docs"),
    ] {
        service
            .store_analysis_with_embedding(analysis("p1", "sentiment", content, source))
            .await
            .unwrap();
    }

    let context = service
        .historical_context(
            "customers praised onboarding speed",
            "p1",
            Category::Sentiment,
            2,
        )
        .await
        .unwrap();
    let parts: Vec<&str> = context.split("\n\n").collect();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], "A");
}

#[tokio::test]
async fn test_reused_id_does_not_embed_new_text() {
    let tmp = TempDir::new().unwrap();
    let service = open(&config(&tmp, &hashing("hash-v1"))).await;

    let first = analysis("p1", "summary", "first", "alpha beta").with_id(7);
    let retry = analysis("p1", "summary", "second", "gamma delta").with_id(7);
    assert_eq!(service.store_analysis_with_embedding(first).await.unwrap(), 7);
    assert_eq!(service.store_analysis_with_embedding(retry).await.unwrap(), 7);

    let record = service.store().get(7).await.unwrap().unwrap();
    assert_eq!(record.source_text, "alpha beta");
    let encoder = HashingEncoder::new("hash-v1", 128, 256);
    assert_eq!(record.embedding, Some(encoder.encode("alpha beta").unwrap()));
    assert_ne!(record.embedding, Some(encoder.encode("gamma delta").unwrap()));
    assert_eq!(service.store().stats().await.unwrap().records, 1);
}

#[tokio::test]
async fn test_concurrent_store_and_search() {
    let tmp = TempDir::new().unwrap();
    let service = open(&config(&tmp, &hashing("hash-v1"))).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let writer = service.clone();
        handles.push(tokio::spawn(async move {
            writer
                .store_analysis_with_embedding(analysis(
                    "p1",
                    "themes",
                    &format!("theme {}", i),
                    &format!("recurring theme number {} about pricing", i),
                ))
                .await
                .map(|_| ())
        }));
        let reader = service.clone();
        handles.push(tokio::spawn(async move {
            reader
                .search("pricing theme", &SearchFilter::default(), 5, -1.0)
                .await
                .map(|hits| assert!(hits.len() <= 5))
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let stats = service.store().stats().await.unwrap();
    assert_eq!(stats.records, 16);
    assert_eq!(stats.embedded, 16);
}

//! Core data models: analysis records, search filters, and ranked results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

/// Identifier of a stored analysis record. Assigned monotonically by the store.
pub type RecordId = i64;

/// Kind of analysis a record holds.
///
/// Known kinds get their own variant; anything else round-trips through
/// [`Category::Custom`] so new analysis types need no code change.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Sentiment,
    Financial,
    Risk,
    Competitive,
    Summary,
    Themes,
    Custom(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Sentiment => "sentiment",
            Category::Financial => "financial",
            Category::Risk => "risk",
            Category::Competitive => "competitive",
            Category::Summary => "summary",
            Category::Themes => "themes",
            Category::Custom(name) => name,
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "sentiment" => Category::Sentiment,
            "financial" => Category::Financial,
            "risk" => Category::Risk,
            "competitive" => Category::Competitive,
            "summary" => Category::Summary,
            "themes" => Category::Themes,
            _ => Category::Custom(normalized),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from(value.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and output dimension of the encoder currently producing embeddings.
///
/// Only vectors tagged with the same model name are ever compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveModel {
    pub name: String,
    pub dims: usize,
}

impl ActiveModel {
    pub fn new(name: impl Into<String>, dims: usize) -> Self {
        Self {
            name: name.into(),
            dims,
        }
    }
}

/// An analysis submitted by a caller, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    /// Caller-supplied id; reusing an id makes a retried store idempotent.
    pub id: Option<RecordId>,
    pub recording_id: String,
    pub project_id: String,
    pub category: Category,
    pub content: String,
    pub source_text: String,
    /// Seconds since epoch. Defaults to "now" at insert time.
    pub created_at: Option<i64>,
    pub confidence_score: Option<f64>,
    pub processing_time_ms: Option<i64>,
}

impl NewAnalysis {
    pub fn new(
        recording_id: impl Into<String>,
        project_id: impl Into<String>,
        category: impl Into<Category>,
        content: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            recording_id: recording_id.into(),
            project_id: project_id.into(),
            category: category.into(),
            content: content.into(),
            source_text: source_text.into(),
            created_at: None,
            confidence_score: None,
            processing_time_ms: None,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_created_at(mut self, ts: i64) -> Self {
        self.created_at = Some(ts);
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(score);
        self
    }

    pub fn with_processing_time_ms(mut self, ms: i64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }
}

/// A persisted analysis record, optionally carrying its embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub id: RecordId,
    pub recording_id: String,
    pub project_id: String,
    pub category: Category,
    pub content: String,
    pub source_text: String,
    pub created_at: i64,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    pub confidence_score: Option<f64>,
    pub processing_time_ms: Option<i64>,
}

impl AnalysisRecord {
    /// Build a record from a submission once the store has picked an id and timestamp.
    pub fn from_new(id: RecordId, created_at: i64, new: NewAnalysis) -> Self {
        Self {
            id,
            recording_id: new.recording_id,
            project_id: new.project_id,
            category: new.category,
            content: new.content,
            source_text: new.source_text,
            created_at,
            embedding: None,
            embedding_model: None,
            confidence_score: new.confidence_score,
            processing_time_ms: new.processing_time_ms,
        }
    }

    /// True when the record has an embedding produced by `model`.
    pub fn is_embedded_with(&self, model: &ActiveModel) -> bool {
        self.embedding.is_some() && self.embedding_model.as_deref() == Some(model.name.as_str())
    }
}

/// Inclusive `created_at` window in seconds since epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts <= self.end
    }

    fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::invalid(format!(
                "date range start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Restricts which stored records are eligible for similarity scoring.
///
/// Every field is optional; an empty filter admits all records. A present but
/// empty `categories` set admits nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchFilter {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub categories: Option<BTreeSet<Category>>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

impl SearchFilter {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.categories
            .get_or_insert_with(BTreeSet::new)
            .insert(category.into());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(range) = &self.date_range {
            range.validate()?;
        }
        Ok(())
    }

    /// True when the filter can match nothing without touching storage.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(&self.categories, Some(set) if set.is_empty())
    }

    /// Evaluate the filter against a record (embedding state is not considered).
    pub fn matches(&self, record: &AnalysisRecord) -> bool {
        if let Some(project) = &self.project_id {
            if &record.project_id != project {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&record.category) {
                return false;
            }
        }
        if let Some(range) = &self.date_range {
            if !range.contains(record.created_at) {
                return false;
            }
        }
        true
    }
}

/// One ranked hit. Produced per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub record: AnalysisRecord,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(project: &str, category: Category, created_at: i64) -> AnalysisRecord {
        let new = NewAnalysis::new("rec-1", project, category, "content", "source");
        AnalysisRecord::from_new(1, created_at, new)
    }

    #[test]
    fn test_category_parse_known_and_custom() {
        assert_eq!(Category::from("Sentiment"), Category::Sentiment);
        assert_eq!(Category::from(" RISK "), Category::Risk);
        assert_eq!(
            Category::from("Churn"),
            Category::Custom("churn".to_string())
        );
        assert_eq!(Category::Custom("churn".into()).to_string(), "churn");
    }

    #[test]
    fn test_category_serde_as_string() {
        let json = serde_json::to_string(&Category::Financial).unwrap();
        assert_eq!(json, "\"financial\"");
        let back: Category = serde_json::from_str("\"themes\"").unwrap();
        assert_eq!(back, Category::Themes);
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::new(10, 5).is_err());
        let range = DateRange::new(5, 10).unwrap();
        assert!(range.contains(5));
        assert!(range.contains(10));
        assert!(!range.contains(11));
    }

    #[test]
    fn test_filter_matches() {
        let r = record("p1", Category::Risk, 100);
        assert!(SearchFilter::default().matches(&r));
        assert!(SearchFilter::for_project("p1").matches(&r));
        assert!(!SearchFilter::for_project("p2").matches(&r));
        assert!(SearchFilter::default()
            .with_category(Category::Risk)
            .with_category("sentiment")
            .matches(&r));
        assert!(!SearchFilter::default()
            .with_category(Category::Financial)
            .matches(&r));
        let window = DateRange::new(0, 50).unwrap();
        assert!(!SearchFilter::default().with_date_range(window).matches(&r));
    }

    #[test]
    fn test_filter_empty_categories_is_unsatisfiable() {
        let filter = SearchFilter {
            categories: Some(BTreeSet::new()),
            ..SearchFilter::default()
        };
        assert!(filter.is_unsatisfiable());
        assert!(!filter.matches(&record("p1", Category::Risk, 1)));
    }

    #[test]
    fn test_filter_rejects_unknown_fields() {
        let parsed: std::result::Result<SearchFilter, _> =
            serde_json::from_str(r#"{"project_id": "p1", "speaker": "alice"}"#);
        assert!(parsed.is_err());

        let parsed: SearchFilter =
            serde_json::from_str(r#"{"categories": ["risk", "Sentiment"]}"#).unwrap();
        let cats = parsed.categories.unwrap();
        assert!(cats.contains(&Category::Risk));
        assert!(cats.contains(&Category::Sentiment));
    }
}

//! `recall search` and `recall context`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;

use semantic_recall_core::{Category, DateRange, SearchFilter};

use crate::config::Config;
use crate::service::EmbeddingService;
use crate::sqlite_store::SqliteStore;

/// Filters and limits accepted by `recall search`.
#[derive(Debug, Default)]
pub struct SearchArgs {
    pub project: Option<String>,
    pub categories: Vec<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub since: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub until: Option<String>,
    pub limit: Option<usize>,
    pub min_score: Option<f32>,
    pub json: bool,
}

/// Start of `date` (UTC) in seconds, or its last second when `end_of_day`.
fn parse_date(value: &str, end_of_day: bool) -> Result<i64> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc().timestamp())
        .with_context(|| format!("Invalid date '{}'", value))
}

pub fn build_filter(args: &SearchArgs) -> Result<SearchFilter> {
    let mut filter = SearchFilter {
        project_id: args.project.clone(),
        ..SearchFilter::default()
    };

    if !args.categories.is_empty() {
        let set: BTreeSet<Category> = args
            .categories
            .iter()
            .map(|c| Category::from(c.as_str()))
            .collect();
        filter.categories = Some(set);
    }

    if args.since.is_some() || args.until.is_some() {
        let start = args
            .since
            .as_deref()
            .map(|s| parse_date(s, false))
            .transpose()?
            .unwrap_or(i64::MIN);
        let end = args
            .until
            .as_deref()
            .map(|s| parse_date(s, true))
            .transpose()?
            .unwrap_or(i64::MAX);
        filter.date_range = Some(DateRange::new(start, end)?);
    }

    Ok(filter)
}

pub async fn run_search(config: &Config, query: &str, args: SearchArgs) -> Result<()> {
    if !config.encoder.is_enabled() {
        bail!("Semantic search requires an encoder. Set [encoder] backend in config.");
    }
    let filter = build_filter(&args)?;
    let top_k = args.limit.unwrap_or(config.search.default_top_k);
    let min_score = args.min_score.unwrap_or(config.search.min_score);

    let store = SqliteStore::connect(config).await?;
    let service = EmbeddingService::from_config(Arc::new(store), config);
    let results = service.search(query, &filter, top_k, min_score).await?;
    service.store().pool().close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        let record = &hit.record;
        let date = chrono::DateTime::from_timestamp(record.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        println!(
            "{}. [{:.3}] {} / {}",
            i + 1,
            hit.score,
            record.project_id,
            record.category
        );
        println!("    created: {}", date);
        println!("    recording: {}", record.recording_id);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&record.content, 160).replace('\n', " ").trim()
        );
        println!("    id: {}", record.id);
        println!();
    }

    Ok(())
}

pub async fn run_context(
    config: &Config,
    text: &str,
    project: &str,
    category: &str,
    size: Option<usize>,
) -> Result<()> {
    if !config.encoder.is_enabled() {
        bail!("Historical context requires an encoder. Set [encoder] backend in config.");
    }
    let size = size.unwrap_or(config.search.context_size);

    let store = SqliteStore::connect(config).await?;
    let service = EmbeddingService::from_config(Arc::new(store), config);
    let context = service
        .historical_context(text, project, Category::from(category), size)
        .await?;
    service.store().pool().close().await;

    if context.is_empty() {
        println!("No historical context.");
    } else {
        println!("{}", context);
    }
    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_empty() {
        let filter = build_filter(&SearchArgs::default()).unwrap();
        assert_eq!(filter, SearchFilter::default());
    }

    #[test]
    fn test_build_filter_dates_are_inclusive_days() {
        let args = SearchArgs {
            project: Some("p1".into()),
            categories: vec!["Risk".into(), "summary".into()],
            since: Some("2024-01-01".into()),
            until: Some("2024-01-31".into()),
            ..SearchArgs::default()
        };
        let filter = build_filter(&args).unwrap();
        let range = filter.date_range.unwrap();
        assert_eq!(range.start, 1_704_067_200);
        assert_eq!(range.end, 1_706_745_599);

        let categories = filter.categories.unwrap();
        assert!(categories.contains(&Category::Risk));
        assert!(categories.contains(&Category::Summary));
        assert_eq!(filter.project_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_build_filter_open_ended_range() {
        let args = SearchArgs {
            since: Some("2024-01-01".into()),
            ..SearchArgs::default()
        };
        let range = build_filter(&args).unwrap().date_range.unwrap();
        assert_eq!(range.end, i64::MAX);
    }

    #[test]
    fn test_build_filter_rejects_bad_dates() {
        let bad_format = SearchArgs {
            since: Some("01/02/2024".into()),
            ..SearchArgs::default()
        };
        assert!(build_filter(&bad_format).is_err());

        let inverted = SearchArgs {
            since: Some("2024-02-01".into()),
            until: Some("2024-01-01".into()),
            ..SearchArgs::default()
        };
        assert!(build_filter(&inverted).is_err());
    }

    #[test]
    fn test_excerpt_cuts_on_char_boundary() {
        assert_eq!(excerpt("héllo wörld", 5), "héllo…");
        assert_eq!(excerpt("short", 10), "short");
    }
}

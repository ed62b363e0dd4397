use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn recall_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_recall"))
}

fn write_config(root: &Path, encoder: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/recall.sqlite"

{}

[search]
default_top_k = 5
min_score = 0.1
context_size = 2
"#,
        root.display(),
        encoder
    );

    let config_path = config_dir.join("recall.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

const HASHING: &str = r#"[encoder]
backend = "hashing"
model = "feature-hash-v1"
dims = 256"#;

const DISABLED: &str = r#"[encoder]
backend = "disabled""#;

fn setup_test_env(encoder: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), encoder);
    (tmp, config_path)
}

fn run_recall(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = recall_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run recall binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn store(config_path: &Path, project: &str, category: &str, content: &str, text: &str) -> String {
    let (stdout, stderr, success) = run_recall(
        config_path,
        &[
            "store",
            "--recording",
            "rec-1",
            "--project",
            project,
            "--category",
            category,
            "--content",
            content,
            "--text",
            text,
        ],
    );
    assert!(success, "store failed: {}", stderr);
    stdout
}

fn seed(config_path: &Path) {
    let (_, stderr, success) = run_recall(config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    store(
        config_path,
        "acme",
        "financial",
        "Revenue grew twelve percent.",
        "quarterly revenue growth exceeded guidance on strong subscription sales",
    );
    store(
        config_path,
        "acme",
        "risk",
        "Supplier concentration risk.",
        "a single supplier provides most components creating supply chain risk",
    );
    store(
        config_path,
        "globex",
        "financial",
        "Globex revenue flat.",
        "quarterly revenue growth exceeded guidance on strong subscription sales",
    );
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config) = setup_test_env(HASHING);
    for _ in 0..2 {
        let (stdout, stderr, success) = run_recall(&config, &["init"]);
        assert!(success, "init failed: {}", stderr);
        assert!(stdout.contains("Database initialized successfully."));
    }
}

#[test]
fn test_store_embeds_with_configured_model() {
    let (_tmp, config) = setup_test_env(HASHING);
    run_recall(&config, &["init"]);
    let stdout = store(&config, "acme", "summary", "Summary.", "call went well");
    assert!(stdout.contains("stored analysis 1"));
    assert!(stdout.contains("embedding: feature-hash-v1"));
}

#[test]
fn test_search_ranks_and_filters_by_project() {
    let (_tmp, config) = setup_test_env(HASHING);
    seed(&config);

    let (stdout, stderr, success) = run_recall(
        &config,
        &[
            "search",
            "quarterly revenue growth exceeded guidance",
            "--project",
            "acme",
            "--json",
        ],
    );
    assert!(success, "search failed: {}", stderr);

    let hits: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let hits = hits.as_array().unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0]["record"]["content"], "Revenue grew twelve percent.");
    assert!(hits
        .iter()
        .all(|h| h["record"]["project_id"] == "acme"));
    assert!(hits[0]["record"].get("embedding").is_none());
}

#[test]
fn test_search_category_filter() {
    let (_tmp, config) = setup_test_env(HASHING);
    seed(&config);

    let (stdout, _, success) = run_recall(
        &config,
        &[
            "search",
            "quarterly revenue growth",
            "--category",
            "risk",
            "--min-score=-1",
            "--json",
        ],
    );
    assert!(success);
    let hits: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["record"]["category"], "risk");
}

#[test]
fn test_empty_query_is_rejected() {
    let (_tmp, config) = setup_test_env(HASHING);
    seed(&config);
    let (_, stderr, success) = run_recall(&config, &["search", "   "]);
    assert!(!success);
    assert!(stderr.contains("query text is empty"), "stderr: {}", stderr);
}

#[test]
fn test_context_prints_matching_content() {
    let (_tmp, config) = setup_test_env(HASHING);
    seed(&config);

    let (stdout, stderr, success) = run_recall(
        &config,
        &[
            "context",
            "subscription sales drove quarterly revenue growth",
            "--project",
            "acme",
            "--category",
            "financial",
        ],
    );
    assert!(success, "context failed: {}", stderr);
    assert!(stdout.contains("Revenue grew twelve percent."));
    assert!(!stdout.contains("Globex"));
}

#[test]
fn test_disabled_encoder_still_stores_then_backfills() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), DISABLED);
    run_recall(&config, &["init"]);

    let stdout = store(&config, "acme", "themes", "Themes.", "pricing and churn");
    assert!(stdout.contains("stored analysis 1"));
    assert!(stdout.contains("embedding: none"));

    let (_, stderr, success) = run_recall(&config, &["search", "pricing"]);
    assert!(!success);
    assert!(stderr.contains("requires an encoder"));

    // Same database, encoder now available.
    let config = write_config(tmp.path(), HASHING);
    let (stdout, stderr, success) = run_recall(&config, &["embed", "pending"]);
    assert!(success, "embed pending failed: {}", stderr);
    assert!(stdout.contains("embedded: 1"));

    let (stdout, _, _) = run_recall(&config, &["stats"]);
    assert!(stdout.contains("Analyses:    1"));
    assert!(stdout.contains("feature-hash-v1"));
}

#[test]
fn test_embed_rebuild_and_get() {
    let (_tmp, config) = setup_test_env(HASHING);
    seed(&config);

    let (stdout, stderr, success) = run_recall(&config, &["embed", "rebuild"]);
    assert!(success, "rebuild failed: {}", stderr);
    assert!(stdout.contains("embedded: 3"));

    let (stdout, _, success) = run_recall(&config, &["get", "2"]);
    assert!(success);
    assert!(stdout.contains("Supplier concentration risk."));
    assert!(stdout.contains("embedding:    feature-hash-v1 (256 dims)"));

    let (_, stderr, success) = run_recall(&config, &["get", "99"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config) = setup_test_env(
        r#"[encoder]
backend = "hashing"
model = "feature-hash-v1""#,
    );
    let (_, stderr, success) = run_recall(&config, &["init"]);
    assert!(!success);
    assert!(stderr.contains("dims"), "stderr: {}", stderr);
}

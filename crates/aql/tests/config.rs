//! Tests for loading compiler configuration from files
//!
//! Covers:
//! - Full and partial JSON configuration files
//! - Read and validation errors with the file as context

use aql::diagnostics::{AQL0400, AQL0401};
use aql::{AqlCompiler, CompilerConfig, FetchPrecedence, QueryRequest};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

#[test]
fn test_from_file() {
    let file = config_file(
        r#"{
            "default_limit": 50,
            "max_limit": 500,
            "max_fetch": 100,
            "fetch_precedence": "MIN_FETCH",
            "system_id": "test.example.org",
            "known_templates_only": true
        }"#,
    );
    let config = CompilerConfig::from_file(file.path()).unwrap();
    assert_eq!(
        config,
        CompilerConfig::default()
            .with_default_limit(50)
            .with_max_limit(500)
            .with_max_fetch(100)
            .with_fetch_precedence(FetchPrecedence::MinFetch)
            .with_system_id("test.example.org")
            .with_known_templates_only(true)
    );
}

#[test]
fn test_configured_system_id_is_bound() {
    let file = config_file(r#"{"system_id": "test.example.org"}"#);
    let config = CompilerConfig::from_file(file.path()).unwrap();
    let compiled = AqlCompiler::new(config, std::sync::Arc::new(aql::model::InMemoryKnowledgeCache::new()))
        .unwrap()
        .compile("SELECT c/uid/value FROM COMPOSITION c", &QueryRequest::new())
        .unwrap();
    assert_eq!(
        compiled.params.first(),
        Some(&aql::asl::SqlValue::Text("test.example.org".to_string()))
    );
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = CompilerConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert_eq!(err.code(), AQL0401);
}

#[test]
fn test_invalid_file_names_path() {
    let file = config_file(r#"{"default_limit": 10, "max_limit": 5}"#);
    let err = CompilerConfig::from_file(file.path()).unwrap_err();
    assert_eq!(err.code(), AQL0400);
    let help = err.to_diagnostic().help.unwrap_or_default();
    assert_eq!(help, file.path().display().to_string());
}

//! Tests for CLI module

use super::*;
use crate::logger::{Secrets, MASK};
use crate::protocol::{Message, Status, VecSink};
use crate::types::LogLevel;
use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn connector_yaml(base_url: &str) -> String {
    format!(
        r#"
name: widgets
base_url: "{base_url}"
spec:
  properties:
    api_key: {{ type: string, secret: true, required: true }}
auth: {{ type: bearer, token: "{{{{ config.api_key }}}}" }}
check: {{ path: /ping }}
streams:
  - name: widgets
    path: /widgets
    params:
      since: "{{{{ state.updated }}}}"
    incremental:
      cursor_field: updated
  - name: colors
    path: /colors
"#
    )
}

fn write_connector(dir: &TempDir, base_url: &str) -> String {
    let path = dir.path().join("connector.yaml");
    std::fs::write(&path, connector_yaml(base_url)).unwrap();
    path.display().to_string()
}

async fn run(args: &[&str]) -> (crate::Result<()>, Vec<Message>) {
    let mut argv = vec!["relay-cdk"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();

    let runner = Runner::new(cli, Secrets::default());
    let mut sink = VecSink::new();
    let result = runner.run_with_sink(&mut sink).await;
    (result, sink.into_messages())
}

fn logs(messages: &[Message]) -> Vec<(LogLevel, String)> {
    messages
        .iter()
        .filter_map(Message::as_log)
        .map(|log| (log.level, log.message.clone()))
        .collect()
}

// ============================================================================
// Argument Parsing Tests
// ============================================================================

#[test]
fn test_parse_read_flags() {
    let cli = Cli::try_parse_from([
        "relay-cdk",
        "read",
        "-c",
        "connector.yaml",
        "--streams",
        "widgets,colors",
        "--checkpoint-interval",
        "0",
        "--state-json",
        "{}",
    ])
    .unwrap();

    assert_eq!(cli.connector.as_deref(), Some(Path::new("connector.yaml")));
    assert_eq!(cli.state_json.as_deref(), Some("{}"));
    match cli.command {
        Commands::Read {
            catalog,
            streams,
            checkpoint_interval,
        } => {
            assert!(catalog.is_none());
            assert_eq!(streams, vec!["widgets".to_string(), "colors".to_string()]);
            assert_eq!(checkpoint_interval, 0);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_defaults() {
    let cli = Cli::try_parse_from(["relay-cdk", "read"]).unwrap();
    assert_eq!(cli.format, OutputFormat::Json);
    assert!(!cli.verbose);
    assert!(matches!(
        cli.command,
        Commands::Read {
            checkpoint_interval: 100,
            ..
        }
    ));
}

#[test]
fn test_parse_rejects_unknown_format() {
    assert!(Cli::try_parse_from(["relay-cdk", "-f", "xml", "check"]).is_err());
}

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test]
async fn test_validate_reports_streams() {
    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, "https://api.example.com");

    let (result, messages) = run(&["-c", &connector, "validate"]).await;

    assert!(result.is_ok());
    assert_eq!(
        logs(&messages),
        vec![(
            LogLevel::Info,
            "Connector 'widgets' v0.1.0 is valid with 2 streams".to_string()
        )]
    );
}

#[tokio::test]
async fn test_missing_connector_is_fatal() {
    let (result, messages) = run(&["discover"]).await;

    assert!(result.is_err());
    let logs = logs(&messages);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].0, LogLevel::Fatal);
    assert!(logs[0].1.contains("Connector file not specified"));
}

#[tokio::test]
async fn test_discover_emits_catalog() {
    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, "https://api.example.com");

    let (result, messages) =
        run(&["-c", &connector, "--config-json", r#"{"api_key":"k"}"#, "discover"]).await;

    assert!(result.is_ok());
    match &messages[..] {
        [Message::Catalog { catalog }] => {
            let names: Vec<_> = catalog.streams.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["widgets", "colors"]);
            assert!(catalog.streams[0].supports_incremental());
        }
        other => panic!("unexpected messages: {other:?}"),
    }
}

#[tokio::test]
async fn test_check_reads_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("Authorization", "Bearer from-file"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, &server.uri());
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"api_key": "from-file"}"#).unwrap();

    let (result, messages) = run(&[
        "-c",
        &connector,
        "-C",
        &config.display().to_string(),
        "check",
    ])
    .await;

    assert!(result.is_ok());
    match &messages[..] {
        [Message::ConnectionStatus { connection_status }] => {
            assert_eq!(connection_status.status, Status::Succeeded);
        }
        other => panic!("unexpected messages: {other:?}"),
    }
}

#[tokio::test]
async fn test_check_failure_is_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, &server.uri());

    let (result, messages) =
        run(&["-c", &connector, "--config-json", r#"{"api_key":"k"}"#, "check"]).await;

    assert!(result.is_ok());
    match &messages[..] {
        [Message::ConnectionStatus { connection_status }] => {
            assert_eq!(connection_status.status, Status::Failed);
        }
        other => panic!("unexpected messages: {other:?}"),
    }
}

#[tokio::test]
async fn test_read_resumes_from_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets"))
        .and(query_param("since", "2024-01-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "updated": "2024-01-03"},
            {"id": 4, "updated": "2024-01-04"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, &server.uri());

    let (result, messages) = run(&[
        "-c",
        &connector,
        "--config-json",
        r#"{"api_key":"k"}"#,
        "--state-json",
        r#"{"widgets": {"updated": "2024-01-02"}}"#,
        "read",
        "--streams",
        "widgets",
    ])
    .await;

    assert!(result.is_ok());
    let records: Vec<_> = messages.iter().filter_map(Message::as_record).collect();
    assert_eq!(records.len(), 2);
    let states: Vec<_> = messages.iter().filter_map(Message::as_state).collect();
    assert_eq!(states.len(), 1);
    assert_eq!(
        states[0].cursor_for("widgets"),
        json!({"updated": "2024-01-04"}).as_object()
    );
}

#[tokio::test]
async fn test_secrets_registered_when_config_is_incomplete() {
    let dir = TempDir::new().unwrap();
    let connector = dir.path().join("connector.yaml");
    std::fs::write(
        &connector,
        r#"
name: regional
base_url: "https://{{ config.region }}.example.com"
spec:
  properties:
    region: { type: string, required: true }
    api_key: { type: string, secret: true, required: true }
streams:
  - name: items
    path: /items
"#,
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "relay-cdk",
        "-c",
        &connector.display().to_string(),
        "--config-json",
        r#"{"api_key":"sk_live_77"}"#,
        "discover",
    ])
    .unwrap();
    let secrets = Secrets::default();
    let runner = Runner::new(cli, secrets.clone());
    let mut sink = VecSink::new();

    let result = runner.run_with_sink(&mut sink).await;

    assert!(matches!(result, Err(crate::Error::MissingConfigField { .. })));
    assert_eq!(secrets.snapshot(), vec!["sk_live_77".to_string()]);
}

#[tokio::test]
async fn test_bad_catalog_file_reports_its_cause() {
    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, "https://api.example.com");
    let catalog = dir.path().join("catalog.json");
    std::fs::write(&catalog, "{\"streams\": [").unwrap();

    let (result, messages) = run(&[
        "-c",
        &connector,
        "--config-json",
        r#"{"api_key":"k"}"#,
        "read",
        "--catalog",
        &catalog.display().to_string(),
    ])
    .await;

    assert!(matches!(result, Err(crate::Error::Context { .. })));
    let logs = logs(&messages);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].0, LogLevel::Fatal);
    assert!(logs[0].1.starts_with("Invalid catalog JSON in '"));
    assert!(logs[0].1.contains("caused by: Failed to parse JSON"));
}

#[tokio::test]
async fn test_read_unknown_stream_is_fatal() {
    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, "https://api.example.com");

    let (result, messages) = run(&[
        "-c",
        &connector,
        "--config-json",
        r#"{"api_key":"k"}"#,
        "read",
        "--streams",
        "gadgets",
    ])
    .await;

    assert!(matches!(result, Err(crate::Error::StreamNotFound { .. })));
    assert_eq!(
        logs(&messages),
        vec![(
            LogLevel::Fatal,
            "Stream 'gadgets' not found in source".to_string()
        )]
    );
}

#[tokio::test]
async fn test_read_failure_masks_secrets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/colors"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad key sk_live_42"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let connector = write_connector(&dir, &server.uri());

    let (result, messages) = run(&[
        "-c",
        &connector,
        "--config-json",
        r#"{"api_key":"sk_live_42"}"#,
        "read",
        "--streams",
        "colors",
    ])
    .await;

    assert!(result.is_err());
    let logs = logs(&messages);
    let (level, error) = &logs[logs.len() - 2];
    assert_eq!(*level, LogLevel::Error);
    assert!(error.starts_with("Encountered an error while reading stream colors"));
    assert!(error.contains(&format!("bad key {MASK}")));

    let (level, fatal) = &logs[logs.len() - 1];
    assert_eq!(*level, LogLevel::Fatal);
    assert!(!fatal.contains("sk_live_42"));
}

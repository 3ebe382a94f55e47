//! Tests for engine module

use super::*;
use crate::connector::CheckResult;
use crate::logger::Secrets;
use crate::protocol::{CatalogStream, Status, VecSink};
use crate::stream::{max_cursor_state, CursorField, DataStream, RecordStream};
use crate::types::LogLevel;
use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// ============================================================================
// Test Streams
// ============================================================================

fn record(seq: u64) -> JsonObject {
    let mut record = JsonObject::new();
    record.insert("id".to_string(), json!(format!("r{seq}")));
    record.insert("seq".to_string(), json!(seq));
    record
}

fn seq_state(seq: u64) -> JsonObject {
    let mut state = JsonObject::new();
    state.insert("seq".to_string(), json!(seq));
    state
}

/// Incremental stream yielding `count` records after the stored `seq`
struct Sequence {
    name: &'static str,
    count: u64,
    continuous: bool,
}

impl DataStream for Sequence {
    fn name(&self) -> &str {
        self.name
    }

    fn read_records(&self, state: JsonObject) -> RecordStream<'_> {
        let start = state.get("seq").and_then(JsonValue::as_u64).unwrap_or(0);
        futures::stream::iter((start + 1..=start + self.count).map(|seq| Ok(record(seq)))).boxed()
    }
}

impl IncrementalStream for Sequence {
    fn cursor_field(&self) -> CursorField {
        CursorField::from("seq")
    }

    fn continuously_save_state(&self) -> bool {
        self.continuous
    }

    fn get_updated_state(&self, current: JsonObject, latest: &JsonObject) -> Result<JsonObject> {
        Ok(max_cursor_state(&self.cursor_field(), current, latest))
    }
}

/// Full-refresh stream; records reflect whatever state it was handed
struct Snapshot {
    name: &'static str,
    count: u64,
}

impl DataStream for Snapshot {
    fn name(&self) -> &str {
        self.name
    }

    fn read_records(&self, state: JsonObject) -> RecordStream<'_> {
        let start = state.get("seq").and_then(JsonValue::as_u64).unwrap_or(0);
        futures::stream::iter((start + 1..=start + self.count).map(|seq| Ok(record(seq)))).boxed()
    }
}

/// Yields `before_failure` records, then an error with a cause chain
struct Exploding {
    name: &'static str,
    before_failure: u64,
}

impl DataStream for Exploding {
    fn name(&self) -> &str {
        self.name
    }

    fn read_records(&self, _state: JsonObject) -> RecordStream<'_> {
        let good = (1..=self.before_failure).map(|seq| Ok(record(seq)));
        let bad = std::iter::once(Err(Error::from(
            anyhow::anyhow!("socket reset by peer").context("fetching page with key sk_live_abc"),
        )));
        futures::stream::iter(good.chain(bad)).boxed()
    }
}

/// Incremental stream whose cursor can never be folded
struct StuckCursor {
    name: &'static str,
    count: u64,
}

impl DataStream for StuckCursor {
    fn name(&self) -> &str {
        self.name
    }

    fn read_records(&self, _state: JsonObject) -> RecordStream<'_> {
        futures::stream::iter((1..=self.count).map(|seq| Ok(record(seq)))).boxed()
    }
}

impl IncrementalStream for StuckCursor {
    fn cursor_field(&self) -> CursorField {
        CursorField::from("seq")
    }

    fn get_updated_state(&self, _current: JsonObject, _latest: &JsonObject) -> Result<JsonObject> {
        Err(Error::state("cursor 'seq' is not comparable"))
    }
}

/// Panics while producing record number `panic_at`
struct Panicking {
    name: &'static str,
    panic_at: u64,
}

impl DataStream for Panicking {
    fn name(&self) -> &str {
        self.name
    }

    fn read_records(&self, _state: JsonObject) -> RecordStream<'_> {
        let panic_at = self.panic_at;
        futures::stream::iter(1..=panic_at + 1)
            .map(move |seq| {
                if seq == panic_at {
                    panic!("record {seq} is corrupt");
                }
                Ok(record(seq))
            })
            .boxed()
    }
}

/// Counts every record it hands out
struct Counted {
    count: u64,
    produced: Arc<AtomicU64>,
}

impl DataStream for Counted {
    fn name(&self) -> &str {
        "events"
    }

    fn read_records(&self, _state: JsonObject) -> RecordStream<'_> {
        let produced = self.produced.clone();
        futures::stream::iter(1..=self.count)
            .map(move |seq| {
                produced.fetch_add(1, Ordering::SeqCst);
                Ok(record(seq))
            })
            .boxed()
    }
}

/// Source over a single [`Counted`] stream
struct CountingSource {
    produced: Arc<AtomicU64>,
}

#[async_trait]
impl Source for CountingSource {
    fn name(&self) -> &str {
        "counting-source"
    }

    async fn check_connection(&self, _config: &JsonValue) -> Result<CheckResult> {
        Ok(CheckResult::success())
    }

    fn streams(&self, _config: &JsonValue) -> Result<Vec<SourceStream>> {
        Ok(vec![SourceStream::plain(Counted {
            count: 250,
            produced: self.produced.clone(),
        })])
    }
}

enum CheckBehavior {
    Pass,
    Fail(&'static str),
    Fault,
}

struct TestSource {
    build: fn() -> Vec<SourceStream>,
    check: CheckBehavior,
}

impl TestSource {
    fn new(build: fn() -> Vec<SourceStream>) -> Self {
        Self {
            build,
            check: CheckBehavior::Pass,
        }
    }
}

#[async_trait]
impl Source for TestSource {
    fn name(&self) -> &str {
        "test-source"
    }

    async fn check_connection(&self, _config: &JsonValue) -> Result<CheckResult> {
        match self.check {
            CheckBehavior::Pass => Ok(CheckResult::success()),
            CheckBehavior::Fail(message) => Ok(CheckResult::failure(message)),
            CheckBehavior::Fault => Err(Error::from(anyhow::anyhow!(
                "dns lookup failed for api.example.com?key=sk_live_abc"
            ))),
        }
    }

    fn streams(&self, _config: &JsonValue) -> Result<Vec<SourceStream>> {
        Ok((self.build)())
    }
}

fn engine(build: fn() -> Vec<SourceStream>) -> SyncEngine<TestSource> {
    SyncEngine::new(TestSource::new(build), RedactingFormatter::default())
}

fn configured(name: &str, sync_mode: SyncMode) -> ConfiguredStream {
    ConfiguredStream {
        stream: CatalogStream {
            name: name.to_string(),
            json_schema: json!({}),
            supported_sync_modes: vec![SyncMode::FullRefresh, SyncMode::Incremental],
            source_defined_cursor: None,
            default_cursor_field: None,
        },
        sync_mode,
        cursor_field: None,
    }
}

fn catalog(streams: &[(&str, SyncMode)]) -> ConfiguredCatalog {
    ConfiguredCatalog {
        streams: streams
            .iter()
            .map(|(name, mode)| configured(name, *mode))
            .collect(),
    }
}

fn states(messages: &[Message]) -> Vec<SyncState> {
    messages.iter().filter_map(Message::as_state).cloned().collect()
}

fn records_of<'a>(messages: &'a [Message], stream: &str) -> Vec<&'a JsonObject> {
    messages
        .iter()
        .filter_map(Message::as_record)
        .filter(|r| r.stream == stream)
        .map(|r| &r.data)
        .collect()
}

fn logs(messages: &[Message]) -> Vec<(LogLevel, String)> {
    messages
        .iter()
        .filter_map(Message::as_log)
        .map(|l| (l.level, l.message.clone()))
        .collect()
}

async fn run(
    engine: &SyncEngine<TestSource>,
    catalog: &ConfiguredCatalog,
    state: Option<&SyncState>,
) -> (Result<ReadOutcome>, Vec<Message>) {
    let mut sink = VecSink::new();
    let result = engine.read(&json!({}), catalog, state, &mut sink).await;
    (result, sink.into_messages())
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_sync_config_default_interval() {
    assert_eq!(SyncConfig::default().checkpoint.interval(), 100);
    assert_eq!(
        SyncConfig::new()
            .with_checkpoint_interval(0)
            .checkpoint
            .interval(),
        0
    );
}

#[test]
fn test_sync_stats_mutations() {
    let mut stats = SyncStats::new();
    stats.add_record();
    stats.add_record();
    stats.add_state_message();
    stats.add_stream();
    stats.set_duration(1500);

    assert_eq!(stats.records_synced, 2);
    assert_eq!(stats.state_messages, 1);
    assert_eq!(stats.streams_synced, 1);
    assert_eq!(stats.duration_ms, 1500);
}

// ============================================================================
// Discover / Check Tests
// ============================================================================

fn mixed_streams() -> Vec<SourceStream> {
    vec![
        SourceStream::incremental(Sequence {
            name: "events",
            count: 3,
            continuous: false,
        }),
        SourceStream::plain(Snapshot {
            name: "users",
            count: 2,
        }),
    ]
}

#[test]
fn test_discover_describes_streams_in_order() {
    let engine = engine(mixed_streams);
    let catalog = engine.discover(&json!({})).unwrap();

    let names: Vec<_> = catalog.streams.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["events", "users"]);

    let events = catalog.get("events").unwrap();
    assert!(events.supports_incremental());
    assert_eq!(events.source_defined_cursor, Some(true));
    assert_eq!(events.default_cursor_field, Some(vec!["seq".to_string()]));

    let users = catalog.get("users").unwrap();
    assert_eq!(users.supported_sync_modes, vec![SyncMode::FullRefresh]);
    assert_eq!(users.default_cursor_field, None);
}

#[test]
fn test_discover_is_deterministic() {
    let engine = engine(mixed_streams);
    assert_eq!(
        engine.discover(&json!({})).unwrap(),
        engine.discover(&json!({})).unwrap()
    );
}

#[tokio::test]
async fn test_check_failed_is_status_not_error() {
    let mut source = TestSource::new(mixed_streams);
    source.check = CheckBehavior::Fail("bad password");
    let engine = SyncEngine::new(source, RedactingFormatter::default());

    let status = engine.check(&json!({})).await.unwrap();
    assert_eq!(status.status, Status::Failed);
    assert_eq!(status.message.as_deref(), Some("bad password"));
}

#[tokio::test]
async fn test_check_succeeded_has_no_message() {
    let status = engine(mixed_streams).check(&json!({})).await.unwrap();
    assert_eq!(status, ConnectionStatus::succeeded());
}

#[tokio::test]
async fn test_check_fault_is_error() {
    let mut source = TestSource::new(mixed_streams);
    source.check = CheckBehavior::Fault;
    let engine = SyncEngine::new(source, RedactingFormatter::default());

    let err = engine.check(&json!({})).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionCheck { ref message } if message.contains("dns lookup failed")));
}

#[tokio::test]
async fn test_check_messages_are_redacted() {
    let secrets = Secrets::new(["sk_live_abc"]);

    let mut source = TestSource::new(mixed_streams);
    source.check = CheckBehavior::Fail("GET /ping?api_key=sk_live_abc: connection refused");
    let engine = SyncEngine::new(source, RedactingFormatter::new(secrets.clone()));
    let status = engine.check(&json!({})).await.unwrap();
    assert_eq!(status.status, Status::Failed);
    assert_eq!(
        status.message.as_deref(),
        Some("GET /ping?api_key=****: connection refused")
    );

    let mut source = TestSource::new(mixed_streams);
    source.check = CheckBehavior::Fault;
    let engine = SyncEngine::new(source, RedactingFormatter::new(secrets));
    let err = engine.check(&json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ConnectionCheck { ref message } if message.ends_with("key=****")
    ));
    assert!(!err.to_string().contains("sk_live_abc"));
}

// ============================================================================
// Read Tests
// ============================================================================

#[tokio::test]
async fn test_read_brackets_run_with_start_and_finish_logs() {
    let engine = engine(mixed_streams);
    let (result, messages) = run(&engine, &catalog(&[("users", SyncMode::FullRefresh)]), None).await;
    result.unwrap();

    let logs = logs(&messages);
    assert_eq!(
        logs.first(),
        Some(&(LogLevel::Info, "Starting syncing test-source".to_string()))
    );
    assert_eq!(
        logs.last(),
        Some(&(LogLevel::Info, "Finished syncing test-source".to_string()))
    );
}

#[tokio::test]
async fn test_read_full_refresh_emits_no_state() {
    let engine = engine(mixed_streams);
    let (result, messages) = run(&engine, &catalog(&[("users", SyncMode::FullRefresh)]), None).await;

    let outcome = result.unwrap();
    assert_eq!(records_of(&messages, "users").len(), 2);
    assert!(states(&messages).is_empty());
    assert!(outcome.state.is_empty());
    assert_eq!(outcome.stats.records_synced, 2);
    assert_eq!(outcome.stats.streams_synced, 1);
}

#[tokio::test]
async fn test_read_full_refresh_gets_empty_state() {
    let engine = engine(mixed_streams);
    let prior: SyncState = [("events".to_string(), seq_state(40))].into_iter().collect();

    let (result, messages) = run(
        &engine,
        &catalog(&[("events", SyncMode::FullRefresh)]),
        Some(&prior),
    )
    .await;

    let outcome = result.unwrap();
    let first = records_of(&messages, "events")[0];
    assert_eq!(first["seq"], json!(1));
    assert!(states(&messages).is_empty());
    assert_eq!(outcome.state, prior);
}

#[tokio::test]
async fn test_read_incremental_emits_final_state() {
    let engine = engine(mixed_streams);
    let (result, messages) = run(&engine, &catalog(&[("events", SyncMode::Incremental)]), None).await;

    let outcome = result.unwrap();
    let expected: SyncState = [("events".to_string(), seq_state(3))].into_iter().collect();
    assert_eq!(states(&messages), vec![expected.clone()]);
    assert_eq!(outcome.state, expected);
    assert_eq!(outcome.stats.state_messages, 1);

    // STATE follows the last record
    let last_record = messages.iter().rposition(Message::is_record).unwrap();
    let state_at = messages.iter().position(Message::is_state).unwrap();
    assert!(state_at > last_record);
}

#[tokio::test]
async fn test_read_incremental_resumes_from_prior_state() {
    let engine = engine(mixed_streams);
    let prior: SyncState = [("events".to_string(), seq_state(10))].into_iter().collect();

    let (result, messages) = run(
        &engine,
        &catalog(&[("events", SyncMode::Incremental)]),
        Some(&prior),
    )
    .await;

    let outcome = result.unwrap();
    let seqs: Vec<_> = records_of(&messages, "events")
        .iter()
        .map(|r| r["seq"].clone())
        .collect();
    assert_eq!(seqs, vec![json!(11), json!(12), json!(13)]);
    assert!(logs(&messages)
        .iter()
        .any(|(level, text)| *level == LogLevel::Info
            && text == r#"Setting state of events stream to {"seq":10}"#));

    // Caller's state is left alone
    assert_eq!(prior.get("events"), Some(&seq_state(10)));
    assert_eq!(outcome.state.get("events"), Some(&seq_state(13)));
}

#[tokio::test]
async fn test_read_ignores_empty_prior_state() {
    let engine = engine(mixed_streams);
    let prior: SyncState = [("events".to_string(), JsonObject::new())].into_iter().collect();

    let (result, messages) = run(
        &engine,
        &catalog(&[("events", SyncMode::Incremental)]),
        Some(&prior),
    )
    .await;

    result.unwrap();
    assert_eq!(records_of(&messages, "events")[0]["seq"], json!(1));
    assert!(!logs(&messages)
        .iter()
        .any(|(_, text)| text.starts_with("Setting state")));
}

fn long_stream(count: u64, continuous: bool) -> Vec<SourceStream> {
    vec![SourceStream::incremental(Sequence {
        name: "events",
        count,
        continuous,
    })]
}

fn long_continuous_250() -> Vec<SourceStream> {
    long_stream(250, true)
}

fn long_continuous_100() -> Vec<SourceStream> {
    long_stream(100, true)
}

fn long_batch_250() -> Vec<SourceStream> {
    long_stream(250, false)
}

#[tokio::test]
async fn test_read_checkpoints_every_hundred_records() {
    let engine = engine(long_continuous_250);
    let (result, messages) = run(&engine, &catalog(&[("events", SyncMode::Incremental)]), None).await;
    result.unwrap();

    let cursors: Vec<_> = states(&messages)
        .iter()
        .map(|s| s.get("events").unwrap()["seq"].clone())
        .collect();
    assert_eq!(cursors, vec![json!(100), json!(200), json!(250)]);

    // Each intermediate STATE sits right after its 100th record
    let mut seen = 0;
    for message in &messages {
        if message.is_record() {
            seen += 1;
        } else if message.is_state() && seen < 250 {
            assert_eq!(seen % 100, 0);
        }
    }
}

#[tokio::test]
async fn test_read_exact_interval_emits_intermediate_and_final() {
    let engine = engine(long_continuous_100);
    let (result, messages) = run(&engine, &catalog(&[("events", SyncMode::Incremental)]), None).await;

    assert_eq!(result.unwrap().stats.state_messages, 2);
    assert_eq!(states(&messages).len(), 2);
}

#[tokio::test]
async fn test_read_without_continuous_state_only_checkpoints_at_end() {
    let engine = engine(long_batch_250);
    let (result, messages) = run(&engine, &catalog(&[("events", SyncMode::Incremental)]), None).await;
    result.unwrap();
    assert_eq!(states(&messages).len(), 1);
}

#[tokio::test]
async fn test_read_interval_zero_disables_intermediate_checkpoints() {
    let engine = engine(long_continuous_250).with_config(SyncConfig::new().with_checkpoint_interval(0));
    let (result, messages) = run(&engine, &catalog(&[("events", SyncMode::Incremental)]), None).await;
    result.unwrap();
    assert_eq!(states(&messages).len(), 1);
}

#[tokio::test]
async fn test_read_custom_interval() {
    let engine = engine(long_continuous_250).with_config(SyncConfig::new().with_checkpoint_interval(50));
    let (result, messages) = run(&engine, &catalog(&[("events", SyncMode::Incremental)]), None).await;
    result.unwrap();
    // 50, 100, 150, 200, 250 and the final snapshot
    assert_eq!(states(&messages).len(), 6);
}

fn two_incremental() -> Vec<SourceStream> {
    vec![
        SourceStream::incremental(Sequence {
            name: "alpha",
            count: 2,
            continuous: false,
        }),
        SourceStream::incremental(Sequence {
            name: "beta",
            count: 150,
            continuous: true,
        }),
    ]
}

#[tokio::test]
async fn test_state_snapshots_are_aggregate_and_never_shrink() {
    let engine = engine(two_incremental);
    let prior: SyncState = [("other".to_string(), seq_state(7))].into_iter().collect();

    let (result, messages) = run(
        &engine,
        &catalog(&[("alpha", SyncMode::Incremental), ("beta", SyncMode::Incremental)]),
        Some(&prior),
    )
    .await;
    result.unwrap();

    let snapshots = states(&messages);
    assert_eq!(snapshots.len(), 3);
    for pair in snapshots.windows(2) {
        let earlier: Vec<_> = pair[0].stream_names().collect();
        assert!(earlier.iter().all(|name| pair[1].get(name).is_some()));
    }

    let last = snapshots.last().unwrap();
    assert_eq!(last.get("other"), Some(&seq_state(7)));
    assert_eq!(last.get("alpha"), Some(&seq_state(2)));
    assert_eq!(last.get("beta"), Some(&seq_state(150)));
    // beta's intermediate checkpoint already carries alpha
    assert_eq!(snapshots[1].get("alpha"), Some(&seq_state(2)));
    assert_eq!(snapshots[1].get("beta"), Some(&seq_state(100)));
}

fn plain_then_incremental() -> Vec<SourceStream> {
    vec![
        SourceStream::plain(Snapshot {
            name: "users",
            count: 2,
        }),
        SourceStream::incremental(Sequence {
            name: "events",
            count: 1,
            continuous: false,
        }),
    ]
}

#[tokio::test]
async fn test_incremental_request_on_plain_stream_falls_back() {
    let engine = engine(plain_then_incremental);
    let prior: SyncState = [("other".to_string(), seq_state(7))].into_iter().collect();

    let (result, messages) = run(
        &engine,
        &catalog(&[("users", SyncMode::Incremental), ("events", SyncMode::Incremental)]),
        Some(&prior),
    )
    .await;
    result.unwrap();

    assert_eq!(records_of(&messages, "users").len(), 2);

    // The only STATE comes from events, after every users record
    let snapshots = states(&messages);
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].get("users").is_none());
    assert_eq!(snapshots[0].get("other"), Some(&seq_state(7)));
    assert_eq!(snapshots[0].get("events"), Some(&seq_state(1)));
}

// ============================================================================
// Fault Tests
// ============================================================================

fn exploding_then_healthy() -> Vec<SourceStream> {
    vec![
        SourceStream::plain(Exploding {
            name: "broken",
            before_failure: 2,
        }),
        SourceStream::incremental(Sequence {
            name: "events",
            count: 5,
            continuous: false,
        }),
    ]
}

#[tokio::test]
async fn test_extraction_fault_is_logged_and_aborts_run() {
    let engine = SyncEngine::new(
        TestSource::new(exploding_then_healthy),
        RedactingFormatter::new(Secrets::new(["sk_live_abc"])),
    );

    let (result, messages) = run(
        &engine,
        &catalog(&[("broken", SyncMode::FullRefresh), ("events", SyncMode::Incremental)]),
        None,
    )
    .await;

    assert!(matches!(result, Err(Error::Anyhow(_))));
    assert_eq!(records_of(&messages, "broken").len(), 2);
    assert!(records_of(&messages, "events").is_empty());
    assert!(states(&messages).is_empty());

    // The ERROR log is the last message and carries the redacted chain
    let (level, text) = logs(&messages).pop().unwrap();
    assert_eq!(level, LogLevel::Error);
    assert!(text.starts_with("Encountered an error while reading stream broken"));
    assert!(text.contains("fetching page with key ****"));
    assert!(text.contains("caused by: socket reset by peer"));
    assert!(!text.contains("sk_live_abc"));
    assert!(matches!(messages.last(), Some(Message::Log { .. })));
}

fn stuck_cursor() -> Vec<SourceStream> {
    vec![SourceStream::incremental(StuckCursor {
        name: "events",
        count: 3,
    })]
}

#[tokio::test]
async fn test_record_is_emitted_before_cursor_fold_fails() {
    let engine = engine(stuck_cursor);
    let (result, messages) = run(&engine, &catalog(&[("events", SyncMode::Incremental)]), None).await;

    assert!(matches!(result, Err(Error::State { .. })));
    let records = records_of(&messages, "events");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["seq"], json!(1));
    assert!(states(&messages).is_empty());

    let (level, text) = logs(&messages).pop().unwrap();
    assert_eq!(level, LogLevel::Error);
    assert!(text.contains("cursor 'seq' is not comparable"));
}

#[tokio::test]
async fn test_unknown_stream_is_configuration_fault() {
    let engine = engine(mixed_streams);
    let (result, messages) = run(
        &engine,
        &catalog(&[("users", SyncMode::FullRefresh), ("ghost", SyncMode::FullRefresh)]),
        None,
    )
    .await;

    assert!(matches!(result, Err(Error::StreamNotFound { ref stream }) if stream == "ghost"));
    assert_eq!(records_of(&messages, "users").len(), 2);
    let (level, text) = logs(&messages).pop().unwrap();
    assert_eq!(level, LogLevel::Error);
    assert!(text.contains("Stream 'ghost' not found in source"));
}

// ============================================================================
// Lazy Stream Tests
// ============================================================================

#[tokio::test]
async fn test_read_stream_matches_read() {
    let catalog = catalog(&[("events", SyncMode::Incremental), ("users", SyncMode::FullRefresh)]);

    let (result, expected) = run(&engine(mixed_streams), &catalog, None).await;
    result.unwrap();

    let engine = Arc::new(engine(mixed_streams));
    let items: Vec<Result<Message>> = engine
        .read_stream(json!({}), catalog, None)
        .collect()
        .await;
    let streamed: Vec<Message> = items.into_iter().map(|m| m.unwrap()).collect();

    // emitted_at differs between runs
    let strip = |messages: &[Message]| -> Vec<Message> {
        messages
            .iter()
            .cloned()
            .map(|m| match m {
                Message::Record { mut record } => {
                    record.emitted_at = 0;
                    Message::Record { record }
                }
                other => other,
            })
            .collect()
    };
    assert_eq!(strip(&streamed), strip(&expected));
}

#[tokio::test]
async fn test_read_stream_ends_with_fault() {
    let engine = Arc::new(engine(exploding_then_healthy));
    let items: Vec<Result<Message>> = engine
        .read_stream(
            json!({}),
            catalog(&[("broken", SyncMode::FullRefresh), ("events", SyncMode::Incremental)]),
            None,
        )
        .collect()
        .await;

    let (last, before) = items.split_last().unwrap();
    assert!(matches!(last, Err(Error::Anyhow(_))));
    assert!(before.iter().all(Result::is_ok));
    assert!(matches!(
        before.last(),
        Some(Ok(Message::Log { log })) if log.level == LogLevel::Error
    ));
}

fn panicking() -> Vec<SourceStream> {
    vec![SourceStream::plain(Panicking {
        name: "fragile",
        panic_at: 2,
    })]
}

#[tokio::test]
async fn test_read_stream_reports_stream_panic_as_error() {
    let engine = Arc::new(engine(panicking));
    let items: Vec<Result<Message>> = engine
        .read_stream(json!({}), catalog(&[("fragile", SyncMode::FullRefresh)]), None)
        .collect()
        .await;

    let (last, before) = items.split_last().unwrap();
    assert!(matches!(
        last,
        Err(Error::Other(message)) if message.contains("record 2 is corrupt")
    ));
    let records: Vec<_> = before
        .iter()
        .filter_map(|item| item.as_ref().ok().and_then(Message::as_record))
        .collect();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_read_stream_is_lazy_and_cancellable() {
    let produced = Arc::new(AtomicU64::new(0));
    let engine = Arc::new(SyncEngine::new(
        CountingSource {
            produced: produced.clone(),
        },
        RedactingFormatter::default(),
    ));
    let mut stream = engine.read_stream(
        json!({}),
        catalog(&[("events", SyncMode::FullRefresh)]),
        None,
    );

    let first = stream.next().await.unwrap().unwrap();
    assert!(first.is_log());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_first_pull = produced.load(Ordering::SeqCst);
    assert!(after_first_pull <= 2, "produced {after_first_pull} records");

    drop(stream);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_drop = produced.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(produced.load(Ordering::SeqCst), after_drop);
    assert!(after_drop <= 3, "produced {after_drop} records");
}

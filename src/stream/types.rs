//! Stream capability traits
//!
//! A source hands the engine its streams as [`SourceStream`] values. The
//! variant says whether a stream can track a cursor, so the engine matches on
//! it instead of asking each stream at runtime.

use super::cursor::CursorField;
use crate::error::Result;
use crate::protocol::CatalogStream;
use crate::types::{JsonObject, JsonValue, SyncMode};
use futures::stream::BoxStream;
use serde_json::json;
use std::fmt;

/// Lazy, finite sequence of records produced by a stream
pub type RecordStream<'a> = BoxStream<'a, Result<JsonObject>>;

/// Schema used when a stream does not describe its records
pub fn default_json_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": true
    })
}

/// A named stream of records
pub trait DataStream: Send + Sync {
    /// Stream name, unique within its source
    fn name(&self) -> &str;

    /// JSON schema of the stream's records
    fn json_schema(&self) -> JsonValue {
        default_json_schema()
    }

    /// Pull records.
    ///
    /// `state` is the stream's cursor state, empty for a full refresh. The
    /// stream owns it; changes made while reading never reach the caller.
    fn read_records(&self, state: JsonObject) -> RecordStream<'_>;
}

/// A stream that can resume from a cursor
pub trait IncrementalStream: DataStream {
    /// Field ordering the stream's records
    fn cursor_field(&self) -> CursorField;

    /// Whether the cursor is fixed by the source rather than chosen by the user
    fn source_defined_cursor(&self) -> bool {
        true
    }

    /// Whether state should be checkpointed while the stream is being read
    fn continuously_save_state(&self) -> bool {
        false
    }

    /// Fold the latest record into the cursor state
    fn get_updated_state(&self, current: JsonObject, latest_record: &JsonObject)
        -> Result<JsonObject>;
}

/// A stream as registered by a source
pub enum SourceStream {
    /// Full refresh only
    Plain(Box<dyn DataStream>),
    /// Full refresh or incremental
    Incremental(Box<dyn IncrementalStream>),
}

impl SourceStream {
    /// Wrap a full-refresh stream
    pub fn plain(stream: impl DataStream + 'static) -> Self {
        Self::Plain(Box::new(stream))
    }

    /// Wrap an incremental stream
    pub fn incremental(stream: impl IncrementalStream + 'static) -> Self {
        Self::Incremental(Box::new(stream))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Plain(stream) => stream.name(),
            Self::Incremental(stream) => stream.name(),
        }
    }

    pub fn json_schema(&self) -> JsonValue {
        match self {
            Self::Plain(stream) => stream.json_schema(),
            Self::Incremental(stream) => stream.json_schema(),
        }
    }

    pub fn read_records(&self, state: JsonObject) -> RecordStream<'_> {
        match self {
            Self::Plain(stream) => stream.read_records(state),
            Self::Incremental(stream) => stream.read_records(state),
        }
    }

    /// The incremental capability, if the stream has one
    pub fn as_incremental(&self) -> Option<&dyn IncrementalStream> {
        match self {
            Self::Plain(_) => None,
            Self::Incremental(stream) => Some(stream.as_ref()),
        }
    }

    /// Sync modes the stream supports
    pub fn supported_sync_modes(&self) -> Vec<SyncMode> {
        match self {
            Self::Plain(_) => vec![SyncMode::FullRefresh],
            Self::Incremental(_) => vec![SyncMode::FullRefresh, SyncMode::Incremental],
        }
    }

    /// Catalog descriptor for discovery
    pub fn descriptor(&self) -> CatalogStream {
        let (source_defined_cursor, default_cursor_field) = match self.as_incremental() {
            Some(stream) => (
                Some(stream.source_defined_cursor()),
                Some(stream.cursor_field().path()),
            ),
            None => (None, None),
        };

        CatalogStream {
            name: self.name().to_string(),
            json_schema: self.json_schema(),
            supported_sync_modes: self.supported_sync_modes(),
            source_defined_cursor,
            default_cursor_field,
        }
    }
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Plain(_) => "Plain",
            Self::Incremental(_) => "Incremental",
        };
        f.debug_struct("SourceStream")
            .field("name", &self.name())
            .field("kind", &kind)
            .finish()
    }
}

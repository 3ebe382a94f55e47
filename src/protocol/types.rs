//! Protocol types
//!
//! Every message serializes to one self-contained JSON object of the form
//! `{"type": "RECORD", "record": {...}}`.

use crate::state::SyncState;
use crate::types::{JsonObject, JsonValue, LogLevel, SyncMode};
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// A message on the output channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// One extracted record
    #[serde(rename = "RECORD")]
    Record {
        /// Record payload
        record: RecordMessage,
    },

    /// Aggregate state checkpoint
    #[serde(rename = "STATE")]
    State {
        /// State payload
        state: StateMessage,
    },

    /// Log line
    #[serde(rename = "LOG")]
    Log {
        /// Log payload
        log: LogMessage,
    },

    /// Discovered catalog
    #[serde(rename = "CATALOG")]
    Catalog {
        /// Catalog payload
        catalog: Catalog,
    },

    /// Result of a connection check
    #[serde(rename = "CONNECTION_STATUS")]
    ConnectionStatus {
        /// Status payload
        #[serde(rename = "connectionStatus")]
        connection_status: ConnectionStatus,
    },
}

/// A record together with its stream and emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    /// Owning stream
    pub stream: String,
    /// Record data
    pub data: JsonObject,
    /// Milliseconds since the Unix epoch
    pub emitted_at: i64,
}

/// A full snapshot of the aggregate sync state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    /// Cursor state for every stream synced so far
    pub data: SyncState,
}

/// A leveled log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Severity
    pub level: LogLevel,
    /// Rendered text
    pub message: String,
}

impl Message {
    /// Create a record message stamped with the current time
    pub fn record(stream: impl Into<String>, data: JsonObject) -> Self {
        Self::Record {
            record: RecordMessage {
                stream: stream.into(),
                data,
                emitted_at: Utc::now().timestamp_millis(),
            },
        }
    }

    /// Create a state message
    pub fn state(data: SyncState) -> Self {
        Self::State {
            state: StateMessage { data },
        }
    }

    /// Create a log message.
    ///
    /// The text is emitted verbatim; go through
    /// [`RedactingFormatter`](crate::logger::RedactingFormatter) when it may
    /// contain secrets.
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            log: LogMessage {
                level,
                message: message.into(),
            },
        }
    }

    /// Create a catalog message
    pub fn catalog(catalog: Catalog) -> Self {
        Self::Catalog { catalog }
    }

    /// Create a connection status message
    pub fn connection_status(status: ConnectionStatus) -> Self {
        Self::ConnectionStatus {
            connection_status: status,
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }

    /// Record payload, if this is a record message
    pub fn as_record(&self) -> Option<&RecordMessage> {
        match self {
            Self::Record { record } => Some(record),
            _ => None,
        }
    }

    /// State payload, if this is a state message
    pub fn as_state(&self) -> Option<&SyncState> {
        match self {
            Self::State { state } => Some(&state.data),
            _ => None,
        }
    }

    /// Log payload, if this is a log message
    pub fn as_log(&self) -> Option<&LogMessage> {
        match self {
            Self::Log { log } => Some(log),
            _ => None,
        }
    }
}

// ============================================================================
// Connection Status
// ============================================================================

/// Outcome of a connection check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Succeeded,
    Failed,
}

/// Connection check result as reported on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Whether the check passed
    pub status: Status,
    /// Failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionStatus {
    /// A passing check
    pub fn succeeded() -> Self {
        Self {
            status: Status::Succeeded,
            message: None,
        }
    }

    /// A failing check with its detail
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            message: Some(message.into()),
        }
    }
}

// ============================================================================
// Catalog Types
// ============================================================================

/// Discovered catalog (available streams)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Available streams
    pub streams: Vec<CatalogStream>,
}

/// Stream in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStream {
    /// Stream name
    pub name: String,

    /// JSON schema for the stream
    #[serde(default)]
    pub json_schema: JsonValue,

    /// Supported sync modes
    #[serde(default)]
    pub supported_sync_modes: Vec<SyncMode>,

    /// Whether the cursor is fixed by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_defined_cursor: Option<bool>,

    /// Default cursor field path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cursor_field: Option<Vec<String>>,
}

impl CatalogStream {
    /// Whether the stream can be read incrementally
    pub fn supports_incremental(&self) -> bool {
        self.supported_sync_modes.contains(&SyncMode::Incremental)
    }
}

impl Catalog {
    /// Find a stream by name
    pub fn get(&self, name: &str) -> Option<&CatalogStream> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Select streams for a read.
    ///
    /// With `names` empty every stream is selected. Streams are read
    /// incrementally when they support it, otherwise with a full refresh.
    pub fn configure(&self, names: &[String]) -> ConfiguredCatalog {
        let streams = self
            .streams
            .iter()
            .filter(|s| names.is_empty() || names.contains(&s.name))
            .map(|s| ConfiguredStream {
                sync_mode: if s.supports_incremental() {
                    SyncMode::Incremental
                } else {
                    SyncMode::FullRefresh
                },
                cursor_field: s.default_cursor_field.clone(),
                stream: s.clone(),
            })
            .collect();

        ConfiguredCatalog { streams }
    }
}

/// Configured catalog (selected streams for sync)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    /// Selected streams
    pub streams: Vec<ConfiguredStream>,
}

/// Configured stream for sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    /// Stream reference
    pub stream: CatalogStream,

    /// Selected sync mode
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Cursor field to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<Vec<String>>,
}

impl ConfiguredStream {
    /// Name of the referenced stream
    pub fn name(&self) -> &str {
        &self.stream.name
    }
}

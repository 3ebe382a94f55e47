//! Loader types
//!
//! Declarative connector definition types for YAML parsing.

use crate::http::ApiKeyLocation;
use crate::stream::CursorField;
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Connector Definition
// ============================================================================

/// Top-level connector definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectorDefinition {
    /// Connector name
    pub name: String,
    /// Connector version
    #[serde(default = "default_version")]
    pub version: String,
    /// Base URL for all requests
    pub base_url: String,
    /// Configuration properties accepted by the connector
    #[serde(default)]
    pub spec: SpecDefinition,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthDefinition,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Connection check configuration
    #[serde(default)]
    pub check: Option<CheckDefinition>,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Stream definitions
    pub streams: Vec<StreamDefinition>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl ConnectorDefinition {
    /// Find a stream definition by name
    pub fn stream(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Spec Definition
// ============================================================================

/// Configuration properties the connector accepts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecDefinition {
    /// Configuration properties
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,
}

/// Configuration property definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// JSON type name (`string`, `integer`, ...)
    #[serde(rename = "type", default)]
    pub property_type: Option<String>,

    /// Property description
    #[serde(default)]
    pub description: Option<String>,

    /// Whether the value must be masked in output
    #[serde(default)]
    pub secret: bool,

    /// Whether this property is required
    #[serde(default)]
    pub required: bool,

    /// Value used when the config omits the property
    #[serde(default)]
    pub default: Option<JsonValue>,
}

// ============================================================================
// Auth Definition
// ============================================================================

/// Authentication definition; every value may be a template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthDefinition {
    /// No authentication
    #[default]
    None,
    /// Bearer token authentication
    Bearer {
        /// Token value
        token: String,
    },
    /// API key authentication
    ApiKey {
        /// Header or query param name
        name: String,
        /// Key value
        value: String,
        /// Where the key is sent
        #[serde(default)]
        location: ApiKeyLocation,
    },
    /// Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        #[serde(default)]
        password: String,
    },
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retries
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds, doubled for each retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Cap for retry delays and Retry-After waits, in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_secs() -> u64 {
    60
}

/// Connection check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckDefinition {
    /// URL path for the check request
    pub path: String,
    /// Query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

// ============================================================================
// Stream Definition
// ============================================================================

/// Stream definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// URL path, relative to the base URL
    pub path: String,
    /// Query parameters (templates)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Stream-specific headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Dotted path to the records in the response; empty means the whole body
    #[serde(default)]
    pub record_path: String,
    /// JSON schema of the records
    #[serde(default)]
    pub schema: Option<JsonValue>,
    /// Pagination configuration
    #[serde(default)]
    pub pagination: Option<PaginationDefinition>,
    /// Incremental sync configuration
    #[serde(default)]
    pub incremental: Option<IncrementalDefinition>,
}

/// Next-page-token pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PaginationDefinition {
    /// Dotted path to the next page token in the response
    pub next_page_path: String,
    /// Query parameter that carries the token on the next request
    pub page_param: String,
}

/// Incremental sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IncrementalDefinition {
    /// Cursor field name or path
    pub cursor_field: CursorField,
    /// Checkpoint state while the stream is read
    #[serde(default)]
    pub continuously_save_state: bool,
    /// Whether the cursor is fixed by the source
    #[serde(default = "default_true")]
    pub source_defined_cursor: bool,
}

fn default_true() -> bool {
    true
}

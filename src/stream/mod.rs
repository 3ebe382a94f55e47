//! Stream module
//!
//! The capability contract the sync engine reads records through, plus the
//! HTTP-backed streams built by declarative connectors.
//!
//! # Overview
//!
//! The stream module provides:
//! - `DataStream` - Named, schema-described, lazily read record sequence
//! - `IncrementalStream` - Adds a cursor field and state folding
//! - `SourceStream` - Tagged union of the two, as registered by a source
//! - `HttpStream` / `IncrementalHttpStream` - Paginated JSON endpoints
//!
//! # Example
//!
//! ```ignore
//! use relay_cdk::stream::{max_cursor_state, CursorField};
//!
//! let cursor = CursorField::from("updated_at");
//! let state = max_cursor_state(&cursor, current, &record);
//! ```

mod cursor;
mod http;
mod types;

pub use cursor::{compare_cursor_values, max_cursor_state, CursorField};
pub use http::{extract_records, next_page_token, HttpStream, IncrementalHttpStream};
pub use types::{default_json_schema, DataStream, IncrementalStream, RecordStream, SourceStream};

//! YAML Loader module
//!
//! Parse connector definitions from YAML files and run them as sources.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ConnectorDefinition` - Declarative connector description
//! - `StreamDefinition` - Stream configuration
//! - `DeclarativeSource` - A `Source` backed by HTTP streams
//! - YAML parsing with validation

mod parser;
mod source;
mod types;

pub use parser::{load_connector, load_connector_from_str, validate_connector};
pub use source::DeclarativeSource;
pub use types::{
    AuthDefinition, CheckDefinition, ConnectorDefinition, HttpDefinition, IncrementalDefinition,
    PaginationDefinition, PropertyDefinition, SpecDefinition, StreamDefinition,
};

//! Logging module
//!
//! Protocol LOG messages and process diagnostics, both scrubbed of secrets.
//!
//! # Overview
//!
//! The logger module provides:
//! - `Secrets` - Shared redaction context holding the active secret values
//! - `RedactingFormatter` - Renders LOG messages with secrets masked
//! - `RedactingMakeWriter` - `tracing-subscriber` writer applying the same masking
//! - `init_tracing` - Bootstrap for stderr diagnostics
//! - `install_panic_hook` - Reports panics as FATAL LOG lines

mod formatter;
mod panic;
mod writer;

pub use formatter::{redact, RedactingFormatter, Secrets, MASK};
pub use panic::{fatal_line, install_panic_hook};
pub use writer::{init_tracing, RedactingMakeWriter, RedactingWriter};

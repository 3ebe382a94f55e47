//! Redacting writer for `tracing-subscriber`
//!
//! Diagnostics go to stderr so stdout stays reserved for protocol messages.

use super::formatter::Secrets;
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Buffers one formatted event and writes it with secrets masked on flush/drop
pub struct RedactingWriter<W: Write> {
    inner: W,
    secrets: Secrets,
    buffer: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    /// Wrap a writer
    pub fn new(inner: W, secrets: Secrets) -> Self {
        Self {
            inner,
            secrets,
            buffer: Vec::new(),
        }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return self.inner.flush();
        }
        let text = String::from_utf8_lossy(&self.buffer);
        let redacted = self.secrets.redact(&text);
        self.buffer.clear();
        self.inner.write_all(redacted.as_bytes())?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// `MakeWriter` producing stderr writers bound to a redaction context
#[derive(Debug, Clone)]
pub struct RedactingMakeWriter {
    secrets: Secrets,
}

impl RedactingMakeWriter {
    /// Create a writer factory over a redaction context
    pub fn new(secrets: Secrets) -> Self {
        Self { secrets }
    }
}

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(io::stderr(), self.secrets.clone())
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` refines the filter on top of `default_level`. Calling this more
/// than once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing(secrets: Secrets, default_level: tracing::Level) {
    let filter = EnvFilter::from_default_env().add_directive(default_level.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingMakeWriter::new(secrets))
        .try_init();
}

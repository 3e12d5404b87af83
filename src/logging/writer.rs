//! Fan-out of one record to every sink.

use crate::logging::sink::Sink;
use std::io;

/// Writes each record to every sink in order.
///
/// A failing sink is reported through `tracing` and skipped; the others still
/// receive the full record, and the caller always sees success.
#[derive(Default)]
pub struct MultiWriter {
    sinks: Vec<Box<dyn Sink>>,
}

impl MultiWriter {
    /// Writer over `sinks`.
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Sink identifiers in write order.
    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Deliver `buf` to every sink. Always returns `Ok(buf.len())`.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        for sink in &self.sinks {
            if let Err(e) = sink.write(buf) {
                tracing::warn!(sink = sink.name(), error = %e, "log sink write failed");
            }
        }
        Ok(buf.len())
    }

    /// Flush every sink; returns the last error seen.
    pub fn flush(&self) -> io::Result<()> {
        let mut last = Ok(());
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                tracing::warn!(sink = sink.name(), error = %e, "log sink flush failed");
                last = Err(e.into());
            }
        }
        last
    }

    /// Close every sink; returns the last error seen.
    pub fn close(&self) -> io::Result<()> {
        let mut last = Ok(());
        for sink in &self.sinks {
            if let Err(e) = sink.close() {
                tracing::warn!(sink = sink.name(), error = %e, "log sink close failed");
                last = Err(e.into());
            }
        }
        last
    }
}

impl io::Write for &MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        MultiWriter::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        MultiWriter::flush(self)
    }
}

//! Injected warning sinks for engine diagnostics.
//!
//! The engine never looks up a global logger; components receive a sink
//! at construction. The default sink forwards to the `tracing` facade,
//! and [`MemorySink`] captures messages for deterministic tests.

use std::sync::Mutex;

/// Receiver for non-fatal engine warnings.
///
/// Each warning names the offending task id or the relevant parameter so
/// the message is useful without further context.
pub trait DiagnosticSink: Send + Sync {
    /// Record one warning message.
    fn warn(&self, message: &str);
}

/// Forwards warnings to `tracing::warn!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Collects warnings in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages recorded so far, in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn warn(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.warn("first");
        sink.warn("second");
        assert_eq!(sink.messages(), ["first", "second"]);
    }
}

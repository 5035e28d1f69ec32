//! Diagnostic output, injected into the interceptor instead of written to a
//! process-wide console.

use std::sync::Mutex;

/// Receives diagnostic lines.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, message: &str);
}

/// Forwards each line to `tracing` at `INFO` under the `swcache::diagnostics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, message: &str) {
        tracing::info!(target: "swcache::diagnostics", "{message}");
    }
}

/// Keeps every line in memory, in emission order.
///
/// # Examples
///
/// ```
/// use swcache::diagnostics::{DiagnosticSink, MemorySink};
///
/// let sink = MemorySink::new();
/// sink.emit("Fetching");
/// assert_eq!(sink.lines(), vec!["Fetching".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line emitted so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of lines emitted so far.
    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, message: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(message.to_owned());
    }
}

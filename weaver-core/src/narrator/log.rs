//! Where narrators report diagnostics.

use std::sync::{Arc, Mutex};

/// A sink for one-line diagnostic notices, such as the fallback notice.
pub trait NarrationLog: Send + Sync {
    fn notice(&self, message: &str);
}

/// Forwards notices to `tracing` at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl NarrationLog for TracingLog {
    fn notice(&self, message: &str) {
        tracing::warn!(target: "weaver_core::narrator", "{message}");
    }
}

/// Keeps notices in a shared buffer.
///
/// Clones share the same buffer, so a front end can hand one clone to a
/// narrator and read notices back from another.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every notice recorded so far.
    pub fn drain(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|mut entries| std::mem::take(&mut *entries))
            .unwrap_or_default()
    }
}

impl NarrationLog for MemoryLog {
    fn notice(&self, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(message.to_string());
        }
    }
}

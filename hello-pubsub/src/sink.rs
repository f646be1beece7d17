use crate::error::SinkError;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Destination of the greeting lines.
/// Severity, execution ID and timestamp are the sink's business, the handler only provides the text.
pub trait LogSink: Send + Sync {
    /// Resolves once the line has been accepted by the sink.
    fn write_line(&self, line: &str) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Writes lines as INFO events to whatever tracing subscriber is installed.
/// The invocation span adds the execution ID, the subscriber adds the time and the level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    async fn write_line(&self, line: &str) -> Result<(), SinkError> {
        info!("{line}");
        Ok(())
    }
}

/// Keeps all lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything written so far, in the order of writing.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LogSink for MemorySink {
    async fn write_line(&self, line: &str) -> Result<(), SinkError> {
        // a panic in another writer does not invalidate the lines already stored
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
        Ok(())
    }
}

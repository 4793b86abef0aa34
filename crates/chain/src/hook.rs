//! Error taxonomy and the configurable error sink.
//!
//! Failures inside queued work never propagate up the chain; they are
//! funneled to an `ErrorSink` together with an `ErrorContext` descriptor
//! and the queue moves on. The sink is explicit configuration threaded into
//! each page/chain at construction; the process-wide default logs through
//! `tracing`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("No match for selector: {selector}")]
    Resolution { selector: String },

    #[error("Operation '{operation}' failed: {message}")]
    Execution { operation: String, message: String },

    #[error("Operation '{operation}' timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("DOM error: {0}")]
    Dom(#[from] dom::DomError),
}

impl ChainError {
    pub fn execution(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Diagnostic descriptor attached to every reported failure.
/// Carries no behavior.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    /// Name of the chained operation that failed.
    pub operation: String,
    /// Selector the façade was resolved from, when there was one.
    pub selector: Option<String>,
    /// Number of nodes the façade was bound to.
    pub target_len: usize,
    /// Façade lineage id.
    pub chain_id: Uuid,
    /// Caller-supplied metadata (promise adapter timeouts carry theirs here).
    #[serde(skip_serializing_if = "Value::is_null")]
    pub meta: Value,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            selector: None,
            target_len: 0,
            chain_id: Uuid::new_v4(),
            meta: Value::Null,
        }
    }
}

/// Receiver for failures the queue skipped over.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    async fn on_error(&self, error: &ChainError, ctx: &ErrorContext);
}

pub type ErrorHook = Arc<dyn ErrorSink>;

/// Default sink: structured log line per failure, nothing else.
pub struct TracingSink;

#[async_trait]
impl ErrorSink for TracingSink {
    fn name(&self) -> &str {
        "TracingSink"
    }

    async fn on_error(&self, error: &ChainError, ctx: &ErrorContext) {
        tracing::error!(
            operation = %ctx.operation,
            selector = ctx.selector.as_deref().unwrap_or(""),
            target_len = ctx.target_len,
            chain_id = %ctx.chain_id,
            "chain operation failed: {}",
            error
        );
    }
}

/// The documented process-wide default.
pub fn default_hook() -> ErrorHook {
    Arc::new(TracingSink)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Test sink recording every (error message, operation) pair.
    pub struct RecordingSink {
        pub reports: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                reports: Mutex::new(Vec::new()),
            })
        }

        pub fn count(&self) -> usize {
            self.reports.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ErrorSink for RecordingSink {
        fn name(&self) -> &str {
            "RecordingSink"
        }

        async fn on_error(&self, error: &ChainError, ctx: &ErrorContext) {
            self.reports
                .lock()
                .unwrap()
                .push((error.to_string(), ctx.operation.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChainError::Resolution {
            selector: "#missing".to_string(),
        };
        assert_eq!(err.to_string(), "No match for selector: #missing");

        let err = ChainError::Timeout {
            operation: "load".to_string(),
            after_ms: 50,
        };
        assert!(err.to_string().contains("50ms"));
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = test_support::RecordingSink::new();
        let ctx = ErrorContext::new("attr");
        sink.on_error(&ChainError::execution("attr", "boom"), &ctx)
            .await;
        assert_eq!(sink.count(), 1);
        assert_eq!(sink.reports.lock().unwrap()[0].1, "attr");
    }
}

//! Bridge callback-style operations into awaitable ones.
//!
//! `promisify` hands the operation a resolve and a reject callback backed
//! by a oneshot channel; whichever fires first settles the future, later
//! calls are ignored. A timeout (default 5000ms) guards against the
//! operation never calling either: on expiry the error is routed through
//! the error sink and the future resolves to `Value::Null`, so a chain
//! built on top keeps going under the skip-and-continue policy.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::hook::{ChainError, ErrorContext, ErrorHook, Result};

pub type Resolver = Box<dyn FnOnce(Value) + Send>;
pub type Rejecter = Box<dyn FnOnce(String) + Send>;

#[derive(Debug, Clone)]
pub struct PromisifyOptions {
    /// How long to wait before giving up on the callbacks.
    pub timeout: Duration,
    /// Caller-supplied context forwarded to the error sink on timeout.
    pub meta: Value,
}

impl Default for PromisifyOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            meta: Value::Null,
        }
    }
}

impl PromisifyOptions {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

type Slot = Arc<Mutex<Option<oneshot::Sender<Result<Value>>>>>;

fn take(slot: &Slot) -> Option<oneshot::Sender<Result<Value>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Run `start` with a resolve/reject pair and await the outcome.
pub async fn promisify<F>(
    operation: &str,
    hook: &ErrorHook,
    options: PromisifyOptions,
    start: F,
) -> Result<Value>
where
    F: FnOnce(Resolver, Rejecter),
{
    let (tx, rx) = oneshot::channel::<Result<Value>>();
    let slot: Slot = Arc::new(Mutex::new(Some(tx)));

    let resolver: Resolver = {
        let slot = Arc::clone(&slot);
        Box::new(move |value| {
            if let Some(tx) = take(&slot) {
                let _ = tx.send(Ok(value));
            }
        })
    };

    let rejecter: Rejecter = {
        let slot = Arc::clone(&slot);
        let operation = operation.to_string();
        Box::new(move |message| {
            if let Some(tx) = take(&slot) {
                let _ = tx.send(Err(ChainError::execution(operation, message)));
            }
        })
    };

    start(resolver, rejecter);

    // A dropped sender without a send means neither callback will ever
    // fire; treat that the same as silence and let the timeout decide.
    let settled = async {
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => std::future::pending().await,
        }
    };

    match tokio::time::timeout(options.timeout, settled).await {
        Ok(outcome) => outcome,
        Err(_) => {
            let error = ChainError::Timeout {
                operation: operation.to_string(),
                after_ms: options.timeout.as_millis() as u64,
            };
            let context = ErrorContext {
                operation: operation.to_string(),
                selector: None,
                target_len: 0,
                chain_id: Uuid::new_v4(),
                meta: options.meta,
            };
            hook.on_error(&error, &context).await;
            Ok(Value::Null)
        }
    }
}

//! Tagged ready/pending values for queued operation arguments.
//!
//! Whether an argument still has to be awaited is a type-level fact, not a
//! runtime "is this thenable" probe: ready values are wrapped as
//! `Lazy::Ready`, async producers as `Lazy::Pending`. The queue resolves
//! pending arguments sequentially, in positional order, before an action
//! runs.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// An argument value that is either available now or produced by a future.
pub enum Lazy {
    Ready(Value),
    Pending(BoxFuture<'static, Value>),
}

impl Lazy {
    /// Wrap an async producer as a pending argument.
    pub fn future<F, T>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Into<Value>,
    {
        Lazy::Pending(Box::pin(async move { fut.await.into() }))
    }

    /// Await the value. Ready values return immediately.
    pub async fn resolve(self) -> Value {
        match self {
            Lazy::Ready(value) => value,
            Lazy::Pending(fut) => fut.await,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Lazy::Pending(_))
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lazy::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Lazy::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<Value> for Lazy {
    fn from(value: Value) -> Self {
        Lazy::Ready(value)
    }
}

impl From<&str> for Lazy {
    fn from(value: &str) -> Self {
        Lazy::Ready(Value::String(value.to_string()))
    }
}

impl From<String> for Lazy {
    fn from(value: String) -> Self {
        Lazy::Ready(Value::String(value))
    }
}

impl From<bool> for Lazy {
    fn from(value: bool) -> Self {
        Lazy::Ready(Value::Bool(value))
    }
}

impl From<i64> for Lazy {
    fn from(value: i64) -> Self {
        Lazy::Ready(Value::from(value))
    }
}

impl From<f64> for Lazy {
    fn from(value: f64) -> Self {
        Lazy::Ready(Value::from(value))
    }
}

/// Render a value the way DOM attribute/text setters need it: strings stay
/// bare, everything else uses its JSON rendering.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_resolves_immediately() {
        let lazy = Lazy::from("hello");
        assert!(!lazy.is_pending());
        assert_eq!(
            tokio_test::block_on(lazy.resolve()),
            Value::String("hello".to_string())
        );
    }

    #[tokio::test]
    async fn test_pending_awaits_future() {
        let lazy = Lazy::future(async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            "later"
        });
        assert!(lazy.is_pending());
        assert_eq!(lazy.resolve().await, Value::String("later".to_string()));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&Value::String("x".into())), "x");
        assert_eq!(value_text(&Value::from(42)), "42");
        assert_eq!(value_text(&Value::Bool(true)), "true");
        assert_eq!(value_text(&Value::Null), "");
    }
}

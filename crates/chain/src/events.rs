//! DOM event listeners: registration and dispatch.
//!
//! Flat per-(node, event) listener lists, invoked synchronously in
//! registration order. No bubbling or capture phases. Handlers typically
//! hold a `Chain` clone and enqueue further work, which lands behind the
//! item currently executing.

use dashmap::DashMap;
use dom::NodeId;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What a handler receives per dispatch.
#[derive(Debug, Clone)]
pub struct EventRef {
    pub event: String,
    pub node: NodeId,
    pub detail: Value,
}

pub type Handler = Arc<dyn Fn(&EventRef) + Send + Sync>;

/// Listener handle for removal.
pub type ListenerId = u64;

/// Shared listener table for one page.
pub struct ListenerRegistry {
    listeners: DashMap<(NodeId, String), Vec<(ListenerId, Handler)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn on(&self, node: NodeId, event: &str, handler: Handler) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .entry((node, event.to_string()))
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one listener; true when something was removed.
    pub fn off(&self, node: NodeId, event: &str, id: ListenerId) -> bool {
        if let Some(mut entry) = self.listeners.get_mut(&(node, event.to_string())) {
            let before = entry.len();
            entry.retain(|(lid, _)| *lid != id);
            return entry.len() != before;
        }
        false
    }

    /// Remove every listener for an event on a node.
    pub fn off_all(&self, node: NodeId, event: &str) {
        self.listeners.remove(&(node, event.to_string()));
    }

    /// Invoke listeners in registration order; returns how many ran.
    pub fn trigger(&self, node: NodeId, event: &str, detail: Value) -> usize {
        let handlers: Vec<Handler> = self
            .listeners
            .get(&(node, event.to_string()))
            .map(|entry| entry.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        let event_ref = EventRef {
            event: event.to_string(),
            node,
            detail,
        };
        for handler in &handlers {
            handler(&event_ref);
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            registry.on(
                1,
                "click",
                Arc::new(move |ev: &EventRef| {
                    log.lock().unwrap().push(format!("{}:{}", tag, ev.event));
                }),
            );
        }

        let ran = registry.trigger(1, "click", Value::Null);
        assert_eq!(ran, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:click".to_string(), "second:click".to_string()]
        );
    }

    #[test]
    fn test_off_removes_single_listener() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(Mutex::new(0));

        let c = Arc::clone(&count);
        let id = registry.on(1, "click", Arc::new(move |_| *c.lock().unwrap() += 1));

        assert!(registry.off(1, "click", id));
        assert!(!registry.off(1, "click", id));
        assert_eq!(registry.trigger(1, "click", Value::Null), 0);
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_trigger_scoped_to_node_and_event() {
        let registry = ListenerRegistry::new();
        registry.on(1, "click", Arc::new(|_| {}));

        assert_eq!(registry.trigger(2, "click", Value::Null), 0);
        assert_eq!(registry.trigger(1, "change", Value::Null), 0);
        assert_eq!(registry.trigger(1, "click", Value::Null), 1);
    }
}

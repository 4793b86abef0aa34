//! Per-target operation queue with immediate/normal/deferred lanes.
//!
//! Every chained call enqueues a work item instead of executing; a single
//! runner drains items strictly in order, awaiting each async result before
//! the next pop. Lane priority per iteration: immediate, then normal, then
//! deferred — all three checked under one lock acquisition, so items
//! appended to any lane mid-drain are observed, and the deferred lane is
//! only ever popped while both other lanes are simultaneously empty.
//!
//! Failures are caught at the item boundary, handed to the error sink with
//! their context, and the runner continues: one failing step never blocks
//! the rest of the chain. Cancellation is not supported.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::watch;

use crate::hook::{ChainError, ErrorContext, ErrorHook};
use crate::value::Lazy;

/// Which lane a work item waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Runs before any not-yet-started normal item. Never preempts the
    /// item already executing.
    Immediate,
    /// Arrival order, after the immediate lane drains.
    Normal,
    /// Held back until both other lanes are fully empty.
    Deferred,
}

/// The deferred action: resolved positional arguments in, async result out.
pub type Action =
    Box<dyn FnOnce(Vec<Value>) -> BoxFuture<'static, Result<Value, ChainError>> + Send>;

/// A unit of deferred execution: a thunk plus its arguments, preserved for
/// replay at run time, and the context reported if it fails.
pub struct WorkItem {
    pub(crate) ctx: ErrorContext,
    pub(crate) args: Vec<Lazy>,
    pub(crate) action: Action,
}

impl WorkItem {
    pub fn new(ctx: ErrorContext, args: Vec<Lazy>, action: Action) -> Self {
        Self { ctx, args, action }
    }
}

#[derive(Default)]
struct Lanes {
    immediate: VecDeque<WorkItem>,
    normal: VecDeque<WorkItem>,
    deferred: VecDeque<WorkItem>,
    /// Re-entrancy guard: at most one runner per queue.
    running: bool,
}

impl Lanes {
    fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.normal.is_empty() && self.deferred.is_empty()
    }
}

/// One queue per façade lineage. Exclusively owned by that lineage; nothing
/// external mutates the lanes directly.
pub struct OpQueue {
    lanes: Mutex<Lanes>,
    hook: ErrorHook,
    /// Publishes the running flag so `settled()` can wait for idle.
    state_tx: watch::Sender<bool>,
}

impl OpQueue {
    pub fn new(hook: ErrorHook) -> Arc<Self> {
        let (state_tx, _) = watch::channel(false);
        Arc::new(Self {
            lanes: Mutex::new(Lanes::default()),
            hook,
            state_tx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Lanes> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a work item. Starts the runner if the queue is idle; during an
    /// active run this only appends and returns.
    pub fn enqueue(self: &Arc<Self>, lane: Lane, item: WorkItem) {
        let start_runner = {
            let mut lanes = self.lock();
            match lane {
                Lane::Immediate => lanes.immediate.push_back(item),
                Lane::Normal => lanes.normal.push_back(item),
                Lane::Deferred => lanes.deferred.push_back(item),
            }
            if lanes.running {
                false
            } else {
                lanes.running = true;
                true
            }
        };

        if start_runner {
            let _ = self.state_tx.send(true);
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                queue.drain().await;
            });
        }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let item = {
                let mut lanes = self.lock();
                if let Some(item) = lanes.immediate.pop_front() {
                    Some(item)
                } else if let Some(item) = lanes.normal.pop_front() {
                    Some(item)
                } else if let Some(item) = lanes.deferred.pop_front() {
                    Some(item)
                } else {
                    // Idle transition happens under the same lock that
                    // observed all lanes empty.
                    lanes.running = false;
                    None
                }
            };

            let Some(item) = item else {
                let _ = self.state_tx.send(false);
                return;
            };

            self.run_item(item).await;
        }
    }

    /// Resolve pending arguments sequentially, invoke, await, and route any
    /// failure to the sink. The queue always continues.
    async fn run_item(&self, item: WorkItem) {
        let WorkItem { ctx, args, action } = item;

        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            resolved.push(arg.resolve().await);
        }

        if let Err(error) = (action)(resolved).await {
            tracing::debug!(operation = %ctx.operation, "queued item failed, skipping");
            self.hook.on_error(&error, &ctx).await;
        }
    }

    /// Resolves once the queue is idle with every lane empty.
    pub async fn settled(&self) {
        let mut rx = self.state_tx.subscribe();
        loop {
            // Mark the current version seen first, then check: an idle
            // transition in between is caught by the lock-guarded check, one
            // after it wakes `changed()`.
            rx.borrow_and_update();
            {
                let lanes = self.lock();
                if !lanes.running && lanes.is_empty() {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Pending item count across all lanes (excludes the in-flight item).
    pub fn pending(&self) -> usize {
        let lanes = self.lock();
        lanes.immediate.len() + lanes.normal.len() + lanes.deferred.len()
    }
}

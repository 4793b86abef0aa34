//! The chain façade: a fixed set of chainable operations over one target.
//!
//! Every operation enqueues a work item on the target's queue and returns a
//! façade immediately — synchronously, before the work runs — so chains
//! read top-to-bottom in intended execution order regardless of completion
//! timing. No dynamic proxying: the operation set is explicit, and
//! `nodes()` exposes the raw handles.
//!
//! Context-switching operations (`find`, `replace_with`) return a façade
//! bound to the new target on the same queue; previously returned façades
//! keep whatever binding they had at call time.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use dom::{parse_fragment, serializer, Document, NodeId, Selector};

use crate::events::{EventRef, Handler, ListenerRegistry};
use crate::hook::{ChainError, ErrorContext, ErrorHook, Result};
use crate::options::{ContentOptions, InsertMode, Pairing, Position, ReplaceOptions};
use crate::queue::{Action, Lane, OpQueue, WorkItem};
use crate::resolve::Source;
use crate::value::{value_text, Lazy};

pub(crate) fn lock_doc(doc: &Arc<Mutex<Document>>) -> MutexGuard<'_, Document> {
    doc.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Chainable view over a single element or an ordered collection.
///
/// Cloning is cheap and shares the queue; clones and derived façades form
/// one lineage with one ordering domain.
#[derive(Clone)]
pub struct Chain {
    doc: Arc<Mutex<Document>>,
    target: Vec<NodeId>,
    queue: Arc<OpQueue>,
    hook: ErrorHook,
    listeners: Arc<ListenerRegistry>,
    selector: Option<String>,
    chain_id: Uuid,
}

impl Chain {
    pub(crate) fn new(
        doc: Arc<Mutex<Document>>,
        target: Vec<NodeId>,
        queue: Arc<OpQueue>,
        hook: ErrorHook,
        listeners: Arc<ListenerRegistry>,
        selector: Option<String>,
    ) -> Self {
        Self {
            doc,
            target,
            queue,
            hook,
            listeners,
            selector,
            chain_id: Uuid::new_v4(),
        }
    }

    /// New façade over a different target, same queue and lineage.
    fn rebind(&self, target: Vec<NodeId>, selector: Option<String>) -> Self {
        Self {
            doc: Arc::clone(&self.doc),
            target,
            queue: Arc::clone(&self.queue),
            hook: Arc::clone(&self.hook),
            listeners: Arc::clone(&self.listeners),
            selector: selector.or_else(|| self.selector.clone()),
            chain_id: self.chain_id,
        }
    }

    fn context(&self, operation: &str) -> ErrorContext {
        ErrorContext {
            operation: operation.to_string(),
            selector: self.selector.clone(),
            target_len: self.target.len(),
            chain_id: self.chain_id,
            meta: Value::Null,
        }
    }

    fn enqueue_action(&self, lane: Lane, operation: &str, args: Vec<Lazy>, action: Action) {
        self.queue
            .enqueue(lane, WorkItem::new(self.context(operation), args, action));
    }

    /// Enqueue a document mutation over the bound target.
    fn enqueue_with<F>(&self, lane: Lane, operation: &str, args: Vec<Lazy>, f: F)
    where
        F: FnOnce(&mut Document, &[NodeId], &[Value]) -> Result<()> + Send + 'static,
    {
        let doc = Arc::clone(&self.doc);
        let target = self.target.clone();
        let action: Action = Box::new(move |values| {
            Box::pin(async move {
                let mut guard = lock_doc(&doc);
                f(&mut guard, &target, &values)?;
                Ok(Value::Null)
            })
        });
        self.enqueue_action(lane, operation, args, action);
    }

    /// Surface a synchronous planning failure through the queue so the
    /// error sink sees it in order.
    fn enqueue_failure(&self, operation: &str, error: ChainError) {
        let action: Action = Box::new(move |_| Box::pin(async move { Err(error) }));
        self.enqueue_action(Lane::Normal, operation, Vec::new(), action);
    }

    // ---- target access ----

    /// Raw handles of the bound target.
    pub fn nodes(&self) -> &[NodeId] {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub(crate) fn hook(&self) -> &ErrorHook {
        &self.hook
    }

    /// Resolves once every enqueued item on this lineage's queue has run.
    pub async fn settled(&self) {
        self.queue.settled().await;
    }

    // ---- attribute / class / style / content mutators ----

    pub fn attr(self, name: &str, value: impl Into<Lazy>) -> Self {
        let name = name.to_string();
        self.enqueue_with(
            Lane::Normal,
            "attr",
            vec![value.into()],
            move |doc, target, values| {
                let text = value_text(values.first().unwrap_or(&Value::Null));
                for &node in target {
                    doc.set_attr(node, &name, &text)?;
                }
                Ok(())
            },
        );
        self
    }

    pub fn remove_attr(self, name: &str) -> Self {
        let name = name.to_string();
        self.enqueue_with(Lane::Normal, "remove_attr", Vec::new(), move |doc, target, _| {
            for &node in target {
                doc.remove_attr(node, &name)?;
            }
            Ok(())
        });
        self
    }

    pub fn add_class(self, class: &str) -> Self {
        let class = class.to_string();
        self.enqueue_with(Lane::Normal, "add_class", Vec::new(), move |doc, target, _| {
            for &node in target {
                doc.add_class(node, &class)?;
            }
            Ok(())
        });
        self
    }

    pub fn remove_class(self, class: &str) -> Self {
        let class = class.to_string();
        self.enqueue_with(Lane::Normal, "remove_class", Vec::new(), move |doc, target, _| {
            for &node in target {
                doc.remove_class(node, &class)?;
            }
            Ok(())
        });
        self
    }

    pub fn toggle_class(self, class: &str) -> Self {
        let class = class.to_string();
        self.enqueue_with(Lane::Normal, "toggle_class", Vec::new(), move |doc, target, _| {
            for &node in target {
                doc.toggle_class(node, &class)?;
            }
            Ok(())
        });
        self
    }

    pub fn css(self, prop: &str, value: impl Into<Lazy>) -> Self {
        let prop = prop.to_string();
        self.enqueue_with(
            Lane::Normal,
            "css",
            vec![value.into()],
            move |doc, target, values| {
                let text = value_text(values.first().unwrap_or(&Value::Null));
                for &node in target {
                    doc.set_style_prop(node, &prop, &text)?;
                }
                Ok(())
            },
        );
        self
    }

    /// Replace the content of every target node with a single text node.
    pub fn text(self, value: impl Into<Lazy>) -> Self {
        self.enqueue_with(
            Lane::Normal,
            "text",
            vec![value.into()],
            move |doc, target, values| {
                let text = value_text(values.first().unwrap_or(&Value::Null));
                for &node in target {
                    doc.set_text(node, &text)?;
                }
                Ok(())
            },
        );
        self
    }

    /// Replace the content of every target node with parsed markup.
    /// Untrusted by default: the sanitizing parse path.
    pub fn html(self, markup: impl Into<Lazy>) -> Self {
        self.enqueue_with(
            Lane::Normal,
            "html",
            vec![markup.into()],
            move |doc, target, values| {
                let markup = value_text(values.first().unwrap_or(&Value::Null));
                for &node in target {
                    let children: Vec<NodeId> =
                        doc.get(node)?.children_ids.iter().copied().collect();
                    for child in children {
                        doc.detach(child)?;
                    }
                    // Fresh parse per node: each gets its own copy.
                    let roots = parse_fragment(doc, &markup, true)?;
                    for root in roots {
                        doc.append_child(node, root)?;
                    }
                }
                Ok(())
            },
        );
        self
    }

    /// Form control value.
    pub fn val(self, value: impl Into<Lazy>) -> Self {
        self.enqueue_with(
            Lane::Normal,
            "val",
            vec![value.into()],
            move |doc, target, values| {
                let text = value_text(values.first().unwrap_or(&Value::Null));
                for &node in target {
                    doc.set_value(node, &text)?;
                }
                Ok(())
            },
        );
        self
    }

    // ---- insertion / removal / replacement ----

    /// Insert content relative to every target node per `options`.
    pub fn insert(self, content: impl Into<Source>, options: ContentOptions) -> Self {
        let content = content.into();
        self.enqueue_with(Lane::Normal, "insert", Vec::new(), move |doc, target, _| {
            if target.is_empty() {
                return Ok(());
            }

            let source_nodes: Vec<NodeId> = materialize(doc, &content, options.sanitize)?;
            if source_nodes.is_empty() {
                return Ok(());
            }

            let default_mode = if target.len() > 1 {
                InsertMode::Clone
            } else {
                InsertMode::Move
            };
            let mode = options.mode.unwrap_or(default_mode);

            for (i, &t) in target.iter().enumerate() {
                let last = i + 1 == target.len();
                // Every target but the last receives clones no matter what.
                let placed: Vec<NodeId> = if last && mode == InsertMode::Move {
                    source_nodes.clone()
                } else {
                    source_nodes
                        .iter()
                        .map(|&n| doc.clone_subtree(n))
                        .collect::<dom::Result<_>>()?
                };

                match options.position {
                    Position::Append => {
                        for &n in &placed {
                            doc.append_child(t, n)?;
                        }
                    }
                    Position::Prepend => {
                        for &n in placed.iter().rev() {
                            doc.prepend_child(t, n)?;
                        }
                    }
                    Position::Before => {
                        for &n in &placed {
                            doc.insert_before(t, n)?;
                        }
                    }
                    Position::After => {
                        let mut anchor = t;
                        for &n in &placed {
                            doc.insert_after(anchor, n)?;
                            anchor = n;
                        }
                    }
                }
            }
            Ok(())
        });
        self
    }

    pub fn append(self, content: impl Into<Source>) -> Self {
        self.insert(content, ContentOptions::default())
    }

    pub fn prepend(self, content: impl Into<Source>) -> Self {
        self.insert(content, ContentOptions::at(Position::Prepend))
    }

    pub fn before(self, content: impl Into<Source>) -> Self {
        self.insert(content, ContentOptions::at(Position::Before))
    }

    pub fn after(self, content: impl Into<Source>) -> Self {
        self.insert(content, ContentOptions::at(Position::After))
    }

    /// Detach every target node from the tree.
    pub fn remove(self) -> Self {
        self.enqueue_with(Lane::Normal, "remove", Vec::new(), move |doc, target, _| {
            for &node in target {
                doc.detach(node)?;
            }
            Ok(())
        });
        self
    }

    /// Replace every target node; returns a façade bound to the
    /// replacements. Pairing of a short replacement list against a longer
    /// target is explicit (`Pairing`): cycle (default), pairwise, or
    /// remove — never silent truncation.
    pub fn replace_with(self, content: impl Into<Source>, options: ReplaceOptions) -> Self {
        let content = content.into();

        // Plan synchronously so the rebound façade is known now; the splice
        // itself runs in queue order.
        let plan = {
            let mut doc = lock_doc(&self.doc);
            plan_replace(&mut doc, &self.target, &content, &options)
        };

        match plan {
            Ok(plan) => {
                let new_target: Vec<NodeId> =
                    plan.iter().filter_map(|(_, new)| *new).collect();
                self.enqueue_with(
                    Lane::Normal,
                    "replace_with",
                    Vec::new(),
                    move |doc, _target, _| {
                        for (old, new) in plan {
                            match new {
                                Some(new) => doc.replace_node(old, new)?,
                                None => doc.detach(old)?,
                            }
                        }
                        Ok(())
                    },
                );
                self.rebind(new_target, None)
            }
            Err(error) => {
                self.enqueue_failure("replace_with", error);
                self
            }
        }
    }

    // ---- context switching ----

    /// Matching descendants of the current target. Resolution is
    /// synchronous; an unparseable selector warns and yields an empty
    /// façade.
    pub fn find(&self, selector: &str) -> Self {
        let parsed = match Selector::parse(selector) {
            Ok(sel) => sel,
            Err(error) => {
                tracing::warn!(selector, %error, "find: bad selector, empty result");
                return self.rebind(Vec::new(), Some(selector.to_string()));
            }
        };

        let doc = lock_doc(&self.doc);
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        for &t in &self.target {
            let _ = doc.traverse_df(t, |node| {
                if node.node_id != t
                    && node.is_element()
                    && parsed.matches(&doc, node.node_id)
                    && seen.insert(node.node_id)
                {
                    found.push(node.node_id);
                }
                Ok(())
            });
        }
        drop(doc);

        self.rebind(found, Some(selector.to_string()))
    }

    // ---- events ----

    /// Register an event listener on every target node (queued).
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&EventRef) + Send + Sync + 'static,
    {
        let listeners = Arc::clone(&self.listeners);
        let event = event.to_string();
        let handler: Handler = Arc::new(handler);
        let target = self.target.clone();
        let action: Action = Box::new(move |_| {
            Box::pin(async move {
                for &node in &target {
                    listeners.on(node, &event, Arc::clone(&handler));
                }
                Ok(Value::Null)
            })
        });
        self.enqueue_action(Lane::Normal, "on", Vec::new(), action);
        self
    }

    /// Remove every listener for `event` on the target nodes (queued).
    pub fn off(self, event: &str) -> Self {
        let listeners = Arc::clone(&self.listeners);
        let event = event.to_string();
        let target = self.target.clone();
        let action: Action = Box::new(move |_| {
            Box::pin(async move {
                for &node in &target {
                    listeners.off_all(node, &event);
                }
                Ok(Value::Null)
            })
        });
        self.enqueue_action(Lane::Normal, "off", Vec::new(), action);
        self
    }

    /// Dispatch `event` to every target node's listeners, in queue order.
    /// The document lock is not held during dispatch, so handlers are free
    /// to read the document or enqueue further chained work.
    pub fn trigger(self, event: &str) -> Self {
        self.trigger_with(event, Value::Null)
    }

    pub fn trigger_with(self, event: &str, detail: impl Into<Lazy>) -> Self {
        let listeners = Arc::clone(&self.listeners);
        let event = event.to_string();
        let target = self.target.clone();
        let action: Action = Box::new(move |values| {
            Box::pin(async move {
                let detail = values.into_iter().next().unwrap_or(Value::Null);
                for &node in &target {
                    listeners.trigger(node, &event, detail.clone());
                }
                Ok(Value::Null)
            })
        });
        self.enqueue_action(Lane::Normal, "trigger", vec![detail.into()], action);
        self
    }

    // ---- sequencing ----

    /// Timer item: the queue pauses here for `duration`.
    pub fn wait(self, duration: Duration) -> Self {
        let action: Action = Box::new(move |_| {
            Box::pin(async move {
                tokio::time::sleep(duration).await;
                Ok(Value::Null)
            })
        });
        self.enqueue_action(Lane::Normal, "wait", Vec::new(), action);
        self
    }

    /// Run a user callback and wait for it. The callback receives a fresh
    /// façade over the same target for escape-hatch access.
    pub fn run<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Chain) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let escape = self.clone();
        let action: Action = Box::new(move |_| Box::pin(async move { f(escape).await.map(|_| Value::Null) }));
        self.enqueue_action(Lane::Normal, "run", Vec::new(), action);
        self
    }

    /// Immediate-lane variant of [`run`](Self::run): runs before any
    /// not-yet-started normal item, never preempting the one in flight.
    pub fn run_first<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Chain) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let escape = self.clone();
        let action: Action = Box::new(move |_| Box::pin(async move { f(escape).await.map(|_| Value::Null) }));
        self.enqueue_action(Lane::Immediate, "run_first", Vec::new(), action);
        self
    }

    /// Defer to the very end: captured now, executed only after every
    /// previously- and concurrently-enqueued immediate/normal work on this
    /// queue has finished.
    pub fn defer<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Chain) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let escape = self.clone();
        let action: Action = Box::new(move |_| Box::pin(async move { f(escape).await.map(|_| Value::Null) }));
        self.enqueue_action(Lane::Deferred, "defer", Vec::new(), action);
        self
    }

    /// Deferred-lane callback with positional arguments, preserved at call
    /// time and resolved (pending ones awaited in order) at run time.
    pub fn defer_with<F, Fut>(self, args: Vec<Lazy>, f: F) -> Self
    where
        F: FnOnce(Chain, Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let escape = self.clone();
        let action: Action =
            Box::new(move |values| Box::pin(async move { f(escape, values).await.map(|_| Value::Null) }));
        self.enqueue_action(Lane::Deferred, "defer", args, action);
        self
    }

    // ---- immediate reads (bypass queue ordering) ----

    /// Attribute of the first target node, read immediately.
    pub fn attr_now(&self, name: &str) -> Option<String> {
        let doc = lock_doc(&self.doc);
        self.target
            .first()
            .and_then(|&node| doc.get(node).ok())
            .and_then(|n| n.attr(name).map(String::from))
    }

    /// Concatenated text of the first target node, read immediately.
    pub fn text_now(&self) -> String {
        let doc = lock_doc(&self.doc);
        self.target
            .first()
            .and_then(|&node| doc.text_content(node).ok())
            .unwrap_or_default()
    }

    /// Inner HTML of the first target node, read immediately.
    pub fn html_now(&self) -> String {
        let doc = lock_doc(&self.doc);
        self.target
            .first()
            .and_then(|&node| serializer::inner_html(&doc, node).ok())
            .unwrap_or_default()
    }

    /// Outer HTML of the first target node, read immediately.
    pub fn outer_html_now(&self) -> String {
        let doc = lock_doc(&self.doc);
        self.target
            .first()
            .and_then(|&node| serializer::outer_html(&doc, node).ok())
            .unwrap_or_default()
    }

    /// Form value of the first target node, read immediately.
    pub fn val_now(&self) -> Option<String> {
        let doc = lock_doc(&self.doc);
        self.target
            .first()
            .and_then(|&node| doc.value(node).ok())
            .flatten()
    }
}

/// Turn a content source into concrete detached-or-connected node ids.
fn materialize(doc: &mut Document, content: &Source, sanitize: bool) -> Result<Vec<NodeId>> {
    Ok(match content {
        // Opting out at either layer (trusted source, per-call option)
        // skips the sanitizer.
        Source::Markup {
            markup,
            sanitize: source_sanitize,
        } => parse_fragment(doc, markup, sanitize && *source_sanitize)?,
        Source::Node(id) => vec![*id],
        Source::Nodes(ids) => ids.clone(),
        Source::Selector(text) => Selector::parse(text)?.query_all(doc),
    })
}

/// Pair each target with its replacement (or None = remove), materializing
/// clones up front so the rebound façade's handles exist immediately.
fn plan_replace(
    doc: &mut Document,
    target: &[NodeId],
    content: &Source,
    options: &ReplaceOptions,
) -> Result<Vec<(NodeId, Option<NodeId>)>> {
    let reps = materialize(doc, content, options.sanitize)?;
    let mut moved = vec![false; reps.len()];
    let mut plan = Vec::with_capacity(target.len());

    for (i, &t) in target.iter().enumerate() {
        let rep_idx = match options.pairing {
            Pairing::Cycle => {
                if reps.is_empty() {
                    None
                } else {
                    Some(i % reps.len())
                }
            }
            Pairing::Pairwise | Pairing::Remove => {
                if i < reps.len() {
                    Some(i)
                } else {
                    None
                }
            }
        };

        match rep_idx {
            Some(idx) => {
                let node = if options.mode == InsertMode::Move && !moved[idx] {
                    moved[idx] = true;
                    reps[idx]
                } else {
                    doc.clone_subtree(reps[idx])?
                };
                plan.push((t, Some(node)));
            }
            None => {
                if options.pairing == Pairing::Remove {
                    plan.push((t, None));
                }
                // Pairwise leaves unpaired targets alone.
            }
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::test_support::RecordingSink;
    use crate::page::Page;
    use crate::value::Lazy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn batch_attr_over_collection() {
        let page = Page::from_html("<ul><li>a</li><li>b</li><li>c</li></ul>").unwrap();
        let items = page.select("li").attr("data-done", "1").add_class("done");
        items.settled().await;
        assert_eq!(
            page.html(),
            "<ul><li class=\"done\" data-done=\"1\">a</li>\
             <li class=\"done\" data-done=\"1\">b</li>\
             <li class=\"done\" data-done=\"1\">c</li></ul>"
        );
    }

    #[tokio::test]
    async fn chain_runs_in_written_order_across_waits() {
        let page = Page::from_html("<p>old</p>").unwrap();
        let chain = page
            .first("p")
            .text("one")
            .wait(Duration::from_millis(10))
            .attr("x", "2");
        chain.settled().await;
        assert_eq!(page.html(), "<p x=\"2\">one</p>");
    }

    #[tokio::test]
    async fn failed_item_is_skipped_and_the_rest_runs() {
        let sink = RecordingSink::new();
        let page = Page::with_hook(sink.clone());
        let chain = page
            .select("<div></div>")
            .run(|_| async { Err(ChainError::execution("run", "boom")) })
            .attr("ok", "1");
        chain.settled().await;
        assert_eq!(sink.count(), 1);
        assert_eq!(chain.attr_now("ok").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn insert_positions() {
        let page = Page::from_html("<div id=\"host\"><span>mid</span></div>").unwrap();
        let host = page.select("#host").prepend("<b>first</b>").append("<i>last</i>");
        host.settled().await;
        let span = page.select("span").before("<a>pre</a>").after("<em>post</em>");
        span.settled().await;
        assert_eq!(
            page.html(),
            "<div id=\"host\"><b>first</b><a>pre</a><span>mid</span><em>post</em><i>last</i></div>"
        );
    }

    #[tokio::test]
    async fn multi_target_insert_clones_content() {
        let page =
            Page::from_html("<div class=\"a\"></div><div class=\"a\"></div>").unwrap();
        let divs = page.select(".a").append("<span>x</span>");
        divs.settled().await;
        assert_eq!(
            page.html(),
            "<div class=\"a\"><span>x</span></div><div class=\"a\"><span>x</span></div>"
        );
    }

    #[tokio::test]
    async fn replace_with_cycles_short_replacement_list() {
        let page = Page::from_html("<p>1</p><p>2</p><p>3</p>").unwrap();
        let reps = page
            .select("p")
            .replace_with("<h2>t</h2>", ReplaceOptions::default());
        assert_eq!(reps.len(), 3);
        reps.settled().await;
        assert_eq!(page.html(), "<h2>t</h2><h2>t</h2><h2>t</h2>");
    }

    #[tokio::test]
    async fn replace_with_pairwise_leaves_unpaired_targets() {
        let page = Page::from_html("<p>1</p><p>2</p><p>3</p>").unwrap();
        let options = ReplaceOptions {
            pairing: Pairing::Pairwise,
            ..Default::default()
        };
        let reps = page.select("p").replace_with("<h2>t</h2>", options);
        assert_eq!(reps.len(), 1);
        reps.settled().await;
        assert_eq!(page.html(), "<h2>t</h2><p>2</p><p>3</p>");
    }

    #[tokio::test]
    async fn replace_with_remove_drops_unpaired_targets() {
        let page = Page::from_html("<p>1</p><p>2</p><p>3</p>").unwrap();
        let options = ReplaceOptions {
            pairing: Pairing::Remove,
            ..Default::default()
        };
        let reps = page.select("p").replace_with("<h2>t</h2>", options);
        reps.settled().await;
        assert_eq!(page.html(), "<h2>t</h2>");
    }

    #[tokio::test]
    async fn find_scopes_to_descendants() {
        let page = Page::from_html(
            "<div id=\"a\"><p class=\"x\">1</p><span></span></div><p class=\"x\">2</p>",
        )
        .unwrap();
        let scoped = page.select("#a").find("p.x");
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped.text_now(), "1");
    }

    #[tokio::test]
    async fn listeners_fire_per_trigger_in_queue_order() {
        let page = Page::from_html("<button>go</button>").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let chain = page
            .select("button")
            .on("ping", move |ev| {
                if ev.event == "ping" {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            })
            .trigger("ping")
            .trigger("ping");
        chain.settled().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn trigger_passes_detail_through() {
        let page = Page::from_html("<div></div>").unwrap();
        let got = Arc::new(Mutex::new(Value::Null));
        let slot = Arc::clone(&got);
        let chain = page
            .select("div")
            .on("data", move |ev| {
                *slot.lock().unwrap() = ev.detail.clone();
            })
            .trigger_with("data", serde_json::json!({"n": 1}));
        chain.settled().await;
        assert_eq!(*got.lock().unwrap(), serde_json::json!({"n": 1}));
    }

    #[tokio::test]
    async fn pending_argument_resolves_before_apply() {
        let page = Page::from_html("<p></p>").unwrap();
        let chain = page.first("p").attr(
            "data-user",
            Lazy::future(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                "alice"
            }),
        );
        chain.settled().await;
        assert_eq!(page.html(), "<p data-user=\"alice\"></p>");
    }

    #[tokio::test]
    async fn remove_detaches_targets() {
        let page = Page::from_html("<div><p>x</p></div>").unwrap();
        let ps = page.select("p").remove();
        ps.settled().await;
        assert_eq!(page.html(), "<div></div>");
    }

    #[tokio::test]
    async fn defer_runs_after_normal_work() {
        let page = Page::from_html("<div></div>").unwrap();
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (a, b, late) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let chain = page
            .select("div")
            .defer(move |_| async move {
                late.lock().unwrap().push("late");
                Ok(())
            })
            .run(move |_| async move {
                a.lock().unwrap().push("a");
                Ok(())
            })
            .run(move |_| async move {
                b.lock().unwrap().push("b");
                Ok(())
            });
        chain.settled().await;
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "late"]);
    }

    #[tokio::test]
    async fn html_setter_sanitizes_untrusted_markup() {
        let page = Page::from_html("<div>old</div>").unwrap();
        let chain = page
            .select("div")
            .html("<span onclick=\"x()\">ok</span><script>evil()</script>");
        chain.settled().await;
        assert_eq!(page.html(), "<div><span>ok</span></div>");
    }
}

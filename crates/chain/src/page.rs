//! Page: owns the document and hands out chain façades.
//!
//! Each `select`/`first` call starts a fresh queue, so independent chains
//! interleave freely; façades derived from one chain (`find`,
//! `replace_with`, clones) stay on their originating queue.

use std::sync::{Arc, Mutex};

use dom::{parse_fragment, serializer, Document, NodeId};

use crate::chain::{lock_doc, Chain};
use crate::events::ListenerRegistry;
use crate::hook::{default_hook, ChainError, ErrorHook, Result};
use crate::queue::OpQueue;
use crate::resolve::{resolve, Mode, Source};

fn describe(source: &Source) -> &str {
    source.selector_text().unwrap_or("(non-selector source)")
}

pub struct Page {
    doc: Arc<Mutex<Document>>,
    listeners: Arc<ListenerRegistry>,
    hook: ErrorHook,
}

impl Page {
    /// Empty document: just a root.
    pub fn new() -> Self {
        Self::with_hook(default_hook())
    }

    pub fn with_hook(hook: ErrorHook) -> Self {
        Self {
            doc: Arc::new(Mutex::new(Document::new())),
            listeners: ListenerRegistry::new(),
            hook,
        }
    }

    /// Document parsed from trusted markup (no sanitizing), appended under
    /// the root.
    pub fn from_html(markup: &str) -> Result<Self> {
        let page = Self::new();
        {
            let mut doc = lock_doc(&page.doc);
            let root = doc.root_id();
            let nodes = parse_fragment(&mut doc, markup, false)?;
            for node in nodes {
                doc.append_child(root, node)?;
            }
        }
        Ok(page)
    }

    fn chain(&self, target: Vec<NodeId>, selector: Option<String>) -> Chain {
        Chain::new(
            Arc::clone(&self.doc),
            target,
            OpQueue::new(Arc::clone(&self.hook)),
            Arc::clone(&self.hook),
            Arc::clone(&self.listeners),
            selector,
        )
    }

    /// All matches (or parsed markup, or wrapped handles), lenient: an
    /// empty result warns and yields an empty façade whose batch
    /// operations are no-ops.
    pub fn select(&self, source: impl Into<Source>) -> Chain {
        let source = source.into();
        let target = {
            let mut doc = lock_doc(&self.doc);
            resolve(&mut doc, &source, Mode::All)
        };
        match target {
            Ok(target) => {
                if target.is_empty() {
                    tracing::warn!(source = describe(&source), "select: empty target");
                }
                self.chain(target, source.selector_text().map(String::from))
            }
            Err(error) => {
                tracing::warn!(source = describe(&source), %error, "select: resolution failed");
                self.chain(Vec::new(), source.selector_text().map(String::from))
            }
        }
    }

    /// First match only.
    pub fn first(&self, source: impl Into<Source>) -> Chain {
        let source = source.into();
        let target = {
            let mut doc = lock_doc(&self.doc);
            resolve(&mut doc, &source, Mode::First)
        };
        match target {
            Ok(target) => {
                if target.is_empty() {
                    tracing::warn!(source = describe(&source), "first: empty target");
                }
                self.chain(target, source.selector_text().map(String::from))
            }
            Err(error) => {
                tracing::warn!(source = describe(&source), %error, "first: resolution failed");
                self.chain(Vec::new(), source.selector_text().map(String::from))
            }
        }
    }

    /// Strict resolution: an empty result is an error instead of an empty
    /// façade.
    pub fn try_select(&self, source: impl Into<Source>) -> Result<Chain> {
        let source = source.into();
        let target = {
            let mut doc = lock_doc(&self.doc);
            resolve(&mut doc, &source, Mode::All)?
        };
        if target.is_empty() {
            return Err(ChainError::Resolution {
                selector: describe(&source).to_string(),
            });
        }
        Ok(self.chain(target, source.selector_text().map(String::from)))
    }

    pub fn try_first(&self, source: impl Into<Source>) -> Result<Chain> {
        let source = source.into();
        let target = {
            let mut doc = lock_doc(&self.doc);
            resolve(&mut doc, &source, Mode::First)?
        };
        if target.is_empty() {
            return Err(ChainError::Resolution {
                selector: describe(&source).to_string(),
            });
        }
        Ok(self.chain(target, source.selector_text().map(String::from)))
    }

    /// Serialized markup of everything under the root.
    pub fn html(&self) -> String {
        let doc = lock_doc(&self.doc);
        serializer::inner_html(&doc, doc.root_id()).unwrap_or_default()
    }

    /// Shared document handle, for direct inspection.
    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.doc)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_html_roundtrip() {
        let page = Page::from_html("<div id=\"a\"><p>hi</p></div>").unwrap();
        assert_eq!(page.html(), "<div id=\"a\"><p>hi</p></div>");
    }

    #[tokio::test]
    async fn select_missing_is_lenient() {
        let page = Page::from_html("<div></div>").unwrap();
        let chain = page.select("#missing");
        assert!(chain.is_empty());
        // Batch operations over an empty target are silent no-ops.
        let chain = chain.attr("x", "1").add_class("y");
        chain.settled().await;
        assert_eq!(page.html(), "<div></div>");
    }

    #[tokio::test]
    async fn try_select_missing_is_strict() {
        let page = Page::from_html("<div></div>").unwrap();
        let err = page.try_select("#missing").err().unwrap();
        assert!(matches!(err, ChainError::Resolution { .. }));
    }

    #[tokio::test]
    async fn markup_source_builds_detached_element() {
        let page = Page::new();
        let chain = page.select("<div class=\"card\"></div>");
        assert_eq!(chain.len(), 1);
        // Not in the page until inserted somewhere.
        assert_eq!(page.html(), "");
        assert_eq!(chain.outer_html_now(), "<div class=\"card\"></div>");
    }

    #[tokio::test]
    async fn trusted_markup_source_keeps_scripts() {
        let page = Page::new();
        let chain = page.select(Source::trusted_markup("<div><script>boot()</script></div>"));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.html_now(), "<script>boot()</script>");
    }

    #[tokio::test]
    async fn first_takes_one_of_many() {
        let page = Page::from_html("<p>a</p><p>b</p>").unwrap();
        assert_eq!(page.first("p").len(), 1);
        assert_eq!(page.select("p").len(), 2);
    }
}

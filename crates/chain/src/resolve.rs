//! Target resolution: classify a selector-like input and produce concrete
//! node handles. Synchronous; no queueing.

use dom::{parse_fragment, Document, NodeId, Selector};

use crate::hook::Result;

/// What a façade can be built from.
#[derive(Debug, Clone)]
pub enum Source {
    /// CSS selector string.
    Selector(String),
    /// Markup fragment (input beginning with `<`); parsed into detached
    /// nodes, never matched against existing document content. Sanitized
    /// unless built through [`Source::trusted_markup`].
    Markup { markup: String, sanitize: bool },
    /// An existing handle, wrapped as a one-element sequence.
    Node(NodeId),
    /// An existing ordered collection.
    Nodes(Vec<NodeId>),
}

impl From<&str> for Source {
    fn from(input: &str) -> Self {
        if input.trim_start().starts_with('<') {
            Source::Markup {
                markup: input.to_string(),
                sanitize: true,
            }
        } else {
            Source::Selector(input.to_string())
        }
    }
}

impl From<String> for Source {
    fn from(input: String) -> Self {
        Source::from(input.as_str())
    }
}

impl From<NodeId> for Source {
    fn from(node: NodeId) -> Self {
        Source::Node(node)
    }
}

impl From<Vec<NodeId>> for Source {
    fn from(nodes: Vec<NodeId>) -> Self {
        Source::Nodes(nodes)
    }
}

impl Source {
    /// Markup from a trusted producer: parsed without sanitizing, keeping
    /// scripts, event handler attributes, and the rest.
    pub fn trusted_markup(markup: impl Into<String>) -> Self {
        Source::Markup {
            markup: markup.into(),
            sanitize: false,
        }
    }

    /// The selector text, for diagnostics.
    pub fn selector_text(&self) -> Option<&str> {
        match self {
            Source::Selector(s) => Some(s),
            _ => None,
        }
    }
}

/// First-match returns at most one handle; all-match every match in
/// document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    First,
    All,
}

/// Resolve a source against the document. An empty result is not an error
/// here; strictness is the caller's policy.
pub fn resolve(doc: &mut Document, source: &Source, mode: Mode) -> Result<Vec<NodeId>> {
    match source {
        Source::Node(id) => {
            doc.get(*id)?;
            Ok(vec![*id])
        }
        Source::Nodes(ids) => Ok(ids.clone()),
        Source::Markup { markup, sanitize } => Ok(parse_fragment(doc, markup, *sanitize)?),
        Source::Selector(text) => {
            let selector = Selector::parse(text)?;
            Ok(match mode {
                Mode::First => selector.query_first(doc).into_iter().collect(),
                Mode::All => selector.query_all(doc),
            })
        }
    }
}

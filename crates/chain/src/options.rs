//! Per-call options for content insertion and replacement.

use serde::{Deserialize, Serialize};

/// Where inserted content lands relative to each target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Append,
    Prepend,
    Before,
    After,
}

/// Whether source nodes are moved into place or copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    Move,
    Clone,
}

/// Options for `insert` and its `append`/`prepend`/`before`/`after`
/// wrappers.
#[derive(Debug, Clone)]
pub struct ContentOptions {
    pub position: Position,
    /// Untrusted markup goes through the sanitizing parse path.
    pub sanitize: bool,
    /// `None` picks the documented default: Move for a single-node target,
    /// Clone for a collection. Every target before the last always receives
    /// clones regardless.
    pub mode: Option<InsertMode>,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            position: Position::Append,
            sanitize: true,
            mode: None,
        }
    }
}

impl ContentOptions {
    pub fn at(position: Position) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// How replacements pair up with a larger target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    /// Replacement list cycles over the targets.
    #[default]
    Cycle,
    /// Index-by-index; unpaired targets are left alone.
    Pairwise,
    /// Index-by-index; unpaired targets are removed.
    Remove,
}

/// Options for `replace_with`.
#[derive(Debug, Clone)]
pub struct ReplaceOptions {
    pub mode: InsertMode,
    pub pairing: Pairing,
    pub sanitize: bool,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            mode: InsertMode::Clone,
            pairing: Pairing::Cycle,
            sanitize: true,
        }
    }
}

//! In-memory DOM: arena storage, selectors, fragment parsing, serialization.
//!
//! ## Core Design
//!
//! ```text
//! markup → parser → Document (arena, NodeId = u32) → selector / serializer
//! ```
//!
//! - Arena storage: one Vec, u32 indices, no Rc/Arc per node
//! - Detached and connected nodes share the arena; queries only see the
//!   connected tree
//! - Sanitizing parse path is the default for untrusted markup

pub mod arena;
pub mod error;
pub mod parser;
pub mod selector;
pub mod serializer;
pub mod types;

pub use arena::Document;
pub use error::{DomError, Result};
pub use parser::parse_fragment;
pub use selector::Selector;
pub use types::*;

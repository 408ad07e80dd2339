//! Structured store: an arena tree of labeled, attributed nodes
//!
//! - [`node`] - the [`Document`] arena and its mutation primitives
//! - [`path`] - path-expression queries over a document
//! - [`persist`] - JSON load/save

pub mod node;
pub mod path;
pub mod persist;

pub use node::{Descendants, Document, NodeId};
pub use path::{literal, Match, Matches, QueryEngine};

//! Duden article text: parse tree (`C11`), reference resolution (`C12`).

pub mod parser;
pub mod reference;
pub mod tree;

pub use parser::parse;
pub use tree::{Alignment, Node, NodeId, NodeKind, Tree};

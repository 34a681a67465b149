//! Abstract Syntax Tree definitions
//!
//! The tree is produced by an external parser (or deserialized from JSON) and
//! consumed by [`crate::compiler`]. It carries no grammar knowledge beyond the
//! node shapes themselves.

pub mod build;
mod expr;
mod span;
mod types;

pub use expr::*;
pub use span::*;
pub use types::*;

use serde::{Deserialize, Serialize};

/// A program is the body of the top-level scope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Block,
}

impl Program {
    pub fn new(body: Block) -> Self {
        Self { body }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

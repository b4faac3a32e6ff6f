//! # treed
//!
//! An in-memory, concurrent, hierarchical namespace. Every directory
//! (`Node`) in the tree is guarded by its own reader/writer `Monitor`, so
//! operations on unrelated subtrees never contend with each other — only
//! operations that share an ancestor do, and only for as long as the descent
//! actually needs that ancestor.
//!
//! ```
//! use treed::Tree;
//!
//! let tree = Tree::new();
//! tree.create("/a/").unwrap();
//! tree.create("/a/b/").unwrap();
//! assert_eq!(tree.list("/a/").unwrap(), "b");
//! ```

mod config;
mod error;
mod map;
mod monitor;
mod node;
mod ops;

pub use config::{init_default_logger, limits_from_env};
pub use error::{TreeError, TreeResult};

use libtreed::path::Limits;
use node::Node;
use std::sync::Arc;

/// A concurrent, hierarchical namespace rooted at `/`.
///
/// Cloning a `Tree` is cheap and shares the same underlying nodes — clone it
/// the way callers clone an `Arc`, to hand a handle to another thread.
#[derive(Clone)]
pub struct Tree {
    root: Arc<Node>,
    limits: Limits,
}

impl Tree {
    /// Creates an empty tree with [`Limits::default`].
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Creates an empty tree with the given structural limits. See
    /// [`limits_from_env`] to source these from the environment instead.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            root: Node::new(),
            limits,
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

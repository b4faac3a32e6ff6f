//! # ChildMap
//!
//! Unlike `coredb`'s `Coremap`, which wraps a `DashMap` because nothing else
//! guards concurrent access to it, a node's child map is never touched
//! without its owning [`Monitor`](crate::monitor::Monitor) already held in the
//! right mode. Giving it its own internal synchronization on top of that
//! would be redundant at best and a second, uncoordinated lock order at
//! worst — so this is a plain `HashMap`.

use crate::node::Node;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct ChildMap {
    inner: HashMap<String, Arc<Node>>,
}

impl ChildMap {
    pub(crate) fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Arc<Node>> {
        self.inner.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub(crate) fn insert(&mut self, name: String, node: Arc<Node>) {
        self.inner.insert(name, node);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<Node>> {
        self.inner.remove(name)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(|s| s.as_str())
    }
}

//! # Node
//!
//! A `Node` is a child map guarded by a monitor. The map itself lives behind
//! an `UnsafeCell`, exactly the way `coredb::lock::QuickLock` keeps its
//! payload behind one: the cell grants no safety on its own, it's the
//! monitor's admission protocol that makes `children()`/`children_mut()`
//! sound to call. Every access path in this crate goes through
//! [`LockChain`], which is the only thing allowed to construct the unsafe
//! borrows.

use crate::map::ChildMap;
use crate::monitor::Monitor;
use std::cell::UnsafeCell;
use std::sync::Arc;

pub(crate) struct Node {
    monitor: Monitor,
    children: UnsafeCell<ChildMap>,
}

// SAFETY: `children` is only ever read through `children()` (which requires
// the caller to already hold `monitor` for reading) or `children_mut()`
// (which requires the caller to hold `monitor` for writing, i.e.
// exclusively). The monitor enforces that no other thread can hold a
// conflicting borrow while either of those is live.
unsafe impl Sync for Node {}
unsafe impl Send for Node {}

impl Node {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            monitor: Monitor::new(),
            children: UnsafeCell::new(ChildMap::new()),
        })
    }

    /// SAFETY: caller must either hold `self.monitor` in read or write mode,
    /// or hold some ancestor's monitor in write mode (which makes this
    /// node's whole subtree transitively exclusive, since no other thread
    /// can acquire any lock within it without first being admitted as a
    /// reader on that ancestor).
    pub(crate) unsafe fn children(&self) -> &ChildMap {
        &*self.children.get()
    }

    /// SAFETY: see [`Node::children`]; the held lock must grant exclusive
    /// rather than shared access.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn children_mut(&self) -> &mut ChildMap {
        &mut *self.children.get()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Mode {
    Read,
    Write,
}

/// One admitted lock, released on drop.
struct Held {
    node: Arc<Node>,
    mode: Mode,
}

impl Drop for Held {
    fn drop(&mut self) {
        match self.mode {
            Mode::Read => self.node.monitor.end_read(),
            Mode::Write => self.node.monitor.end_write(),
        }
    }
}

/// The set of monitors held for a single tree operation, in root-to-leaf
/// acquisition order.
///
/// Locks are always released leaf-to-root: dropping a `LockChain` pops and
/// drops its `Held` entries from the back, which is the reverse of
/// acquisition order. This holds even when a `LockChain` is dropped mid-way
/// through an operation by an early return or an unwinding panic, which is
/// what lets the rest of this crate release locks structurally instead of
/// threading a release call through every error path by hand.
#[derive(Default)]
pub(crate) struct LockChain {
    held: Vec<Held>,
}

impl LockChain {
    pub(crate) fn new() -> Self {
        Self { held: Vec::new() }
    }

    pub(crate) fn push_read(&mut self, node: Arc<Node>) {
        node.monitor.begin_read();
        self.held.push(Held {
            node,
            mode: Mode::Read,
        });
    }

    pub(crate) fn push_write(&mut self, node: Arc<Node>) {
        node.monitor.begin_write();
        self.held.push(Held {
            node,
            mode: Mode::Write,
        });
    }

    /// The most recently acquired node in this chain.
    pub(crate) fn last(&self) -> &Arc<Node> {
        &self.held.last().expect("lock chain is empty").node
    }

    /// SAFETY: the last-pushed lock must currently be held in read mode.
    pub(crate) unsafe fn last_children(&self) -> &ChildMap {
        self.last().children()
    }

    /// SAFETY: the last-pushed lock must currently be held in write mode.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn last_children_mut(&self) -> &mut ChildMap {
        self.last().children_mut()
    }

    /// Releases and drops every held lock, deepest first.
    pub(crate) fn release_all(&mut self) {
        while self.held.pop().is_some() {}
    }
}

impl Drop for LockChain {
    fn drop(&mut self) {
        self.release_all();
    }
}

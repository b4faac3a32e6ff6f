//! # Tree operations
//!
//! `create`, `remove`, `list` and `move_path` all follow the same descent
//! shape: lock every ancestor of the target as a reader, lock the target
//! itself in whatever mode the mutation needs, do the work, and let the
//! [`LockChain`] unwind the locks leaf-to-root on return. `move_path` is the
//! one operation that needs more than a single root-to-leaf chain — it locks
//! the lowest common ancestor of its two paths as a writer and then walks the
//! rest of both paths unlocked, since holding an ancestor exclusively already
//! makes the whole subtree beneath it exclusive to this thread.

use crate::error::TreeError;
use crate::node::{LockChain, Mode, Node};
use crate::Tree;
use libtreed::path::{
    find_common_path, is_path_valid, make_map_contents_string, make_path_to_parent, split_path,
    ROOT,
};
use std::sync::Arc;

type Result<T> = std::result::Result<T, TreeError>;

/// Walks from `root` along `path`, locking every ancestor as a reader and the
/// node identified by `path` itself in `final_mode`. On a missing component,
/// returns `Enoent` and the partially built chain is dropped, releasing every
/// lock acquired so far.
fn descend(root: &Arc<Node>, path: &str, final_mode: Mode) -> Result<LockChain> {
    let mut chain = LockChain::new();
    if path == ROOT {
        match final_mode {
            Mode::Read => chain.push_read(root.clone()),
            Mode::Write => chain.push_write(root.clone()),
        }
        return Ok(chain);
    }
    chain.push_read(root.clone());
    let mut remaining = path;
    loop {
        let (component, rest) = split_path(remaining).expect("non-root path always splits");
        let child = unsafe { chain.last_children() }.get(component).cloned();
        let child = child.ok_or(TreeError::Enoent)?;
        if rest == ROOT {
            match final_mode {
                Mode::Read => chain.push_read(child),
                Mode::Write => chain.push_write(child),
            }
            return Ok(chain);
        }
        chain.push_read(child);
        remaining = rest;
    }
}

/// Walks from `start` (already held exclusively by the caller, transitively
/// covering everything beneath it) along `relative`, without touching any
/// monitor. Mirrors the original reference implementation's unlocked
/// same-subtree descent, used only while an ancestor write lock is held.
///
/// SAFETY: `start`'s subtree must currently be exclusive to this thread —
/// i.e. some ancestor of `start` (or `start` itself) is held in write mode by
/// this thread's [`LockChain`], and no other lock acquisition anywhere in
/// that subtree can be in flight.
unsafe fn resolve_unlocked(start: &Arc<Node>, relative: &str) -> Option<Arc<Node>> {
    if relative == ROOT {
        return Some(start.clone());
    }
    let mut current = start.clone();
    let mut remaining = relative;
    loop {
        let (component, rest) = split_path(remaining).expect("relative path always splits");
        let next = current.children().get(component).cloned()?;
        if rest == ROOT {
            return Some(next);
        }
        current = next;
        remaining = rest;
    }
}

impl Tree {
    /// Creates the directory named by `path`. `path`'s parent must already
    /// exist; `path` itself must not.
    pub fn create(&self, path: &str) -> Result<()> {
        if !is_path_valid(path, &self.limits) {
            return Err(TreeError::Einval);
        }
        if path == ROOT {
            return Err(TreeError::Eexist);
        }
        let (parent, name) = make_path_to_parent(path).expect("path != ROOT was checked above");
        let mut chain = descend(&self.root, parent, Mode::Write)?;
        let children = unsafe { chain.last_children_mut() };
        if children.contains(name) {
            return Err(TreeError::Eexist);
        }
        children.insert(name.to_owned(), Node::new());
        log::debug!("created {}", path);
        Ok(())
    }

    /// Removes the empty directory named by `path`.
    pub fn remove(&self, path: &str) -> Result<()> {
        if !is_path_valid(path, &self.limits) {
            return Err(TreeError::Einval);
        }
        if path == ROOT {
            return Err(TreeError::Ebusy);
        }
        let (parent, name) = make_path_to_parent(path).expect("path != ROOT was checked above");
        let mut chain = descend(&self.root, parent, Mode::Write)?;
        let children = unsafe { chain.last_children_mut() };
        let target = children.get(name).cloned().ok_or(TreeError::Enoent)?;
        // SAFETY: `parent` is held exclusively in this chain, so `target`'s
        // subtree cannot be concurrently entered by any other thread.
        if !unsafe { target.children() }.is_empty() {
            return Err(TreeError::Enotempty);
        }
        children.remove(name);
        log::debug!("removed {}", path);
        Ok(())
    }

    /// Lists the immediate children of `path` as a comma-joined string, in
    /// the underlying map's iteration order.
    pub fn list(&self, path: &str) -> Result<String> {
        if !is_path_valid(path, &self.limits) {
            return Err(TreeError::Einval);
        }
        let chain = descend(&self.root, path, Mode::Read).map_err(|_| TreeError::Einval)?;
        let children = unsafe { chain.last_children() };
        Ok(make_map_contents_string(children.names()))
    }

    /// Moves the directory at `source` (with its whole subtree) to `target`.
    /// `source`'s parent and `target`'s parent must both already exist;
    /// `target` itself must not.
    pub fn move_path(&self, source: &str, target: &str) -> Result<()> {
        if !is_path_valid(source, &self.limits) || !is_path_valid(target, &self.limits) {
            return Err(TreeError::Einval);
        }
        if source == ROOT {
            return Err(TreeError::Ebusy);
        }
        if target == ROOT {
            return Err(TreeError::Eexist);
        }
        let common = find_common_path(source, target);
        let source_eq = common == source;
        let target_eq = common == target;
        if source_eq && target_eq {
            // source == target: exists, or it doesn't
            return match descend(&self.root, common, Mode::Write) {
                Ok(_locked) => Err(TreeError::Eexist),
                Err(e) => Err(e),
            };
        }
        if source_eq {
            // target nests inside source: moving a directory into its own
            // descendant can never be satisfied
            return Err(TreeError::Enoent);
        }
        if target_eq {
            // source nests inside target: target already occupies the spot
            // we'd need to create it at, or doesn't exist at all
            return match descend(&self.root, common, Mode::Write) {
                Ok(_locked) => Err(TreeError::Eexist),
                Err(e) => Err(e),
            };
        }
        let chain = descend(&self.root, common, Mode::Write)?;
        let lca = chain.last().clone();
        let relative_source = &source[common.len() - 1..];
        let relative_target = &target[common.len() - 1..];
        let (rel_source_parent, source_name) =
            make_path_to_parent(relative_source).expect("source_eq was checked above");
        let (rel_target_parent, target_name) =
            make_path_to_parent(relative_target).expect("target_eq was checked above");
        // SAFETY: `lca` is held exclusively by `chain` for the rest of this
        // function, so its whole subtree is transitively exclusive to us.
        let source_parent =
            unsafe { resolve_unlocked(&lca, rel_source_parent) }.ok_or(TreeError::Enoent)?;
        if !unsafe { source_parent.children() }.contains(source_name) {
            return Err(TreeError::Enoent);
        }
        let target_parent =
            unsafe { resolve_unlocked(&lca, rel_target_parent) }.ok_or(TreeError::Enoent)?;
        if unsafe { target_parent.children() }.contains(target_name) {
            return Err(TreeError::Eexist);
        }
        let moved = unsafe { source_parent.children_mut() }
            .remove(source_name)
            .expect("existence was just checked above");
        unsafe { target_parent.children_mut() }.insert(target_name.to_owned(), moved);
        log::debug!("moved {} to {}", source, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TreeError;
    use crate::Tree;

    /// `list`'s format is a comma-joined string in the underlying map's
    /// iteration order, which is unspecified — tests that care about more
    /// than one child compare the sorted components instead of the raw
    /// string.
    fn sorted_children(listing: &str) -> Vec<&str> {
        let mut names: Vec<&str> = if listing.is_empty() {
            Vec::new()
        } else {
            listing.split(',').collect()
        };
        names.sort_unstable();
        names
    }

    #[test]
    fn test_create_and_list() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/a/b/").unwrap();
        tree.create("/a/c/").unwrap();
        assert_eq!(sorted_children(&tree.list("/a/").unwrap()), vec!["b", "c"]);
    }

    #[test]
    fn test_create_missing_parent_is_enoent() {
        let tree = Tree::new();
        assert_eq!(tree.create("/a/b/"), Err(TreeError::Enoent));
    }

    #[test]
    fn test_create_duplicate_is_eexist() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        assert_eq!(tree.create("/a/"), Err(TreeError::Eexist));
    }

    #[test]
    fn test_create_root_is_eexist() {
        let tree = Tree::new();
        assert_eq!(tree.create("/"), Err(TreeError::Eexist));
    }

    #[test]
    fn test_create_invalid_path_is_einval() {
        let tree = Tree::new();
        assert_eq!(tree.create("a/"), Err(TreeError::Einval));
        assert_eq!(tree.create("/A/"), Err(TreeError::Einval));
    }

    #[test]
    fn test_remove_root_is_ebusy() {
        let tree = Tree::new();
        assert_eq!(tree.remove("/"), Err(TreeError::Ebusy));
    }

    #[test]
    fn test_remove_nonempty_is_enotempty() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/a/b/").unwrap();
        assert_eq!(tree.remove("/a/"), Err(TreeError::Enotempty));
    }

    #[test]
    fn test_remove_missing_is_enoent() {
        let tree = Tree::new();
        assert_eq!(tree.remove("/a/"), Err(TreeError::Enoent));
    }

    #[test]
    fn test_remove_then_recreate() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.remove("/a/").unwrap();
        assert_eq!(tree.list("/").unwrap(), "");
        tree.create("/a/").unwrap();
        assert_eq!(tree.list("/").unwrap(), "a");
    }

    #[test]
    fn test_move_basic() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/b/").unwrap();
        tree.create("/a/c/").unwrap();
        tree.move_path("/a/c/", "/b/c/").unwrap();
        assert_eq!(tree.list("/a/").unwrap(), "");
        assert_eq!(tree.list("/b/").unwrap(), "c");
    }

    #[test]
    fn test_move_preserves_subtree() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/a/b/").unwrap();
        tree.create("/a/b/c/").unwrap();
        tree.create("/a/b/d/").unwrap();
        tree.create("/x/").unwrap();
        tree.move_path("/a/b/", "/x/b/").unwrap();
        assert_eq!(sorted_children(&tree.list("/x/b/").unwrap()), vec!["c", "d"]);
    }

    #[test]
    fn test_move_source_root_is_ebusy() {
        let tree = Tree::new();
        assert_eq!(tree.move_path("/", "/a/"), Err(TreeError::Ebusy));
    }

    #[test]
    fn test_move_target_root_is_eexist() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        assert_eq!(tree.move_path("/a/", "/"), Err(TreeError::Eexist));
    }

    #[test]
    fn test_move_onto_self_existing_is_eexist() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        assert_eq!(tree.move_path("/a/", "/a/"), Err(TreeError::Eexist));
    }

    #[test]
    fn test_move_onto_self_missing_is_enoent() {
        let tree = Tree::new();
        assert_eq!(tree.move_path("/a/", "/a/"), Err(TreeError::Enoent));
    }

    #[test]
    fn test_move_into_own_descendant_is_enoent() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/a/b/").unwrap();
        assert_eq!(tree.move_path("/a/", "/a/b/"), Err(TreeError::Enoent));
    }

    #[test]
    fn test_move_from_existing_ancestor_is_eexist() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/a/b/").unwrap();
        assert_eq!(tree.move_path("/a/b/", "/a/"), Err(TreeError::Eexist));
    }

    #[test]
    fn test_move_target_exists_is_eexist() {
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/b/").unwrap();
        assert_eq!(tree.move_path("/a/", "/b/"), Err(TreeError::Eexist));
    }

    #[test]
    fn test_move_missing_source_is_enoent() {
        let tree = Tree::new();
        tree.create("/b/").unwrap();
        assert_eq!(tree.move_path("/a/", "/b/a/"), Err(TreeError::Enoent));
    }

    #[test]
    fn test_random_create_remove_round_trip_is_idempotent() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let tree = Tree::new();
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let letters = b"abcd";
        for _ in 0..100 {
            let depth = rng.gen_range(1..4);
            let mut prefix = String::from("/");
            let mut prefixes = Vec::new();
            for _ in 0..depth {
                prefix.push(letters[rng.gen_range(0..letters.len())] as char);
                prefix.push('/');
                prefixes.push(prefix.clone());
            }
            for p in &prefixes {
                tree.create(p).unwrap();
            }
            assert_eq!(tree.list(prefixes.last().unwrap()).unwrap(), "");
            for p in prefixes.iter().rev() {
                tree.remove(p).unwrap();
            }
        }
        assert_eq!(tree.list("/").unwrap(), "");
    }

    #[test]
    fn test_list_missing_path_is_einval() {
        let tree = Tree::new();
        assert_eq!(tree.list("/a/"), Err(TreeError::Einval));
    }

    #[test]
    fn test_scenario_reference_example() {
        // grounded on the reference implementation's example_move_test
        let tree = Tree::new();
        tree.create("/a/").unwrap();
        tree.create("/b/").unwrap();
        tree.create("/a/b/").unwrap();
        tree.create("/a/b/c/").unwrap();
        tree.create("/a/b/d/").unwrap();
        tree.create("/b/a/").unwrap();
        tree.create("/b/a/d/").unwrap();
        tree.move_path("/a/b/", "/b/x/").unwrap();
        assert_eq!(tree.list("/a/").unwrap(), "");
        assert_eq!(sorted_children(&tree.list("/b/").unwrap()), vec!["a", "x"]);
        assert_eq!(sorted_children(&tree.list("/b/x/").unwrap()), vec!["c", "d"]);
    }
}

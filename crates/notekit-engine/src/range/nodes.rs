//! Lazy traversal of the nodes a range touches.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::{Range, before, compare};
use crate::dom::{NodeId, Tree};

/// Filters applied by [`Range::nodes`].
///
/// When several are set, `fully_contains` wins over `partial_contains`,
/// which wins over `include_ancestor`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodesOptions {
    /// Climb from each visited node to its nearest ancestor matching the
    /// predicate.
    pub include_ancestor: bool,
    /// Only nodes lying entirely inside the range.
    pub fully_contains: bool,
    /// Only nodes that intersect the range without lying entirely inside it.
    pub partial_contains: bool,
}

impl NodesOptions {
    pub fn include_ancestor() -> Self {
        Self {
            include_ancestor: true,
            ..Self::default()
        }
    }

    pub fn fully_contains() -> Self {
        Self {
            fully_contains: true,
            ..Self::default()
        }
    }
}

/// Iterator returned by [`Range::nodes`].
///
/// Visits the start container, every node that begins before the end point
/// in document order, then the end container. Each matching node is yielded
/// once and the editable root never is.
pub struct RangeNodes<'t, P> {
    tree: &'t Tree,
    range: Range,
    pred: P,
    opts: NodesOptions,
    pending_start: Option<NodeId>,
    cursor: Option<NodeId>,
    pending_end: Option<NodeId>,
    seen: HashSet<NodeId>,
}

impl<'t, P> RangeNodes<'t, P>
where
    P: Fn(&Tree, NodeId) -> bool,
{
    pub(super) fn new(tree: &'t Tree, range: Range, pred: P, opts: NodesOptions) -> Self {
        let start = range.start;
        let cursor = match tree.children(start.node).get(start.offset) {
            Some(&child) if !tree.is_text(start.node) => Some(child),
            _ => next_after_subtree(tree, start.node),
        };
        Self {
            tree,
            range,
            pred,
            opts,
            pending_start: Some(start.node),
            cursor,
            pending_end: Some(range.end.node),
            seen: HashSet::new(),
        }
    }

    fn next_candidate(&mut self) -> Option<NodeId> {
        if let Some(node) = self.pending_start.take() {
            return Some(node);
        }
        if let Some(node) = self.cursor {
            if compare(self.tree, before(self.tree, node), self.range.end) == Ordering::Less {
                self.cursor = next_in_preorder(self.tree, node);
                return Some(node);
            }
            self.cursor = None;
        }
        self.pending_end.take()
    }

    fn accept(&self, candidate: NodeId) -> Option<NodeId> {
        let tree = self.tree;
        let node = if self.opts.include_ancestor {
            tree.ancestor(candidate, &self.pred)?
        } else if (self.pred)(tree, candidate) {
            candidate
        } else {
            return None;
        };

        if tree.is_editable(node) {
            return None;
        }
        if self.opts.fully_contains {
            return self.range.fully_contains(tree, node).then_some(node);
        }
        if self.opts.partial_contains {
            return (!self.range.fully_contains(tree, node)).then_some(node);
        }
        Some(node)
    }
}

impl<P> Iterator for RangeNodes<'_, P>
where
    P: Fn(&Tree, NodeId) -> bool,
{
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(candidate) = self.next_candidate() {
            if let Some(node) = self.accept(candidate)
                && self.seen.insert(node)
            {
                return Some(node);
            }
        }
        None
    }
}

fn next_in_preorder(tree: &Tree, node: NodeId) -> Option<NodeId> {
    match tree.children(node).first() {
        Some(&child) => Some(child),
        None => next_after_subtree(tree, node),
    }
}

fn next_after_subtree(tree: &Tree, node: NodeId) -> Option<NodeId> {
    tree.ancestors(node)
        .take_while(|&n| n != tree.root())
        .find_map(|n| tree.next_sibling(n))
}

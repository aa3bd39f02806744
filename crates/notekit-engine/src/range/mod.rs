//! # Range & Position Model
//!
//! A [`Range`] is an ordered pair of [`Position`]s inside one [`Tree`]. It is
//! a plain `Copy` value: operations that restructure the tree take the tree
//! explicitly and hand back a new range describing the same content
//! afterwards.
//!
//! ## Document order
//!
//! Positions are ordered by their root-to-node child index path with the
//! offset appended, compared lexicographically. A prefix sorts first, so a
//! boundary on an element sorts before any position inside the child at that
//! index:
//!
//! ```text
//! <p>ab</p>      (p,0) → [0,0]   (text,1) → [0,0,1]   (p,1) → [0,1]
//! ```

mod bookmark;
mod nodes;

use std::cmp::Ordering;

use crate::dom::{NodeId, Position, Tag, Tree};

pub use bookmark::{Bookmark, BookmarkPoint};
pub use nodes::{NodesOptions, RangeNodes};

/// Sort key of a position: index path from the top of its tree plus offset.
fn position_key(tree: &Tree, pos: Position) -> Vec<usize> {
    let mut key: Vec<usize> = tree
        .ancestors(pos.node)
        .filter(|&n| tree.parent(n).is_some())
        .map(|n| tree.index_of(n))
        .collect();
    key.reverse();
    key.push(pos.offset);
    key
}

/// Document order of two positions in the same tree.
pub fn compare(tree: &Tree, a: Position, b: Position) -> Ordering {
    position_key(tree, a).cmp(&position_key(tree, b))
}

/// Boundary right before `node` in its parent.
pub fn before(tree: &Tree, node: NodeId) -> Position {
    match tree.parent(node) {
        Some(parent) => Position::new(parent, tree.index_of(node)),
        None => Position::new(node, 0),
    }
}

/// Boundary right after `node` in its parent.
pub fn after(tree: &Tree, node: NodeId) -> Position {
    match tree.parent(node) {
        Some(parent) => Position::new(parent, tree.index_of(node) + 1),
        None => Position::new(node, tree.node_length(node)),
    }
}

fn first_leaf(tree: &Tree, mut node: NodeId) -> NodeId {
    while let Some(&child) = tree.children(node).first() {
        node = child;
    }
    node
}

fn last_leaf(tree: &Tree, mut node: NodeId) -> NodeId {
    while let Some(&child) = tree.children(node).last() {
        node = child;
    }
    node
}

/// A position that survives wrapping and unwrapping of its neighbours.
#[derive(Debug, Clone, Copy)]
enum Anchor {
    At(Position),
    Before(NodeId),
    After(NodeId),
}

impl Anchor {
    fn of(tree: &Tree, pos: Position) -> Self {
        if tree.is_text(pos.node) {
            return Anchor::At(pos);
        }
        let children = tree.children(pos.node);
        if let Some(&child) = children.get(pos.offset) {
            Anchor::Before(child)
        } else if let Some(&child) = pos.offset.checked_sub(1).and_then(|i| children.get(i)) {
            Anchor::After(child)
        } else {
            Anchor::At(pos)
        }
    }

    fn resolve(self, tree: &Tree) -> Position {
        match self {
            Anchor::At(pos) => pos,
            Anchor::Before(node) => before(tree, node),
            Anchor::After(node) => after(tree, node),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Callers keep `start <= end` in document order.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn collapsed(pos: Position) -> Self {
        Self::new(pos, pos)
    }

    /// Range covering `node`. Void elements are selected from their parent.
    pub fn from_node(tree: &Tree, node: NodeId) -> Self {
        if tree.is_void(node) {
            return Self::new(before(tree, node), after(tree, node));
        }
        Self::new(
            Position::new(node, 0),
            Position::new(node, tree.node_length(node)),
        )
    }

    pub fn from_node_before(tree: &Tree, node: NodeId) -> Self {
        Self::from_node(tree, node).collapse(true)
    }

    pub fn from_node_after(tree: &Tree, node: NodeId) -> Self {
        Self::from_node(tree, node).collapse(false)
    }

    /// Collapsed range at the end of the editable root.
    pub fn from_body_element(tree: &Tree) -> Self {
        let root = tree.root();
        Self::collapsed(Position::new(root, tree.node_length(root)))
    }

    /// Range over the whole editable content.
    pub fn select_all(tree: &Tree) -> Self {
        Self::from_node(tree, tree.root())
    }

    pub fn collapse(self, to_start: bool) -> Self {
        if to_start {
            Self::collapsed(self.start)
        } else {
            Self::collapsed(self.end)
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn common_ancestor(&self, tree: &Tree) -> NodeId {
        let start_chain: Vec<NodeId> = tree.ancestors(self.start.node).collect();
        tree.ancestors(self.end.node)
            .find(|n| start_chain.contains(n))
            .unwrap_or(tree.root())
    }

    /// Whether all of `node`, from its first leaf to its last, lies inside
    /// the range.
    pub fn fully_contains(&self, tree: &Tree, node: NodeId) -> bool {
        let first = first_leaf(tree, node);
        let last = last_leaf(tree, node);
        compare(tree, self.start, Position::new(first, 0)) != Ordering::Greater
            && compare(tree, Position::new(last, tree.node_length(last)), self.end)
                != Ordering::Greater
    }

    /// Lazily walk the nodes the range touches that satisfy `pred`.
    pub fn nodes<'t, P>(&self, tree: &'t Tree, pred: P, opts: NodesOptions) -> RangeNodes<'t, P>
    where
        P: Fn(&Tree, NodeId) -> bool,
    {
        RangeNodes::new(tree, *self, pred, opts)
    }

    /// Concatenated text between the endpoints.
    pub fn text(&self, tree: &Tree) -> String {
        let mut out = String::new();
        for node in self.nodes(tree, Tree::is_text, NodesOptions::default()) {
            let content = tree.text(node).unwrap_or_default();
            let len = tree.node_length(node);
            let from = if node == self.start.node { self.start.offset } else { 0 };
            let to = if node == self.end.node { self.end.offset } else { len };
            if from < to {
                out.extend(content.chars().skip(from).take(to - from));
            }
        }
        out
    }

    /// Move endpoints sitting on element boundaries into neighbouring text.
    pub fn normalize(&self, tree: &Tree) -> Self {
        let start = visible_point(tree, self.start, true);
        if self.is_collapsed() {
            return Self::collapsed(start);
        }
        let end = visible_point(tree, self.end, false);
        if compare(tree, start, end) == Ordering::Greater {
            return Self::collapsed(start);
        }
        Self::new(start, end)
    }

    /// Split text nodes at the endpoints so every node inside the range is
    /// covered whole.
    pub fn split_text(&self, tree: &mut Tree) -> Self {
        let is_same_container = self.start.node == self.end.node;
        let mut range = *self;

        if tree.is_text(self.end.node) && !is_edge(tree, self.end) {
            tree.split_text(self.end.node, self.end.offset);
        }
        if tree.is_text(self.start.node) && !is_edge(tree, self.start) {
            let right = tree.split_text(self.start.node, self.start.offset);
            range.start = Position::new(right, 0);
            if is_same_container {
                range.end = Position::new(right, self.end.offset - self.start.offset);
            }
        }
        range
    }

    /// Wrap inline content sitting directly in a body container into a
    /// paragraph, so structural commands always find a paragraph to act on.
    ///
    /// An empty body container gets a fresh empty paragraph holding the
    /// cursor.
    pub fn wrap_body_inline_with_para(&self, tree: &mut Tree) -> Self {
        if tree.is_body_container(self.start.node) && tree.is_empty(self.start.node) {
            let container = self.start.node;
            for child in tree.children(container).to_vec() {
                tree.detach(child);
            }
            let para = tree.create_element(Tag::P);
            let br = tree.create_element(Tag::Br);
            tree.append_child(para, br);
            tree.append_child(container, para);
            return Self::collapsed(Position::new(para, 0));
        }

        let range = self.normalize(tree);
        let start = Anchor::of(tree, range.start);
        let end = Anchor::of(tree, range.end);

        wrap_inline_run(tree, range.start);
        wrap_inline_run(tree, end.resolve(tree));

        Self::new(start.resolve(tree), end.resolve(tree)).normalize(tree)
    }

    /// Insert `node` at the start point and return it.
    ///
    /// Inline nodes split the tree up to the enclosing paragraph (after
    /// deleting any selected content); block nodes split up to the body
    /// container. Empty paragraph halves left around a block are removed.
    pub fn insert_node(&self, tree: &mut Tree, node: NodeId) -> NodeId {
        let inline = tree.is_inline(node);
        let range = if inline {
            self.wrap_body_inline_with_para(tree).delete_contents(tree)
        } else {
            *self
        };
        let point = range.start;

        let chain: Vec<NodeId> = tree.ancestors(point.node).collect();
        let container_index = chain
            .iter()
            .position(|&n| {
                n == tree.root()
                    || if inline {
                        tree.is_para(n)
                    } else {
                        tree.is_body_container(n)
                    }
            })
            .unwrap_or(chain.len() - 1);
        let container = chain[container_index];
        let split_root = container_index.checked_sub(1).map(|i| chain[i]);

        let pivot = match split_root {
            Some(split_root) => tree.split_tree(split_root, point, inline),
            None => tree.children(container).get(point.offset).copied(),
        };

        match pivot.filter(|&p| tree.parent(p) == Some(container)) {
            Some(right) => {
                tree.insert_before(node, right);
                if !inline && tree.is_para(right) && tree.is_empty(right) {
                    tree.remove(right);
                }
            }
            None => tree.append_child(container, node),
        }

        if !inline
            && let Some(left) = split_root
            && left != node
            && tree.is_para(left)
            && tree.is_empty(left)
        {
            tree.remove(left);
        }

        node
    }

    /// Remove the selected content and return a collapsed range at the
    /// deletion point.
    pub fn delete_contents(&self, tree: &mut Tree) -> Self {
        if self.is_collapsed() {
            return *self;
        }
        let range = self.split_text(tree);
        let contained: Vec<NodeId> = range
            .nodes(tree, |_, _| true, NodesOptions::fully_contains())
            .collect();
        let outermost: Vec<NodeId> = contained
            .iter()
            .copied()
            .filter(|&n| tree.parent(n).is_none_or(|p| !contained.contains(&p)))
            .collect();

        let Some(&first) = outermost.first() else {
            return range.collapse(true);
        };
        let point = before(tree, first);

        for &node in &outermost {
            let parent = tree.parent(node);
            tree.remove(node);
            if let Some(parent) = parent
                && parent != point.node
                && parent != tree.root()
                && tree.node_length(parent) == 0
            {
                tree.remove(parent);
            }
        }

        Self::collapsed(point).normalize(tree)
    }

    /// Grow each endpoint to cover its nearest ancestor satisfying `pred`.
    pub fn expand(&self, tree: &Tree, pred: impl Fn(&Tree, NodeId) -> bool) -> Self {
        let start_ancestor = tree.ancestor(self.start.node, &pred);
        let end_ancestor = tree.ancestor(self.end.node, &pred);
        let mut range = *self;
        if let Some(node) = start_ancestor {
            range.start = Position::new(node, 0);
        }
        if let Some(node) = end_ancestor {
            range.end = Position::new(node, tree.node_length(node));
        }
        range
    }

    pub fn is_on(&self, tree: &Tree, pred: impl Fn(&Tree, NodeId) -> bool) -> bool {
        tree.ancestor(self.start.node, pred).is_some()
    }

    pub fn is_on_list(&self, tree: &Tree) -> bool {
        self.is_on(tree, Tree::is_li)
    }

    pub fn is_on_anchor(&self, tree: &Tree) -> bool {
        self.is_on(tree, Tree::is_anchor)
    }

    pub fn is_on_cell(&self, tree: &Tree) -> bool {
        self.is_on(tree, Tree::is_cell)
    }

    pub fn is_on_editable(&self, tree: &Tree) -> bool {
        tree.is_attached(self.start.node)
    }
}

fn is_edge(tree: &Tree, pos: Position) -> bool {
    pos.offset == 0 || pos.offset == tree.node_length(pos.node)
}

fn visible_point(tree: &Tree, pos: Position, prefer_next: bool) -> Position {
    if tree.is_text(pos.node) {
        return pos;
    }
    let children = tree.children(pos.node);
    let next = children.get(pos.offset).copied().filter(|&c| tree.is_text(c));
    let prev = pos
        .offset
        .checked_sub(1)
        .and_then(|i| children.get(i).copied())
        .filter(|&c| tree.is_text(c));

    let into_next = next.map(|c| Position::new(c, 0));
    let into_prev = prev.map(|c| Position::new(c, tree.node_length(c)));
    let chosen = if prefer_next {
        into_next.or(into_prev)
    } else {
        into_prev.or(into_next)
    };
    chosen.unwrap_or(pos)
}

/// Wrap the run of inline siblings around `pos` into a new paragraph when
/// they sit directly in a body container.
fn wrap_inline_run(tree: &mut Tree, pos: Position) {
    if tree.ancestor(pos.node, Tree::is_para).is_some() {
        return;
    }
    let Some(container) = tree.ancestors(pos.node).find(|&n| tree.is_body_container(n)) else {
        return;
    };

    let top = if pos.node == container {
        let children = tree.children(container);
        [Some(pos.offset), pos.offset.checked_sub(1)]
            .into_iter()
            .flatten()
            .filter_map(|i| children.get(i).copied())
            .find(|&c| tree.is_inline(c))
    } else {
        tree.ancestors(pos.node)
            .find(|&n| tree.parent(n) == Some(container))
    };
    let Some(top) = top.filter(|&t| tree.is_inline(t)) else {
        return;
    };

    let siblings = tree.children(container).to_vec();
    let index = tree.index_of(top);
    let first = (0..index)
        .rev()
        .take_while(|&i| tree.is_inline(siblings[i]))
        .last()
        .unwrap_or(index);
    let last = (index + 1..siblings.len())
        .take_while(|&i| tree.is_inline(siblings[i]))
        .last()
        .unwrap_or(index);

    let para = tree.wrap(siblings[first], Tag::P);
    tree.append_children(para, &siblings[first + 1..=last]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::find_text;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    // ============ Ordering ============

    #[test]
    fn test_compare_follows_document_order() {
        let tree = Tree::from_markup("<p>ab</p><p>cd</p>");
        let ab = find_text(&tree, "ab");
        let cd = find_text(&tree, "cd");
        let p1 = tree.children(tree.root())[0];

        assert_eq!(compare(&tree, Position::new(ab, 1), Position::new(cd, 0)), Ordering::Less);
        assert_eq!(compare(&tree, Position::new(p1, 0), Position::new(ab, 0)), Ordering::Less);
        assert_eq!(compare(&tree, Position::new(p1, 1), Position::new(ab, 2)), Ordering::Greater);
        assert_eq!(compare(&tree, Position::new(ab, 1), Position::new(ab, 1)), Ordering::Equal);
    }

    // ============ Text and containment ============

    #[test]
    fn test_text_spans_nodes() {
        let tree = Tree::from_markup("<p>hello <b>bold</b></p><p>world</p>");
        let hello = find_text(&tree, "hello ");
        let world = find_text(&tree, "world");

        let range = Range::new(Position::new(hello, 2), Position::new(world, 3));

        assert_eq!(range.text(&tree), "llo boldwor");
    }

    #[test]
    fn test_fully_contains_uses_leaf_edges() {
        let tree = Tree::from_markup("<p>ab</p><p>cd</p>");
        let ab = find_text(&tree, "ab");
        let cd = find_text(&tree, "cd");
        let p1 = tree.children(tree.root())[0];
        let p2 = tree.children(tree.root())[1];

        let range = Range::new(Position::new(ab, 0), Position::new(cd, 1));

        assert!(range.fully_contains(&tree, p1));
        assert!(range.fully_contains(&tree, ab));
        assert!(!range.fully_contains(&tree, p2));
    }

    #[test]
    fn test_normalize_moves_into_text() {
        let tree = Tree::from_markup("<p>ab<b>c</b></p>");
        let p = tree.children(tree.root())[0];
        let ab = find_text(&tree, "ab");

        let range = Range::new(Position::new(p, 0), Position::new(p, 1)).normalize(&tree);

        assert_eq!(range, Range::new(Position::new(ab, 0), Position::new(ab, 2)));
    }

    // ============ Mutation ============

    #[test]
    fn test_split_text_same_container() {
        let mut tree = Tree::from_markup("<p>abcdef</p>");
        let text = find_text(&tree, "abcdef");

        let range = Range::new(Position::new(text, 2), Position::new(text, 4)).split_text(&mut tree);

        assert_eq!(tree.text(range.start.node), Some("cd"));
        assert_eq!(range.start.offset, 0);
        assert_eq!(range.end, Position::new(range.start.node, 2));
        assert_eq!(range.text(&tree), "cd");
    }

    #[test]
    fn test_wrap_body_inline_with_para_wraps_inline_run() {
        let mut tree = Tree::from_markup("a<b>b</b><p>c</p>d");
        let a = find_text(&tree, "a");

        let range = Range::collapsed(Position::new(a, 1)).wrap_body_inline_with_para(&mut tree);

        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>a<b>b</b></p><p>c</p>d");
        assert_eq!(range.start, Position::new(a, 1));
    }

    #[test]
    fn test_wrap_body_inline_with_para_on_empty_root() {
        let mut tree = Tree::new();

        let range = Range::collapsed(Position::new(tree.root(), 0)).wrap_body_inline_with_para(&mut tree);

        assert_snapshot!(tree.inner_markup(tree.root()), @"<p><br></p>");
        assert!(tree.is_para(range.start.node));
    }

    #[test]
    fn test_insert_inline_node_splits_text() {
        let mut tree = Tree::from_markup("<p>abcd</p>");
        let text = find_text(&tree, "abcd");
        let img = tree.create_element(Tag::Img);

        Range::collapsed(Position::new(text, 2)).insert_node(&mut tree, img);

        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>ab<img>cd</p>");
    }

    #[test]
    fn test_insert_block_node_splits_paragraph() {
        let mut tree = Tree::from_markup("<p>abcd</p>");
        let text = find_text(&tree, "abcd");
        let hr = tree.create_element(Tag::Hr);

        Range::collapsed(Position::new(text, 2)).insert_node(&mut tree, hr);

        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>ab</p><hr><p>cd</p>");
    }

    #[test]
    fn test_insert_block_node_at_paragraph_end_drops_empty_half() {
        let mut tree = Tree::from_markup("<p>abcd</p>");
        let text = find_text(&tree, "abcd");
        let hr = tree.create_element(Tag::Hr);

        Range::collapsed(Position::new(text, 4)).insert_node(&mut tree, hr);

        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>abcd</p><hr>");
    }

    #[test]
    fn test_delete_contents_across_paragraphs() {
        let mut tree = Tree::from_markup("<p>abc</p><p>def</p><p>ghi</p>");
        let abc = find_text(&tree, "abc");
        let ghi = find_text(&tree, "ghi");

        let range = Range::new(Position::new(abc, 1), Position::new(ghi, 2)).delete_contents(&mut tree);

        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>a</p><p>i</p>");
        assert_eq!(range, Range::collapsed(Position::new(abc, 1)));
    }

    #[test]
    fn test_expand_to_anchor() {
        let tree = Tree::from_markup(r#"<p>x<a href="u">link</a></p>"#);
        let link = find_text(&tree, "link");
        let anchor = tree.parent(link).unwrap();

        let range = Range::collapsed(Position::new(link, 2)).expand(&tree, Tree::is_anchor);

        assert_eq!(range, Range::new(Position::new(anchor, 0), Position::new(anchor, 1)));
        assert!(range.is_on_anchor(&tree));
        assert!(!range.is_on_list(&tree));
    }
}

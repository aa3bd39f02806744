//! # Document Tree
//!
//! The mutable model of formatted content, stored as an arena of [`Node`]s
//! addressed by [`NodeId`]. Each node records its parent index and an ordered
//! child list; the parent index is the only ownership edge, so every
//! structural primitive here is an index operation:
//!
//! - moving a node always detaches it from its old parent first, which keeps
//!   the "exactly one parent, no cycles" invariant without reference rewiring
//! - removed nodes stay in the arena but are unreachable from the root; they
//!   are dropped the next time the tree is rebuilt from markup
//!
//! The root node is the editable container. Node predicates (`is_para`,
//! `is_list`, ...) never match it.

pub mod css;
mod markup;

use std::fmt;

/// Stable index of a node in a [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A point in the tree: a child index for elements, a character offset for
/// text nodes. `0 <= offset <= node_length(node)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Element kinds the engine gives meaning to. Anything else is kept by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    H(u8),
    Pre,
    Blockquote,
    Ul,
    Ol,
    Li,
    Span,
    A,
    B,
    Strong,
    I,
    Em,
    U,
    S,
    Strike,
    Sub,
    Sup,
    Font,
    Br,
    Hr,
    Img,
    Figure,
    Table,
    Tbody,
    Tr,
    Td,
    Th,
    Other(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Tag {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H(1),
            "h2" => Tag::H(2),
            "h3" => Tag::H(3),
            "h4" => Tag::H(4),
            "h5" => Tag::H(5),
            "h6" => Tag::H(6),
            "pre" => Tag::Pre,
            "blockquote" => Tag::Blockquote,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "span" => Tag::Span,
            "a" => Tag::A,
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "i" => Tag::I,
            "em" => Tag::Em,
            "u" => Tag::U,
            "s" => Tag::S,
            "strike" => Tag::Strike,
            "sub" => Tag::Sub,
            "sup" => Tag::Sup,
            "font" => Tag::Font,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "img" => Tag::Img,
            "figure" => Tag::Figure,
            "table" => Tag::Table,
            "tbody" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            _ => Tag::Other(lower),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H(1) => "h1",
            Tag::H(2) => "h2",
            Tag::H(3) => "h3",
            Tag::H(4) => "h4",
            Tag::H(5) => "h5",
            Tag::H(_) => "h6",
            Tag::Pre => "pre",
            Tag::Blockquote => "blockquote",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Span => "span",
            Tag::A => "a",
            Tag::B => "b",
            Tag::Strong => "strong",
            Tag::I => "i",
            Tag::Em => "em",
            Tag::U => "u",
            Tag::S => "s",
            Tag::Strike => "strike",
            Tag::Sub => "sub",
            Tag::Sup => "sup",
            Tag::Font => "font",
            Tag::Br => "br",
            Tag::Hr => "hr",
            Tag::Img => "img",
            Tag::Figure => "figure",
            Tag::Table => "table",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Other(name) => name,
        }
    }

    pub fn is_void(&self) -> bool {
        notekit_markup::is_void_element(self.name())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Tag::Ul | Tag::Ol)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element {
        tag: Tag,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Node arena rooted at the editable container.
///
/// The arena only grows: removed and detached nodes keep their slot so that
/// any `NodeId` handed out stays valid to read. Memory is reclaimed when the
/// tree is rebuilt from markup, which happens on `Document::set_markup` and
/// therefore on every undo, redo and content replacement.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty tree holding only the editable root.
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.create_element(Tag::Div);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // ============ Node creation and access ============

    pub fn create_element(&mut self, tag: Tag) -> NodeId {
        self.push(NodeData::Element {
            tag,
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Element children only, skipping text nodes.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| !self.is_text(c))
            .collect()
    }

    pub fn tag(&self, id: NodeId) -> Option<&Tag> {
        match &self.nodes[id.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn has_tag(&self, id: NodeId, tag: &Tag) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeData::Text(text) = &mut self.nodes[id.0].data {
            *text = value.into();
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => attrs,
            NodeData::Text(_) => &[],
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            let value = value.into();
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value,
                None => attrs.push((name.to_string(), value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            attrs.retain(|(n, _)| n != name);
        }
    }

    /// Character count for text nodes, child count for elements.
    pub fn node_length(&self, id: NodeId) -> usize {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => text.chars().count(),
            NodeData::Element { .. } => self.nodes[id.0].children.len(),
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { .. } => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    pub fn index_of(&self, id: NodeId) -> usize {
        self.parent(id)
            .and_then(|p| self.children(p).iter().position(|&c| c == id))
            .unwrap_or(0)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_of(id);
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.children(parent).get(self.index_of(id) + 1).copied()
    }

    /// Following siblings in order.
    pub fn next_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => self.children(parent)[self.index_of(id) + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// `id` and its ancestors up to and including the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |&n| self.parent(n))
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.ancestors(id).any(|n| n == self.root)
    }

    /// Inclusive descendant check.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|n| n == ancestor)
    }

    // ============ Tree queries ============

    /// Nearest node matching `pred`, starting at `id` itself, never the root.
    pub fn ancestor(&self, id: NodeId, pred: impl Fn(&Tree, NodeId) -> bool) -> Option<NodeId> {
        self.ancestors(id)
            .take_while(|&n| n != self.root)
            .find(|&n| pred(self, n))
    }

    /// Outermost node matching `pred` between `id` and the root.
    pub fn last_ancestor(
        &self,
        id: NodeId,
        pred: impl Fn(&Tree, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.ancestors(id)
            .take_while(|&n| n != self.root)
            .filter(|&n| pred(self, n))
            .last()
    }

    /// `id` and its ancestors, excluding the root.
    pub fn list_ancestor(&self, id: NodeId) -> Vec<NodeId> {
        self.ancestors(id)
            .take_while(|&n| n != self.root)
            .collect()
    }

    /// Climbs through ancestors that have exactly one child, returning the
    /// first one matching `pred`.
    pub fn single_child_ancestor(
        &self,
        id: NodeId,
        pred: impl Fn(&Tree, NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut node = self.parent(id);
        while let Some(n) = node {
            if self.node_length(n) != 1 || n == self.root {
                break;
            }
            if pred(self, n) {
                return Some(n);
            }
            node = self.parent(n);
        }
        None
    }

    /// Descendants of `id` in document order (excluding `id`) matching `pred`.
    pub fn list_descendant(
        &self,
        id: NodeId,
        pred: impl Fn(&Tree, NodeId) -> bool,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if pred(self, n) {
                out.push(n);
            }
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// The node with its immediate siblings that satisfy `pred`, in order.
    pub fn with_closest_siblings(
        &self,
        id: NodeId,
        pred: impl Fn(&Tree, NodeId) -> bool,
    ) -> Vec<NodeId> {
        let mut siblings = Vec::with_capacity(3);
        if let Some(prev) = self.prev_sibling(id).filter(|&p| pred(self, p)) {
            siblings.push(prev);
        }
        siblings.push(id);
        if let Some(next) = self.next_sibling(id).filter(|&n| pred(self, n)) {
            siblings.push(next);
        }
        siblings
    }

    /// Child indices leading from `ancestor` down to `id`.
    ///
    /// If `ancestor` does not contain `id`, the path is taken from the top of
    /// `id`'s tree instead.
    pub fn offset_path(&self, ancestor: NodeId, id: NodeId) -> Vec<usize> {
        let mut path: Vec<usize> = self
            .ancestors(id)
            .take_while(|&n| n != ancestor && self.parent(n).is_some())
            .map(|n| self.index_of(n))
            .collect();
        path.reverse();
        path
    }

    /// Inverse of [`Tree::offset_path`]. Out-of-range indices clamp to the
    /// last child; descent stops at a node without children.
    pub fn from_offset_path(&self, ancestor: NodeId, path: &[usize]) -> NodeId {
        let mut current = ancestor;
        for &index in path {
            let children = self.children(current);
            match children.get(index).or_else(|| children.last()) {
                Some(&child) => current = child,
                None => break,
            }
        }
        current
    }

    // ============ Node predicates ============

    pub fn is_editable(&self, id: NodeId) -> bool {
        id == self.root
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        !self.is_text(id)
    }

    pub fn is_para(&self, id: NodeId) -> bool {
        !self.is_editable(id)
            && matches!(
                self.tag(id),
                Some(Tag::P | Tag::Div | Tag::Li | Tag::H(_) | Tag::Pre)
            )
    }

    pub fn is_pure_para(&self, id: NodeId) -> bool {
        self.is_para(id) && !self.is_li(id)
    }

    pub fn is_li(&self, id: NodeId) -> bool {
        self.has_tag(id, &Tag::Li)
    }

    pub fn is_list(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(Tag::is_list)
    }

    pub fn is_anchor(&self, id: NodeId) -> bool {
        self.has_tag(id, &Tag::A)
    }

    pub fn is_cell(&self, id: NodeId) -> bool {
        matches!(self.tag(id), Some(Tag::Td | Tag::Th))
    }

    pub fn is_void(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(Tag::is_void)
    }

    pub fn is_body_container(&self, id: NodeId) -> bool {
        self.is_editable(id) || self.is_cell(id) || self.has_tag(id, &Tag::Blockquote)
    }

    pub fn is_inline(&self, id: NodeId) -> bool {
        if self.is_text(id) {
            return true;
        }
        !self.is_body_container(id)
            && !self.is_list(id)
            && !self.is_para(id)
            && !matches!(
                self.tag(id),
                Some(
                    Tag::Hr
                        | Tag::Table
                        | Tag::Tbody
                        | Tag::Tr
                        | Tag::Figure
                        | Tag::Blockquote
                )
            )
    }

    /// No visible content: no text and no void elements (other than `br`).
    pub fn is_empty(&self, id: NodeId) -> bool {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => text.is_empty(),
            NodeData::Element { tag, .. } if tag.is_void() => false,
            NodeData::Element { .. } => self.children(id).iter().all(|&c| {
                self.has_tag(c, &Tag::Br) || self.is_empty(c)
            }),
        }
    }

    // ============ Structural mutation ============

    /// Remove `id` from its parent, leaving it (and its subtree) unattached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn append_children(&mut self, parent: NodeId, children: &[NodeId]) {
        for &child in children {
            self.append_child(parent, child);
        }
    }

    /// Insert `node` right before `reference` under the same parent.
    pub fn insert_before(&mut self, node: NodeId, reference: NodeId) {
        if node == reference {
            return;
        }
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(node);
        let index = self.index_of(reference);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, node);
    }

    /// Insert `node` right after `reference` under the same parent.
    pub fn insert_after(&mut self, node: NodeId, reference: NodeId) {
        if node == reference {
            return;
        }
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(node);
        let index = self.index_of(reference) + 1;
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, node);
    }

    /// Insert `node` as the child at `index` of `parent` (appends past the end).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, node: NodeId) {
        match self.children(parent).get(index).copied() {
            Some(reference) => self.insert_before(node, reference),
            None => self.append_child(parent, node),
        }
    }

    /// Remove `id` together with its subtree.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Remove `id`, moving its children into its place.
    pub fn unwrap(&mut self, id: NodeId) {
        if self.parent(id).is_none() {
            return;
        }
        for child in self.children(id).to_vec() {
            self.insert_before(child, id);
        }
        self.detach(id);
    }

    /// Change an element's tag in place. Only the `style` attribute survives.
    pub fn retag(&mut self, id: NodeId, new_tag: Tag) {
        if let NodeData::Element { tag, attrs } = &mut self.nodes[id.0].data
            && *tag != new_tag
        {
            *tag = new_tag;
            attrs.retain(|(n, _)| n == "style");
        }
    }

    /// Wrap `id` in a new element of `tag`, returning the wrapper.
    pub fn wrap(&mut self, id: NodeId, tag: Tag) -> NodeId {
        let wrapper = self.create_element(tag);
        self.insert_before(wrapper, id);
        self.append_child(wrapper, id);
        wrapper
    }

    /// Split a text node at a character offset. The right half becomes a new
    /// text node inserted after `id` and is returned.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> NodeId {
        let text = self.text(id).unwrap_or_default();
        let byte = char_to_byte(text, offset);
        let right = text[byte..].to_string();
        let left = text[..byte].to_string();
        self.set_text(id, left);
        let node = self.create_text(right);
        self.insert_after(node, id);
        node
    }

    /// Split `point.node` at `point.offset`, returning the node that starts
    /// the right-hand side (if any).
    ///
    /// Text at an edge is not split: the left edge yields the text itself,
    /// the right edge its next sibling. With `keep_edges`, elements behave
    /// the same way instead of producing an empty clone.
    pub fn split_node(&mut self, point: Position, keep_edges: bool) -> Option<NodeId> {
        let len = self.node_length(point.node);
        let at_edge = point.offset == 0 || point.offset >= len;
        if at_edge && (self.is_text(point.node) || keep_edges) {
            return if point.offset == 0 {
                Some(point.node)
            } else {
                self.next_sibling(point.node)
            };
        }

        if self.is_text(point.node) {
            return Some(self.split_text(point.node, point.offset));
        }

        let (tag, attrs) = match self.data(point.node) {
            NodeData::Element { tag, attrs } => (tag.clone(), attrs.clone()),
            NodeData::Text(_) => return None,
        };
        let clone = self.push(NodeData::Element { tag, attrs });
        self.insert_after(clone, point.node);
        let moved = self.children(point.node)[point.offset.min(len)..].to_vec();
        self.append_children(clone, &moved);
        Some(clone)
    }

    /// Split every node from `point.node` up to and including `root`,
    /// returning the right-hand copy of `root`.
    ///
    /// Returns `None` when `root` does not contain the point.
    pub fn split_tree(&mut self, root: NodeId, point: Position, keep_edges: bool) -> Option<NodeId> {
        if !self.contains(root, point.node) {
            return None;
        }
        let chain: Vec<NodeId> = {
            let mut chain: Vec<NodeId> = self
                .ancestors(point.node)
                .take_while(|&n| n != root)
                .collect();
            chain.push(root);
            chain
        };

        let mut right = self.split_node(point, keep_edges);
        for &parent in &chain[1..] {
            let offset = match right {
                Some(node) if self.parent(node) == Some(parent) => self.index_of(node),
                _ => self.node_length(parent),
            };
            right = self.split_node(Position::new(parent, offset), keep_edges);
        }
        right
    }

    /// Merge adjacent text nodes and drop empty ones throughout the tree,
    /// remapping `points` so they keep addressing the same content.
    pub fn normalize(&mut self, points: &mut [&mut Position]) {
        self.normalize_node(self.root, points);
    }

    fn normalize_node(&mut self, id: NodeId, points: &mut [&mut Position]) {
        let mut i = 0;
        while i < self.children(id).len() {
            let child = self.children(id)[i];
            if !self.is_text(child) {
                self.normalize_node(child, points);
                i += 1;
                continue;
            }

            if self.node_length(child) == 0 {
                for p in points.iter_mut() {
                    if p.node == child {
                        **p = Position::new(id, i);
                    } else if p.node == id && p.offset > i {
                        p.offset -= 1;
                    }
                }
                self.detach(child);
                continue;
            }

            while let Some(&next) = self.children(id).get(i + 1) {
                if !self.is_text(next) {
                    break;
                }
                let len = self.node_length(child);
                for p in points.iter_mut() {
                    if p.node == next {
                        **p = Position::new(child, len + p.offset);
                    } else if p.node == id && p.offset == i + 1 {
                        **p = Position::new(child, len);
                    } else if p.node == id && p.offset > i + 1 {
                        p.offset -= 1;
                    }
                }
                let tail = self.text(next).unwrap_or_default().to_string();
                if let NodeData::Text(text) = &mut self.nodes[child.0].data {
                    text.push_str(&tail);
                }
                self.detach(next);
            }
            i += 1;
        }
    }
}

/// Byte index of the `offset`-th character, clamped to the string end.
pub(crate) fn char_to_byte(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map_or(text.len(), |(byte, _)| byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn para_tree(texts: &[&str]) -> (Tree, Vec<NodeId>) {
        let mut tree = Tree::new();
        let root = tree.root();
        let paras = texts
            .iter()
            .map(|t| {
                let p = tree.create_element(Tag::P);
                let text = tree.create_text(*t);
                tree.append_child(p, text);
                tree.append_child(root, p);
                p
            })
            .collect();
        (tree, paras)
    }

    #[test]
    fn test_append_moves_node_between_parents() {
        let (mut tree, paras) = para_tree(&["a", "b"]);
        let text = tree.children(paras[0])[0];

        tree.append_child(paras[1], text);

        assert_eq!(tree.node_length(paras[0]), 0);
        assert_eq!(tree.text_content(paras[1]), "ba");
        assert_eq!(tree.parent(text), Some(paras[1]));
    }

    #[test]
    fn test_offset_path_round_trip() {
        let (tree, paras) = para_tree(&["a", "b", "c"]);
        let text = tree.children(paras[2])[0];

        let path = tree.offset_path(tree.root(), text);

        assert_eq!(path, vec![2, 0]);
        assert_eq!(tree.from_offset_path(tree.root(), &path), text);
    }

    #[test]
    fn test_from_offset_path_clamps() {
        let (tree, paras) = para_tree(&["a", "b"]);
        let last_text = tree.children(paras[1])[0];

        assert_eq!(tree.from_offset_path(tree.root(), &[7, 3, 9]), last_text);
    }

    #[test]
    fn test_split_text_by_chars() {
        let (mut tree, paras) = para_tree(&["héllo"]);
        let text = tree.children(paras[0])[0];

        let right = tree.split_text(text, 2);

        assert_eq!(tree.text(text), Some("hé"));
        assert_eq!(tree.text(right), Some("llo"));
        assert_eq!(tree.children(paras[0]), &[text, right]);
    }

    #[test]
    fn test_split_tree_clones_ancestors() {
        let mut tree = Tree::new();
        let root = tree.root();
        let ul = tree.create_element(Tag::Ul);
        tree.append_child(root, ul);
        let items: Vec<NodeId> = (0..3)
            .map(|_| {
                let li = tree.create_element(Tag::Li);
                tree.append_child(ul, li);
                li
            })
            .collect();

        let right = tree.split_tree(ul, Position::new(ul, 1), false).unwrap();

        assert_eq!(tree.children(ul), &[items[0]]);
        assert_eq!(tree.children(right), &[items[1], items[2]]);
        assert_eq!(tree.next_sibling(ul), Some(right));
    }

    #[test]
    fn test_retag_keeps_only_style() {
        let (mut tree, paras) = para_tree(&["a"]);
        tree.set_attr(paras[0], "class", "x");
        tree.set_attr(paras[0], "style", "margin-left: 25px");

        tree.retag(paras[0], Tag::Li);

        assert_eq!(tree.tag(paras[0]), Some(&Tag::Li));
        assert_eq!(
            tree.attrs(paras[0]),
            &[("style".to_string(), "margin-left: 25px".to_string())]
        );
    }

    #[test]
    fn test_normalize_merges_text_and_remaps_points() {
        let (mut tree, paras) = para_tree(&["ab"]);
        let first = tree.children(paras[0])[0];
        let empty = tree.create_text("");
        let second = tree.create_text("cd");
        tree.append_child(paras[0], empty);
        tree.append_child(paras[0], second);

        let mut inside = Position::new(second, 1);
        let mut after = Position::new(paras[0], 3);
        tree.normalize(&mut [&mut inside, &mut after]);

        assert_eq!(tree.children(paras[0]), &[first]);
        assert_eq!(tree.text(first), Some("abcd"));
        assert_eq!(inside, Position::new(first, 3));
        assert_eq!(after, Position::new(paras[0], 1));
    }

    #[test]
    fn test_predicates() {
        let (mut tree, paras) = para_tree(&["a"]);
        let span = tree.wrap(tree.children(paras[0])[0], Tag::Span);

        assert!(tree.is_para(paras[0]));
        assert!(tree.is_pure_para(paras[0]));
        assert!(!tree.is_para(tree.root()));
        assert!(tree.is_inline(span));
        assert_eq!(tree.ancestor(span, Tree::is_para), Some(paras[0]));
    }

    #[test]
    fn test_removed_node_stays_readable() {
        let (mut tree, paras) = para_tree(&["a", "b"]);
        let text = tree.children(paras[1])[0];

        tree.remove(paras[1]);

        assert!(!tree.is_attached(paras[1]));
        assert_eq!(tree.text(text), Some("b"));
        assert_eq!(tree.children(tree.root()), &[paras[0]]);
    }
}

//! Shared helpers for unit tests.

use crate::dom::{NodeId, Position, Tree};
use crate::editing::Document;
use crate::range::Range;

/// The text node whose content is exactly `text`.
pub fn find_text(tree: &Tree, text: &str) -> NodeId {
    tree.list_descendant(tree.root(), |t, n| t.text(n) == Some(text))
        .first()
        .copied()
        .unwrap_or_else(|| panic!("Should find text node {text:?}"))
}

/// Select characters `start..end` of the text node reading `text`.
pub fn select_text(doc: &mut Document, text: &str, start: usize, end: usize) {
    let node = find_text(doc.tree(), text);
    doc.select(Range::new(
        Position::new(node, start),
        Position::new(node, end),
    ));
}

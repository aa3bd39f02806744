//! # List/Indent Engine
//!
//! Promotes paragraphs into lists, releases list items back into paragraphs
//! and nests or un-nests them.
//!
//! Every operation starts the same way: wrap stray body-level inline content
//! into a paragraph, collect the paragraph-like nodes the selection touches,
//! then group them into clusters of contiguous siblings sharing a parent.
//! Each cluster is restructured independently:
//!
//! ```text
//! <blockquote><p>1</p><p>2</p></blockquote><blockquote><p>3</p></blockquote>
//!   → clusters [[p1, p2], [p3]]
//! ```
//!
//! Paragraph nodes are retagged in place (`p` ↔ `li`) rather than recreated,
//! so a paragraph bookmark taken before the change still resolves after it.

use crate::dom::{NodeId, Position, Tag, Tree, css};
use crate::editing::Document;
use crate::range::{NodesOptions, Range};

/// Left margin step applied by indent and outdent, in pixels.
pub const INDENT_STEP: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    pub fn tag(self) -> Tag {
        match self {
            ListKind::Ordered => Tag::Ol,
            ListKind::Unordered => Tag::Ul,
        }
    }
}

pub fn insert_ordered_list(doc: &mut Document) {
    toggle_list(doc, ListKind::Ordered);
}

pub fn insert_unordered_list(doc: &mut Document) {
    toggle_list(doc, ListKind::Unordered);
}

/// Group `paras` into runs of consecutive nodes with the same parent.
pub fn cluster_by_parent(tree: &Tree, paras: &[NodeId]) -> Vec<Vec<NodeId>> {
    let mut clusters: Vec<Vec<NodeId>> = Vec::new();
    for &para in paras {
        match clusters.last_mut() {
            Some(cluster)
                if cluster.last().map(|&p| tree.parent(p)) == Some(tree.parent(para)) =>
            {
                cluster.push(para);
            }
            _ => clusters.push(vec![para]),
        }
    }
    clusters
}

fn selected_paras(tree: &Tree, range: &Range) -> Vec<NodeId> {
    range
        .nodes(tree, Tree::is_para, NodesOptions::include_ancestor())
        .collect()
}

/// Turn the selected paragraphs into a list of `kind`, switch the kind of
/// the lists they are in, or release them back into paragraphs.
pub fn toggle_list(doc: &mut Document, kind: ListKind) {
    let range = doc.create_range().wrap_body_inline_with_para(&mut doc.tree);
    let tree = &mut doc.tree;

    let mut paras = selected_paras(tree, &range);
    let bookmark = range.para_bookmark(tree, &paras);
    let clusters = cluster_by_parent(tree, &paras);
    let list_tag = kind.tag();

    if paras.iter().any(|&p| tree.is_pure_para(p)) {
        paras = clusters
            .iter()
            .flat_map(|cluster| wrap_list(tree, cluster, list_tag.clone()))
            .collect();
    } else {
        let diff_lists: Vec<NodeId> = range
            .nodes(tree, Tree::is_list, NodesOptions::include_ancestor())
            .filter(|&list| !tree.has_tag(list, &list_tag))
            .collect();

        if diff_lists.is_empty() {
            paras = release_list(tree, &clusters, true);
        } else {
            for list in diff_lists {
                tree.retag(list, list_tag.clone());
            }
        }
    }

    let range = Range::from_para_bookmark(tree, &bookmark, &paras);
    doc.select(range);
}

/// Nest list items one level deeper, or add one margin step to plain
/// paragraphs.
pub fn indent(doc: &mut Document) {
    let range = doc.create_range().wrap_body_inline_with_para(&mut doc.tree);
    let tree = &mut doc.tree;
    let paras = selected_paras(tree, &range);

    for cluster in cluster_by_parent(tree, &paras) {
        let head = cluster[0];
        if !tree.is_li(head) {
            for &para in &cluster {
                let margin = tree.style_px(para, "margin-left").unwrap_or(0.0).trunc();
                tree.set_style(para, "margin-left", css::format_px(margin + INDENT_STEP));
            }
            continue;
        }

        if let Some(previous_list) = find_list(tree, tree.prev_sibling(head)) {
            tree.append_children(previous_list, &cluster);
            continue;
        }

        let list_tag = tree
            .parent(head)
            .and_then(|p| tree.tag(p).cloned())
            .filter(Tag::is_list)
            .unwrap_or(Tag::Ul);
        wrap_list(tree, &cluster, list_tag);

        let mut new_lists: Vec<NodeId> = cluster.iter().filter_map(|&p| tree.parent(p)).collect();
        new_lists.dedup();
        for list in new_lists {
            append_to_previous(tree, list);
        }
    }

    doc.select(range);
}

/// Release list items one level, or remove one margin step from plain
/// paragraphs. The margin never goes below zero.
pub fn outdent(doc: &mut Document) {
    let range = doc.create_range().wrap_body_inline_with_para(&mut doc.tree);
    let tree = &mut doc.tree;
    let paras = selected_paras(tree, &range);

    for cluster in cluster_by_parent(tree, &paras) {
        if tree.is_li(cluster[0]) {
            release_list(tree, &[cluster], false);
            continue;
        }
        for &para in &cluster {
            let margin = tree.style_px(para, "margin-left").unwrap_or(0.0).trunc();
            if margin > INDENT_STEP {
                tree.set_style(para, "margin-left", css::format_px(margin - INDENT_STEP));
            } else {
                tree.remove_style(para, "margin-left");
            }
        }
    }

    doc.select(range);
}

/// Move a cluster of paragraphs into a list of `tag` and return the nodes
/// it touched.
///
/// A list right before the cluster is reused, plain paragraphs become list
/// items, and a list right after the cluster is merged in.
pub fn wrap_list(tree: &mut Tree, paras: &[NodeId], tag: Tag) -> Vec<NodeId> {
    let (Some(&head), Some(&last)) = (paras.first(), paras.last()) else {
        return Vec::new();
    };

    let prev_list = tree.prev_sibling(head).filter(|&n| tree.is_list(n));
    let next_list = tree.next_sibling(last).filter(|&n| tree.is_list(n));

    let list = match prev_list {
        Some(list) => list,
        None => {
            let list = tree.create_element(tag);
            tree.insert_after(list, last);
            list
        }
    };

    for &para in paras {
        if tree.is_pure_para(para) {
            tree.retag(para, Tag::Li);
        }
    }
    tree.append_children(list, paras);

    if let Some(next_list) = next_list {
        let items = tree.children(next_list).to_vec();
        tree.append_children(list, &items);
        tree.remove(next_list);
    }

    paras.to_vec()
}

/// Release each cluster out of its list and return the released nodes.
///
/// With `escape_to_body` the cluster leaves its outermost list and every
/// item becomes a plain paragraph; otherwise it moves up one level.
pub fn release_list(tree: &mut Tree, clusters: &[Vec<NodeId>], escape_to_body: bool) -> Vec<NodeId> {
    let mut released = Vec::new();

    for cluster in clusters {
        let (Some(&head), Some(&last)) = (cluster.first(), cluster.last()) else {
            continue;
        };
        let head_list = if escape_to_body {
            tree.last_ancestor(head, Tree::is_list)
        } else {
            tree.parent(head).filter(|&p| tree.is_list(p))
        };
        let Some(head_list) = head_list else {
            continue;
        };
        let Some(parent_item) = tree.parent(head_list) else {
            continue;
        };

        if tree.is_li(parent_item) {
            release_nested(tree, cluster, head_list, parent_item);
            released.extend_from_slice(cluster);
        } else {
            released.extend(release_top_level(tree, head, last, head_list, escape_to_body));
        }
    }

    released
}

/// Move the cluster out of a list nested in `parent_item`, right after that
/// item, keeping the order. Items following the cluster stay nested under
/// its last paragraph.
fn release_nested(tree: &mut Tree, cluster: &[NodeId], head_list: NodeId, parent_item: NodeId) {
    let Some(&last) = cluster.last() else {
        return;
    };
    let remaining = tree.next_siblings(last);

    let mut anchor = parent_item;
    for &para in cluster {
        tree.insert_after(para, anchor);
        anchor = para;
    }

    if !remaining.is_empty() {
        let tag = tree.tag(head_list).cloned().unwrap_or(Tag::Ul);
        let sub_list = tree.create_element(tag);
        tree.append_children(sub_list, &remaining);
        tree.append_child(last, sub_list);
    }

    if tree.element_children(head_list).is_empty() {
        tree.remove(head_list);
    }
    if tree.node_length(parent_item) == 0 {
        tree.remove(parent_item);
    }
}

/// Split `head_list` into before/middle/after fragments around the cluster,
/// pull the middle items out after the list and prune emptied lists.
fn release_top_level(
    tree: &mut Tree,
    head: NodeId,
    last: NodeId,
    head_list: NodeId,
    escape_to_body: bool,
) -> Vec<NodeId> {
    let last_list = match tree.parent(last) {
        Some(parent) if tree.node_length(head_list) > 1 => tree.split_tree(
            head_list,
            Position::new(parent, tree.index_of(last) + 1),
            false,
        ),
        _ => None,
    };
    let Some(head_parent) = tree.parent(head) else {
        return Vec::new();
    };
    let Some(middle_list) = tree.split_tree(
        head_list,
        Position::new(head_parent, tree.index_of(head)),
        false,
    ) else {
        return Vec::new();
    };

    let paras: Vec<NodeId> = if escape_to_body {
        tree.list_descendant(middle_list, Tree::is_li)
    } else {
        tree.children(middle_list)
            .iter()
            .copied()
            .filter(|&n| tree.is_li(n))
            .collect()
    };

    let parent_is_list = tree.parent(head_list).is_some_and(|p| tree.is_list(p));
    if escape_to_body || !parent_is_list {
        for &para in &paras {
            tree.retag(para, Tag::P);
        }
    }

    for &para in paras.iter().rev() {
        tree.insert_after(para, head_list);
    }

    let roots = [Some(head_list), Some(middle_list), last_list];
    for root in roots.into_iter().flatten().chain(paras.iter().copied()) {
        prune_empty_lists(tree, root);
    }

    paras
}

/// Remove `root` (when it is a list) and its descendant lists that have no
/// children, deepest first.
fn prune_empty_lists(tree: &mut Tree, root: NodeId) {
    let mut lists = tree.list_descendant(root, Tree::is_list);
    if tree.is_list(root) {
        lists.insert(0, root);
    }
    for list in lists.into_iter().rev() {
        if tree.node_length(list) == 0 {
            tree.remove(list);
        }
    }
}

/// Append `node` to its previous sibling, or wrap it in a new list item
/// when it has none.
pub fn append_to_previous(tree: &mut Tree, node: NodeId) {
    match tree.prev_sibling(node) {
        Some(previous) => tree.append_child(previous, node),
        None => {
            wrap_list(tree, &[node], Tag::Li);
        }
    }
}

/// First list among the element children of `node`.
pub fn find_list(tree: &Tree, node: Option<NodeId>) -> Option<NodeId> {
    let node = node?;
    tree.children(node).iter().copied().find(|&c| tree.is_list(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{find_text, select_text};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn select_all(markup: &str) -> Document {
        let mut doc = Document::from_markup(markup);
        doc.select(Range::select_all(doc.tree()));
        doc
    }

    // ============ Clustering ============

    #[test]
    fn test_cluster_by_parent() {
        let tree = Tree::from_markup(
            "<blockquote><p>1</p><p>2</p></blockquote><blockquote><p>3</p></blockquote>",
        );
        let para = |text| tree.parent(find_text(&tree, text)).unwrap();
        let paras = vec![para("1"), para("2"), para("3")];

        let clusters = cluster_by_parent(&tree, &paras);

        assert_eq!(clusters, vec![vec![paras[0], paras[1]], vec![paras[2]]]);
    }

    // ============ Toggling lists ============

    #[test]
    fn test_toggle_wraps_paragraphs_in_order() {
        let mut doc = select_all("<p>a</p><p>b</p><p>c</p>");

        toggle_list(&mut doc, ListKind::Unordered);

        assert_snapshot!(doc.markup(), @"<ul><li>a</li><li>b</li><li>c</li></ul>");
        assert_eq!(doc.selected_text(), "abc");
    }

    #[test]
    fn test_toggle_same_kind_twice_releases() {
        let mut doc = select_all("<p>a</p><p>b</p><p>c</p>");

        toggle_list(&mut doc, ListKind::Unordered);
        toggle_list(&mut doc, ListKind::Unordered);

        assert_snapshot!(doc.markup(), @"<p>a</p><p>b</p><p>c</p>");
        assert_eq!(doc.selected_text(), "abc");
    }

    #[test]
    fn test_toggle_other_kind_retags() {
        let mut doc = select_all("<p>a</p><p>b</p>");

        toggle_list(&mut doc, ListKind::Unordered);
        toggle_list(&mut doc, ListKind::Ordered);

        assert_snapshot!(doc.markup(), @"<ol><li>a</li><li>b</li></ol>");
    }

    #[test]
    fn test_toggle_wraps_body_inline_text() {
        let mut doc = Document::from_markup("plain");
        select_text(&mut doc, "plain", 2, 2);

        insert_unordered_list(&mut doc);

        assert_snapshot!(doc.markup(), @"<ul><li>plain</li></ul>");
    }

    #[test]
    fn test_toggle_joins_neighbouring_lists() {
        let mut doc = Document::from_markup("<ul><li>a</li></ul><p>b</p><ul><li>c</li></ul>");
        select_text(&mut doc, "b", 0, 1);

        insert_unordered_list(&mut doc);

        assert_snapshot!(doc.markup(), @"<ul><li>a</li><li>b</li><li>c</li></ul>");
    }

    #[test]
    fn test_toggle_releases_nested_items_to_body() {
        let mut doc = select_all("<ul><li>a<ul><li>b</li></ul></li></ul>");

        toggle_list(&mut doc, ListKind::Unordered);

        assert_snapshot!(doc.markup(), @"<p>a</p><p>b</p>");
    }

    // ============ Releasing ============

    #[test]
    fn test_release_both_items() {
        let mut tree = Tree::from_markup("<ul><li>a</li><li>b</li></ul>");
        let items = tree.children(tree.children(tree.root())[0]).to_vec();

        let released = release_list(&mut tree, &[items.clone()], true);

        assert_eq!(released, items);
        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>a</p><p>b</p>");
    }

    #[test]
    fn test_release_middle_item_splits_list() {
        let mut doc = Document::from_markup("<ul><li>a</li><li>b</li><li>c</li></ul>");
        select_text(&mut doc, "b", 0, 0);

        outdent(&mut doc);

        assert_snapshot!(doc.markup(), @"<ul><li>a</li></ul><p>b</p><ul><li>c</li></ul>");
    }

    // ============ Indent / outdent ============

    #[test]
    fn test_indent_paragraph_margin() {
        let mut doc = Document::from_markup("<p>a</p>");
        select_text(&mut doc, "a", 0, 0);

        indent(&mut doc);
        indent(&mut doc);

        assert_snapshot!(doc.markup(), @r#"<p style="margin-left: 50px;">a</p>"#);
    }

    #[test]
    fn test_outdent_floors_at_zero() {
        let mut doc = Document::from_markup(r#"<p style="margin-left: 25px;">a</p>"#);
        select_text(&mut doc, "a", 0, 0);

        outdent(&mut doc);
        outdent(&mut doc);

        assert_snapshot!(doc.markup(), @"<p>a</p>");
    }

    #[test]
    fn test_indent_item_nests_under_previous() {
        let mut doc = Document::from_markup("<ul><li>a</li><li>b</li></ul>");
        select_text(&mut doc, "b", 0, 0);

        indent(&mut doc);

        assert_snapshot!(doc.markup(), @"<ul><li>a<ul><li>b</li></ul></li></ul>");
    }

    #[test]
    fn test_indent_item_reuses_existing_sub_list() {
        let mut doc = Document::from_markup("<ol><li>a<ol><li>x</li></ol></li><li>b</li></ol>");
        select_text(&mut doc, "b", 0, 0);

        indent(&mut doc);

        assert_snapshot!(doc.markup(), @"<ol><li>a<ol><li>x</li><li>b</li></ol></li></ol>");
    }

    #[test]
    fn test_indent_first_item_wraps_in_new_item() {
        let mut doc = Document::from_markup("<ul><li>a</li></ul>");
        select_text(&mut doc, "a", 0, 0);

        indent(&mut doc);

        assert_snapshot!(doc.markup(), @"<ul><li><ul><li>a</li></ul></li></ul>");
    }

    #[test]
    fn test_indent_then_outdent_restores_list() {
        let mut doc = Document::from_markup("<ul><li>a</li><li>b</li><li>c</li></ul>");
        select_text(&mut doc, "b", 0, 0);

        indent(&mut doc);
        outdent(&mut doc);

        assert_snapshot!(doc.markup(), @"<ul><li>a</li><li>b</li><li>c</li></ul>");
    }

    #[test]
    fn test_outdent_keeps_following_items_nested() {
        let mut doc =
            Document::from_markup("<ul><li>a<ul><li>b</li><li>c</li></ul></li></ul>");
        select_text(&mut doc, "b", 0, 0);

        outdent(&mut doc);

        assert_snapshot!(doc.markup(), @"<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul>");
    }
}

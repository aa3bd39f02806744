//! Serializable, path-based range endpoints.
//!
//! A bookmark records each endpoint as the child indices leading down from
//! a stable ancestor plus the offset. Indices are positional, so a bookmark
//! is only exact against the tree it was taken from: resolve it right after
//! the mutation it brackets, never cache it across unrelated edits.
//! Resolving against a changed tree clamps to the nearest existing node and
//! offset instead of failing.

use serde::{Deserialize, Serialize};

use super::Range;
use crate::dom::{NodeId, Position, Tree};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkPoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl BookmarkPoint {
    fn of(tree: &Tree, ancestor: NodeId, pos: Position) -> Self {
        Self {
            path: tree.offset_path(ancestor, pos.node),
            offset: pos.offset,
        }
    }

    fn resolve(&self, tree: &Tree, ancestor: NodeId) -> Position {
        let node = tree.from_offset_path(ancestor, &self.path);
        Position::new(node, self.offset.min(tree.node_length(node)))
    }
}

/// The all-zero default resolves to the start of the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(rename = "s")]
    pub start: BookmarkPoint,
    #[serde(rename = "e")]
    pub end: BookmarkPoint,
}

impl Range {
    /// Bookmark relative to the editable root.
    pub fn bookmark(&self, tree: &Tree) -> Bookmark {
        let root = tree.root();
        Bookmark {
            start: BookmarkPoint::of(tree, root, self.start),
            end: BookmarkPoint::of(tree, root, self.end),
        }
    }

    pub fn from_bookmark(tree: &Tree, bookmark: &Bookmark) -> Self {
        let root = tree.root();
        Self::new(
            bookmark.start.resolve(tree, root),
            bookmark.end.resolve(tree, root),
        )
    }

    /// Bookmark relative to the first and last of `paras`: the start is
    /// recorded under the head paragraph and the end under the last one.
    ///
    /// Paragraph nodes keep their identity when they are retagged or moved,
    /// so this survives list restructuring that changes sibling indices.
    pub fn para_bookmark(&self, tree: &Tree, paras: &[NodeId]) -> Bookmark {
        let (Some(&head), Some(&last)) = (paras.first(), paras.last()) else {
            return self.bookmark(tree);
        };
        let start = if tree.contains(head, self.start.node) {
            BookmarkPoint::of(tree, head, self.start)
        } else {
            BookmarkPoint::default()
        };
        let end = if tree.contains(last, self.end.node) {
            BookmarkPoint::of(tree, last, self.end)
        } else {
            BookmarkPoint {
                path: Vec::new(),
                offset: tree.node_length(last),
            }
        };
        Bookmark { start, end }
    }

    pub fn from_para_bookmark(tree: &Tree, bookmark: &Bookmark, paras: &[NodeId]) -> Self {
        let (Some(&head), Some(&last)) = (paras.first(), paras.last()) else {
            return Self::from_bookmark(tree, bookmark);
        };
        Self::new(bookmark.start.resolve(tree, head), bookmark.end.resolve(tree, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::find_text;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const MARKUP: &str = "<p>ab<b>cd</b></p><ul><li>ef</li><li>gh<br></li></ul>";

    #[rstest]
    #[case("ab", 0, "ab", 2)]
    #[case("ab", 1, "ef", 1)]
    #[case("cd", 2, "gh", 2)]
    fn test_bookmark_round_trip(
        #[case] start_text: &str,
        #[case] start_offset: usize,
        #[case] end_text: &str,
        #[case] end_offset: usize,
    ) {
        let tree = Tree::from_markup(MARKUP);
        let range = Range::new(
            Position::new(find_text(&tree, start_text), start_offset),
            Position::new(find_text(&tree, end_text), end_offset),
        );

        let bookmark = range.bookmark(&tree);

        assert_eq!(Range::from_bookmark(&tree, &bookmark), range);
    }

    #[test]
    fn test_element_endpoints_round_trip() {
        let tree = Tree::from_markup(MARKUP);
        let range = Range::select_all(&tree);

        assert_eq!(Range::from_bookmark(&tree, &range.bookmark(&tree)), range);
    }

    #[test]
    fn test_bookmark_wire_format() {
        let tree = Tree::from_markup(MARKUP);
        let range = Range::collapsed(Position::new(find_text(&tree, "cd"), 1));

        let json = serde_json::to_string(&range.bookmark(&tree)).unwrap();

        assert_eq!(json, r#"{"s":{"path":[0,1,0],"offset":1},"e":{"path":[0,1,0],"offset":1}}"#);
    }

    #[test]
    fn test_stale_bookmark_clamps() {
        let tree = Tree::from_markup("<p>ab</p>");
        let ab = find_text(&tree, "ab");
        let bookmark = Bookmark {
            start: BookmarkPoint {
                path: vec![4, 2],
                offset: 9,
            },
            end: BookmarkPoint::default(),
        };

        let range = Range::from_bookmark(&tree, &bookmark);

        assert_eq!(range.start, Position::new(ab, 2));
        assert_eq!(range.end, Position::new(tree.root(), 0));
    }

    #[test]
    fn test_para_bookmark_survives_retag() {
        let mut tree = Tree::from_markup("<p>ab</p><p>cd</p>");
        let paras = tree.children(tree.root()).to_vec();
        let range = Range::new(
            Position::new(find_text(&tree, "ab"), 1),
            Position::new(find_text(&tree, "cd"), 1),
        );
        let bookmark = range.para_bookmark(&tree, &paras);

        let ul = tree.wrap(paras[0], crate::dom::Tag::Ul);
        tree.append_child(ul, paras[1]);
        for &p in &paras {
            tree.retag(p, crate::dom::Tag::Li);
        }

        assert_eq!(Range::from_para_bookmark(&tree, &bookmark, &paras), range);
    }
}

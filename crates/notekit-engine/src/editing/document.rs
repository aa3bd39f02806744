use std::path::Path;

use thiserror::Error;

use crate::dom::{NodeId, Position, Tree};
use crate::range::Range;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// One editing session's state: the tree, the live selection and the
/// out-of-range media target.
///
/// Every engine operation takes the document explicitly; nothing reads the
/// selection from ambient state.
///
/// ```rust
/// # use notekit_engine::{Document, Range};
/// let mut doc = Document::from_markup("<p>Hello</p>");
/// let all = Range::select_all(doc.tree());
/// doc.select(all);
///
/// assert_eq!(doc.selected_text(), "Hello");
/// assert_eq!(doc.markup(), "<p>Hello</p>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub(crate) tree: Tree,
    /// Live selection, `None` until something selects
    pub(crate) selection: Option<Range>,
    /// Incremented on every content replacement or command
    pub(crate) version: u64,
    /// Embedded node (image, figure) a media command acts on
    pub(crate) target: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_markup(markup: &str) -> Self {
        Self {
            tree: Tree::from_markup(markup),
            ..Self::default()
        }
    }

    /// Create a document from raw bytes of markup
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let markup = std::str::from_utf8(bytes)?;
        Ok(Self::from_markup(markup))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(Self::from_bytes(&bytes)?)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }

    /// Serialized content of the editable root.
    pub fn markup(&self) -> String {
        self.tree.inner_markup(self.tree.root())
    }

    /// Replace the whole content. Node ids from the old tree become invalid,
    /// so the selection and target are dropped.
    pub fn set_markup(&mut self, markup: &str) {
        self.tree = Tree::from_markup(markup);
        self.selection = None;
        self.target = None;
        self.touch();
    }

    pub fn selection(&self) -> Option<Range> {
        self.selection
    }

    /// The live selection, or a collapsed range at the start of the root.
    pub fn create_range(&self) -> Range {
        self.selection
            .unwrap_or_else(|| Range::collapsed(Position::new(self.tree.root(), 0)))
    }

    pub fn select(&mut self, range: Range) {
        self.selection = Some(range);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selected_text(&self) -> String {
        self.selection
            .map(|range| range.text(&self.tree))
            .unwrap_or_default()
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target.filter(|&t| self.tree.is_attached(t))
    }

    pub fn set_target(&mut self, target: Option<NodeId>) {
        self.target = target;
    }

    /// No visible content in the root.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty(self.tree.root())
    }

    /// Merge adjacent text runs, keeping the selection and `extra` valid.
    pub fn normalize(&mut self, extra: &mut [&mut Position]) {
        let mut selection = self.selection;
        {
            let mut points: Vec<&mut Position> = extra.iter_mut().map(|p| &mut **p).collect();
            if let Some(range) = selection.as_mut() {
                points.push(&mut range.start);
                points.push(&mut range.end);
            }
            self.tree.normalize(&mut points);
        }
        self.selection = selection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::find_text;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let result = Document::from_bytes(&[0x3c, 0x70, 0xff]);

        assert!(matches!(result, Err(DocumentError::Utf8(_))));
    }

    #[test]
    fn test_set_markup_resets_selection() {
        let mut doc = Document::from_markup("<p>a</p>");
        doc.select(Range::select_all(doc.tree()));
        let version = doc.version();

        doc.set_markup("<p>b</p>");

        assert_eq!(doc.selection(), None);
        assert_eq!(doc.markup(), "<p>b</p>");
        assert!(doc.version() > version);
    }

    #[test]
    fn test_normalize_keeps_selection_on_text() {
        let mut doc = Document::from_markup("<p>ab</p>");
        let ab = find_text(doc.tree(), "ab");
        let p = doc.tree().parent(ab).unwrap();
        let cd = doc.tree_mut().create_text("cd");
        doc.tree_mut().append_child(p, cd);
        doc.select(Range::new(Position::new(ab, 1), Position::new(cd, 1)));

        doc.normalize(&mut []);

        assert_eq!(doc.markup(), "<p>abcd</p>");
        assert_eq!(doc.selected_text(), "bc");
    }

    #[test]
    fn test_is_empty() {
        assert!(Document::from_markup("<p><br></p>").is_empty());
        assert!(!Document::from_markup("<p>x</p>").is_empty());
        assert!(!Document::from_markup("<p><img src=\"a.png\"></p>").is_empty());
    }

    #[test]
    fn test_from_path_reads_markup() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.html");
        std::fs::write(&path, "<p>saved</p>").unwrap();

        let doc = Document::from_path(&path).unwrap();

        assert_eq!(doc.markup(), "<p>saved</p>");
    }
}

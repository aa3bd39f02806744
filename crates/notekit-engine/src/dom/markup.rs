//! Converting between markup text and tree nodes.
//!
//! Building consumes the balanced [`notekit_markup::Event`] stream with a
//! stack of open elements. Serialization is the reverse walk; text and
//! attribute values are escaped with `html-escape`.

use notekit_markup::Event;

use super::{NodeData, NodeId, Tag, Tree};

impl Tree {
    /// A tree whose root holds the parsed content of `markup`.
    pub fn from_markup(markup: &str) -> Self {
        let mut tree = Tree::new();
        let root = tree.root();
        tree.set_inner_markup(root, markup);
        tree
    }

    /// Parse `markup` into new, unattached top-level nodes.
    pub fn parse_fragment(&mut self, markup: &str) -> Vec<NodeId> {
        let mut top_level = Vec::new();
        let mut open: Vec<NodeId> = Vec::new();

        for event in notekit_markup::parse(markup) {
            match event {
                Event::Start { name, attrs } => {
                    let node = self.push(NodeData::Element {
                        tag: Tag::from_name(&name),
                        attrs,
                    });
                    match open.last() {
                        Some(&parent) => self.append_child(parent, node),
                        None => top_level.push(node),
                    }
                    open.push(node);
                }
                Event::Text(text) => {
                    let node = self.create_text(text);
                    match open.last() {
                        Some(&parent) => self.append_child(parent, node),
                        None => top_level.push(node),
                    }
                }
                Event::End => {
                    open.pop();
                }
            }
        }

        top_level
    }

    /// Replace the children of `parent` with the parsed `markup`.
    pub fn set_inner_markup(&mut self, parent: NodeId, markup: &str) {
        for child in self.children(parent).to_vec() {
            self.detach(child);
        }
        let nodes = self.parse_fragment(markup);
        self.append_children(parent, &nodes);
    }

    /// Markup of the children of `id`.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_markup(child, &mut out);
        }
        out
    }

    /// Markup of `id` itself, including its own tag.
    pub fn outer_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag.name());
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if tag.is_void() {
                    return;
                }
                for &child in self.children(id) {
                    self.write_markup(child, out);
                }
                out.push_str("</");
                out.push_str(tag.name());
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("<p>hello</p>")]
    #[case("<ul><li>a</li><li>b<br></li></ul>")]
    #[case(r#"<p style="margin-left: 25px;">x &amp; y &lt; z</p>"#)]
    #[case(r#"<p><a href="http://e.com/?a=1&amp;b=&quot;2&quot;">link</a></p>"#)]
    #[case("")]
    fn test_markup_is_stable(#[case] markup: &str) {
        let tree = Tree::from_markup(markup);
        assert_eq!(tree.inner_markup(tree.root()), markup);
    }

    #[test]
    fn test_tags_are_normalized() {
        let tree = Tree::from_markup("<P>a<BR/>b</P>");
        assert_eq!(tree.inner_markup(tree.root()), "<p>a<br>b</p>");
    }

    #[test]
    fn test_parse_fragment_is_unattached() {
        let mut tree = Tree::from_markup("<p>a</p>");

        let nodes = tree.parse_fragment("<b>x</b>tail");

        assert_eq!(nodes.len(), 2);
        assert!(!tree.is_attached(nodes[0]));
        assert_eq!(tree.outer_markup(nodes[0]), "<b>x</b>");
        assert_eq!(tree.text(nodes[1]), Some("tail"));
    }
}

//! # Inline Style Engine
//!
//! Wraps or merges inline nodes to apply character styling, applies
//! paragraph-level properties, and reports the effective style at the
//! selection.
//!
//! Two host capabilities sit behind traits so an embedding can answer from a
//! real layout engine:
//!
//! - [`ComputedStyleSource`] resolves computed CSS properties of a node
//! - [`FormattingStateProvider`] answers toggle states such as "is bold";
//!   `None` means the capability is unavailable and the flag reads as off
//!
//! The defaults ([`InlineStyleCascade`], [`TreeFormattingState`]) derive
//! both from the tree itself.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::dom::{NodeId, Tag, Tree, css};
use crate::range::{NodesOptions, Range};

const DEFAULT_FONT_FAMILY: &str = "sans-serif";
const DEFAULT_FONT_SIZE_PX: f64 = 14.0;
const DEFAULT_LINE_HEIGHT_RATIO: f64 = 1.5;

const UNORDERED_LIST_TYPES: [&str; 4] = ["circle", "disc", "disc-leading-zero", "square"];

/// Computed CSS properties of a node, as a layout engine would report them.
pub trait ComputedStyleSource {
    fn computed_style(&self, tree: &Tree, node: NodeId, property: &str) -> Option<String>;
}

/// Formatting toggles the host can report for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Subscript,
    Superscript,
    FontName,
}

pub trait FormattingStateProvider {
    /// On/off state of a toggle, `None` when the host cannot tell.
    fn query_state(&self, tree: &Tree, range: &Range, command: FormatCommand) -> Option<bool>;

    /// Value of a valued command such as the font name.
    fn query_value(&self, tree: &Tree, range: &Range, command: FormatCommand) -> Option<String>;
}

/// Resolves inherited properties from `style` attributes up the ancestry,
/// falling back to fixed defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineStyleCascade;

impl InlineStyleCascade {
    fn inherited(tree: &Tree, node: NodeId, property: &str) -> Option<String> {
        tree.ancestors(node).find_map(|n| tree.style(n, property))
    }

    fn font_size_px(tree: &Tree, node: NodeId) -> f64 {
        let Some(element) = tree.ancestors(node).find(|&n| tree.style(n, "font-size").is_some())
        else {
            return DEFAULT_FONT_SIZE_PX;
        };
        let parent_px = || {
            tree.parent(element)
                .map_or(DEFAULT_FONT_SIZE_PX, |p| Self::font_size_px(tree, p))
        };
        match tree.style(element, "font-size").as_deref().and_then(css::parse_length) {
            Some((n, unit)) => match unit.as_str() {
                "" | "px" => n,
                "pt" => n * 4.0 / 3.0,
                "em" | "rem" => n * parent_px(),
                "%" => n * parent_px() / 100.0,
                _ => DEFAULT_FONT_SIZE_PX,
            },
            None => parent_px(),
        }
    }
}

impl ComputedStyleSource for InlineStyleCascade {
    fn computed_style(&self, tree: &Tree, node: NodeId, property: &str) -> Option<String> {
        match property {
            "font-family" => Some(
                Self::inherited(tree, node, property).unwrap_or_else(|| DEFAULT_FONT_FAMILY.into()),
            ),
            "font-size" => Some(css::format_px(Self::font_size_px(tree, node))),
            "text-align" => Some(Self::inherited(tree, node, property).unwrap_or_else(|| "start".into())),
            "line-height" => {
                let font_px = Self::font_size_px(tree, node);
                let px = match Self::inherited(tree, node, property)
                    .as_deref()
                    .and_then(css::parse_length)
                {
                    Some((n, unit)) if unit.is_empty() || unit == "em" => n * font_px,
                    Some((n, unit)) if unit == "px" => n,
                    Some((n, unit)) if unit == "%" => n * font_px / 100.0,
                    _ => DEFAULT_LINE_HEIGHT_RATIO * font_px,
                };
                Some(css::format_px(px))
            }
            "list-style-type" => {
                let list = tree.ancestors(node).find(|&n| tree.is_list(n));
                let explicit = tree
                    .ancestors(node)
                    .take_while(|&n| Some(n) != list.and_then(|l| tree.parent(l)))
                    .find_map(|n| tree.style(n, property));
                Some(explicit.unwrap_or_else(|| {
                    match list.and_then(|l| tree.tag(l)) {
                        Some(Tag::Ol) => "decimal".into(),
                        _ => "disc".into(),
                    }
                }))
            }
            _ => tree.style(node, property),
        }
    }
}

/// Derives toggle states from the tags and inline styles enclosing the
/// start of the selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeFormattingState;

impl TreeFormattingState {
    fn enclosing(tree: &Tree, range: &Range, matches: impl Fn(&Tree, NodeId) -> bool) -> bool {
        tree.ancestors(range.start.node)
            .take_while(|&n| !tree.is_editable(n))
            .any(|n| matches(tree, n))
    }

    fn style_contains(tree: &Tree, node: NodeId, property: &str, needle: &str) -> bool {
        tree.style(node, property)
            .is_some_and(|value| value.to_ascii_lowercase().contains(needle))
    }
}

impl FormattingStateProvider for TreeFormattingState {
    fn query_state(&self, tree: &Tree, range: &Range, command: FormatCommand) -> Option<bool> {
        let state = match command {
            FormatCommand::Bold => Self::enclosing(tree, range, |t, n| {
                matches!(t.tag(n), Some(Tag::B | Tag::Strong))
                    || t.style(n, "font-weight")
                        .is_some_and(|w| w == "bold" || w == "bolder" || w.parse::<u32>().is_ok_and(|w| w >= 600))
            }),
            FormatCommand::Italic => Self::enclosing(tree, range, |t, n| {
                matches!(t.tag(n), Some(Tag::I | Tag::Em))
                    || Self::style_contains(t, n, "font-style", "italic")
            }),
            FormatCommand::Underline => Self::enclosing(tree, range, |t, n| {
                t.has_tag(n, &Tag::U) || Self::style_contains(t, n, "text-decoration", "underline")
            }),
            FormatCommand::Strikethrough => Self::enclosing(tree, range, |t, n| {
                matches!(t.tag(n), Some(Tag::S | Tag::Strike))
                    || Self::style_contains(t, n, "text-decoration", "line-through")
            }),
            FormatCommand::Subscript => Self::enclosing(tree, range, |t, n| t.has_tag(n, &Tag::Sub)),
            FormatCommand::Superscript => Self::enclosing(tree, range, |t, n| t.has_tag(n, &Tag::Sup)),
            FormatCommand::FontName => return None,
        };
        Some(state)
    }

    fn query_value(&self, tree: &Tree, range: &Range, command: FormatCommand) -> Option<String> {
        match command {
            FormatCommand::FontName => tree
                .ancestors(range.start.node)
                .find_map(|n| tree.style(n, "font-family")),
            _ => None,
        }
    }
}

/// Style properties read from one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StyleInfo {
    pub font_family: String,
    pub font_size: u32,
    pub font_size_unit: String,
    pub text_align: String,
    pub list_style_type: String,
    pub line_height: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    None,
    Ordered,
    Unordered,
}

/// Effective style at the start of a range.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentStyle {
    pub info: StyleInfo,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub subscript: bool,
    pub superscript: bool,
    pub list_style: ListStyle,
    /// Enclosing link, if any
    pub anchor: Option<NodeId>,
    /// Start container and its ancestors below the root
    pub ancestors: Vec<NodeId>,
    pub range: Range,
}

impl CurrentStyle {
    /// JSON view for callers going through `invoke`.
    pub fn to_json(&self, tree: &Tree) -> serde_json::Value {
        let flag = |on: bool, name: &str| if on { name.to_string() } else { "normal".to_string() };
        let mut value = serde_json::to_value(&self.info).unwrap_or_default();
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("font-bold".into(), flag(self.bold, "bold").into());
            map.insert("font-italic".into(), flag(self.italic, "italic").into());
            map.insert("font-underline".into(), flag(self.underline, "underline").into());
            map.insert(
                "font-strikethrough".into(),
                flag(self.strikethrough, "strikethrough").into(),
            );
            map.insert("font-subscript".into(), flag(self.subscript, "subscript").into());
            map.insert(
                "font-superscript".into(),
                flag(self.superscript, "superscript").into(),
            );
            map.insert(
                "list-style".into(),
                serde_json::to_value(self.list_style).unwrap_or_default(),
            );
            let href = self
                .anchor
                .and_then(|a| tree.attr(a, "href"))
                .map(str::to_string);
            map.insert("anchor".into(), href.into());
        }
        value
    }
}

/// Options for [`Style::style_nodes`].
#[derive(Debug, Clone)]
pub struct StyleNodesOptions {
    pub node_name: Tag,
    /// Merge adjacent styling nodes of the same kind
    pub expand_closest_sibling: bool,
    /// Only merge siblings the range intersects
    pub only_partial_contains: bool,
}

impl Default for StyleNodesOptions {
    fn default() -> Self {
        Self {
            node_name: Tag::Span,
            expand_closest_sibling: false,
            only_partial_contains: false,
        }
    }
}

pub struct Style {
    computed: Box<dyn ComputedStyleSource>,
    formatting: Box<dyn FormattingStateProvider>,
}

impl Default for Style {
    fn default() -> Self {
        Self::new(Box::new(InlineStyleCascade), Box::new(TreeFormattingState))
    }
}

impl Style {
    pub fn new(
        computed: Box<dyn ComputedStyleSource>,
        formatting: Box<dyn FormattingStateProvider>,
    ) -> Self {
        Self {
            computed,
            formatting,
        }
    }

    pub fn formatting(&self) -> &dyn FormattingStateProvider {
        self.formatting.as_ref()
    }

    pub fn from_node(&self, tree: &Tree, node: NodeId) -> StyleInfo {
        let computed = |property: &str| {
            self.computed
                .computed_style(tree, node, property)
                .unwrap_or_default()
        };

        let font_size = tree
            .style(node, "font-size")
            .unwrap_or_else(|| computed("font-size"));
        let (size, unit) = css::parse_length(&font_size).unwrap_or((DEFAULT_FONT_SIZE_PX, String::new()));

        StyleInfo {
            font_family: computed("font-family"),
            font_size: size.max(0.0) as u32,
            font_size_unit: unit,
            text_align: computed("text-align"),
            list_style_type: computed("list-style-type"),
            line_height: computed("line-height"),
        }
    }

    /// Apply paragraph-level properties to every paragraph the range
    /// touches. An empty value removes the property.
    pub fn style_para(&self, tree: &mut Tree, range: &Range, properties: &[(&str, &str)]) {
        let paras: Vec<NodeId> = range
            .nodes(tree, Tree::is_para, NodesOptions::include_ancestor())
            .collect();
        for para in paras {
            for &(property, value) in properties {
                if value.is_empty() {
                    tree.remove_style(para, property);
                } else {
                    tree.set_style(para, property, value);
                }
            }
        }
    }

    /// Wrap the selected text in styling nodes and return them.
    ///
    /// A collapsed range gets one empty styling node at the cursor. Text
    /// already alone inside a styling node of the same kind reuses it.
    pub fn style_nodes(&self, tree: &mut Tree, range: &Range, opts: &StyleNodesOptions) -> Vec<NodeId> {
        let range = range.split_text(tree);
        let tag = opts.node_name.clone();

        if range.is_collapsed() {
            let node = tree.create_element(tag);
            return vec![range.insert_node(tree, node)];
        }

        let same_kind = |t: &Tree, n: NodeId| t.has_tag(n, &tag);
        let texts: Vec<NodeId> = range
            .nodes(tree, Tree::is_text, NodesOptions::fully_contains())
            .collect();
        let nodes: Vec<NodeId> = texts
            .into_iter()
            .map(|text| match tree.single_child_ancestor(text, same_kind) {
                Some(ancestor) => ancestor,
                None => tree.wrap(text, tag.clone()),
            })
            .collect();

        if !opts.expand_closest_sibling {
            return nodes;
        }

        let in_range: Option<HashSet<NodeId>> = opts
            .only_partial_contains
            .then(|| range.nodes(tree, |_, _| true, NodesOptions::default()).collect());
        let mergeable = |t: &Tree, n: NodeId| {
            same_kind(t, n) && in_range.as_ref().is_none_or(|set| set.contains(&n))
        };

        let mut merged = Vec::new();
        for node in nodes {
            if !tree.is_attached(node) {
                continue;
            }
            let siblings = tree.with_closest_siblings(node, mergeable);
            let head = siblings[0];
            for &tail in &siblings[1..] {
                let children = tree.children(tail).to_vec();
                tree.append_children(head, &children);
                tree.remove(tail);
            }
            if !merged.contains(&head) {
                merged.push(head);
            }
        }
        merged
    }

    /// Effective style at the start of `range`.
    pub fn current(&self, tree: &Tree, range: &Range) -> CurrentStyle {
        let container = if tree.is_element(range.start.node) {
            range.start.node
        } else {
            tree.parent(range.start.node).unwrap_or(tree.root())
        };
        let mut info = self.from_node(tree, container);

        let state = |command| {
            self.formatting
                .query_state(tree, range, command)
                .unwrap_or(false)
        };
        if let Some(family) = self.formatting.query_value(tree, range, FormatCommand::FontName) {
            info.font_family = family;
        }

        let list_style = if !range.is_on_list(tree) {
            ListStyle::None
        } else if UNORDERED_LIST_TYPES.contains(&info.list_style_type.as_str()) {
            ListStyle::Unordered
        } else {
            ListStyle::Ordered
        };

        let explicit_line_height = tree
            .ancestor(range.start.node, Tree::is_para)
            .and_then(|para| tree.style(para, "line-height"));
        info.line_height = match explicit_line_height {
            Some(value) => value,
            None => {
                let line_px = leading_integer(&info.line_height).unwrap_or(0.0);
                let font_px = if info.font_size > 0 {
                    f64::from(info.font_size)
                } else {
                    DEFAULT_FONT_SIZE_PX
                };
                format!("{:.1}", line_px / font_px)
            }
        };

        CurrentStyle {
            bold: state(FormatCommand::Bold),
            italic: state(FormatCommand::Italic),
            underline: state(FormatCommand::Underline),
            strikethrough: state(FormatCommand::Strikethrough),
            subscript: state(FormatCommand::Subscript),
            superscript: state(FormatCommand::Superscript),
            info,
            list_style,
            anchor: tree.ancestor(range.start.node, Tree::is_anchor),
            ancestors: tree.list_ancestor(range.start.node),
            range: *range,
        }
    }
}

/// Integer prefix of a CSS value (`"21.6px"` → `21`).
fn leading_integer(value: &str) -> Option<f64> {
    static INTEGER_REGEX: OnceLock<Regex> = OnceLock::new();
    let integer_regex =
        INTEGER_REGEX.get_or_init(|| Regex::new(r"^\s*(-?\d+)").expect("Invalid integer regex"));
    integer_regex
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Position;
    use crate::tests::find_text;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    // ============ styleNodes ============

    #[test]
    fn test_style_nodes_wraps_selected_span() {
        let mut tree = Tree::from_markup("<p>hello world</p>");
        let text = find_text(&tree, "hello world");
        let range = Range::new(Position::new(text, 6), Position::new(text, 11));
        let before = tree.text_content(tree.root());

        let nodes = Style::default().style_nodes(&mut tree, &range, &StyleNodesOptions::default());

        assert_eq!(nodes.len(), 1);
        assert_eq!(tree.text_content(nodes[0]), "world");
        assert_eq!(tree.text_content(tree.root()), before);
        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>hello <span>world</span></p>");
    }

    #[test]
    fn test_style_nodes_reuses_single_child_ancestor() {
        let mut tree = Tree::from_markup("<p>a<span>bc</span>d</p>");
        let text = find_text(&tree, "bc");
        let span = tree.parent(text).unwrap();
        let range = Range::new(Position::new(text, 0), Position::new(text, 2));

        let nodes = Style::default().style_nodes(&mut tree, &range, &StyleNodesOptions::default());

        assert_eq!(nodes, vec![span]);
        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>a<span>bc</span>d</p>");
    }

    #[test]
    fn test_style_nodes_collapsed_inserts_empty_node() {
        let mut tree = Tree::from_markup("<p>abcd</p>");
        let text = find_text(&tree, "abcd");
        let range = Range::collapsed(Position::new(text, 2));
        let opts = StyleNodesOptions {
            node_name: Tag::B,
            ..StyleNodesOptions::default()
        };

        let nodes = Style::default().style_nodes(&mut tree, &range, &opts);

        assert_eq!(nodes.len(), 1);
        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>ab<b></b>cd</p>");
    }

    #[test]
    fn test_style_nodes_expand_merges_siblings() {
        let mut tree = Tree::from_markup("<p><span>a</span>bc</p>");
        let bc = find_text(&tree, "bc");
        let range = Range::new(Position::new(bc, 0), Position::new(bc, 2));
        let opts = StyleNodesOptions {
            expand_closest_sibling: true,
            ..StyleNodesOptions::default()
        };

        let nodes = Style::default().style_nodes(&mut tree, &range, &opts);

        assert_eq!(nodes.len(), 1);
        assert_eq!(tree.text_content(nodes[0]), "abc");
        assert_snapshot!(tree.inner_markup(tree.root()), @"<p><span>abc</span></p>");
    }

    #[test]
    fn test_style_nodes_only_partial_contains_skips_outside_siblings() {
        let mut tree = Tree::from_markup("<p><span>a</span>bc</p>");
        let bc = find_text(&tree, "bc");
        let range = Range::new(Position::new(bc, 0), Position::new(bc, 2));
        let opts = StyleNodesOptions {
            expand_closest_sibling: true,
            only_partial_contains: true,
            ..StyleNodesOptions::default()
        };

        Style::default().style_nodes(&mut tree, &range, &opts);

        assert_snapshot!(tree.inner_markup(tree.root()), @"<p><span>a</span><span>bc</span></p>");
    }

    // ============ stylePara ============

    #[test]
    fn test_style_para_sets_and_removes() {
        let mut tree = Tree::from_markup(r#"<p style="text-align: left;">a</p><p>b</p>"#);
        let range = Range::select_all(&tree);
        let style = Style::default();

        style.style_para(&mut tree, &range, &[("text-align", "center")]);
        assert_snapshot!(
            tree.inner_markup(tree.root()),
            @r#"<p style="text-align: center;">a</p><p style="text-align: center;">b</p>"#
        );

        style.style_para(&mut tree, &range, &[("text-align", "")]);
        assert_snapshot!(tree.inner_markup(tree.root()), @"<p>a</p><p>b</p>");
    }

    // ============ current ============

    #[test]
    fn test_current_defaults() {
        let tree = Tree::from_markup("<p>plain</p>");
        let range = Range::collapsed(Position::new(find_text(&tree, "plain"), 1));

        let current = Style::default().current(&tree, &range);

        assert_eq!(current.info.font_family, "sans-serif");
        assert_eq!(current.info.font_size, 14);
        assert_eq!(current.info.font_size_unit, "px");
        assert_eq!(current.info.line_height, "1.5");
        assert_eq!(current.list_style, ListStyle::None);
        assert!(!current.bold);
        assert_eq!(current.anchor, None);
    }

    #[test]
    fn test_current_reads_toggles_and_lists() {
        let tree = Tree::from_markup(
            r#"<ol><li style="line-height: 2;"><b><a href="x">t</a></b></li></ol>"#,
        );
        let t = find_text(&tree, "t");
        let range = Range::collapsed(Position::new(t, 0));

        let current = Style::default().current(&tree, &range);

        assert!(current.bold);
        assert!(!current.italic);
        assert_eq!(current.list_style, ListStyle::Ordered);
        assert_eq!(current.info.list_style_type, "decimal");
        assert_eq!(current.info.line_height, "2");
        assert_eq!(current.anchor, tree.parent(t));
        assert_eq!(current.ancestors.len(), 5);
    }

    #[test]
    fn test_current_uses_em_font_size() {
        let tree = Tree::from_markup(
            r#"<p style="font-size: 20px;"><span style="font-size: 1.5em; font-family: Georgia;">t</span></p>"#,
        );
        let range = Range::collapsed(Position::new(find_text(&tree, "t"), 0));

        let current = Style::default().current(&tree, &range);

        assert_eq!(current.info.font_size, 1);
        assert_eq!(current.info.font_size_unit, "em");
        assert_eq!(current.info.font_family, "Georgia");
    }

    struct Unavailable;

    impl FormattingStateProvider for Unavailable {
        fn query_state(&self, _: &Tree, _: &Range, _: FormatCommand) -> Option<bool> {
            None
        }

        fn query_value(&self, _: &Tree, _: &Range, _: FormatCommand) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_current_with_unavailable_formatting_state() {
        let tree = Tree::from_markup("<p><b>bold</b></p>");
        let range = Range::collapsed(Position::new(find_text(&tree, "bold"), 1));
        let style = Style::new(Box::new(InlineStyleCascade), Box::new(Unavailable));

        let current = style.current(&tree, &range);

        assert!(!current.bold);
        assert_eq!(current.info.font_family, "sans-serif");
    }

    #[test]
    fn test_current_json_view() {
        let tree = Tree::from_markup("<p><i>t</i></p>");
        let range = Range::collapsed(Position::new(find_text(&tree, "t"), 0));

        let json = Style::default().current(&tree, &range).to_json(&tree);

        assert_eq!(json["font-italic"], "italic");
        assert_eq!(json["font-bold"], "normal");
        assert_eq!(json["list-style"], "none");
        assert_eq!(json["font-size"], 14);
    }
}

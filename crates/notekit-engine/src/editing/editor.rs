//! # Command Orchestrator
//!
//! [`Editor`] owns one editing session: the document, its history, the
//! style engine and the last known selection. Every mutating command runs
//! between [`Editor::before_command`] and [`Editor::after_command`]:
//!
//! ```text
//! before.command → operation → normalize → History::record_undo → change
//! ```
//!
//! That wrapper is the only place history is recorded during editing, apart
//! from the explicit `undo`/`redo`/`commit` commands and mouse-up.
//! Notifications are queued and taken by the owner with
//! [`Editor::take_events`].

use std::collections::HashMap;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use notekit_config::Config;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::context::codeview;
use crate::context::events::{Event, Key, KeyEvent};
use crate::dom::{NodeId, Position, Tag, Tree, css};
use crate::editing::bullet::{self, ListKind};
use crate::editing::commands::{Cmd, Float, ImageFile, LinkInfo};
use crate::editing::history::{History, Snapshot};
use crate::editing::style::{CurrentStyle, FormatCommand, Style, StyleNodesOptions};
use crate::editing::Document;
use crate::range::{self, NodesOptions, Range};

/// Content of an editor with nothing in it.
pub const EMPTY_PARA: &str = "<p><br></p>";

/// Placeholder keeping the cursor inside an empty styled span.
const ZERO_WIDTH_NBSP: char = '\u{FEFF}';
const NBSP: char = '\u{00A0}';

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{name}: file size {size} exceeds the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("{name}: `{mime}` is not an image type")]
    NotAnImage { name: String, mime: String },
}

/// What the host should do with a key after [`Editor::keydown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResponse {
    /// Let the key through
    Pass,
    /// A binding handled the key
    PreventDefault,
    /// The text length ceiling rejects the key
    Declined,
}

pub struct Editor {
    doc: Document,
    history: History,
    style: Style,
    config: Config,
    key_map: HashMap<String, String>,
    last_range: Option<Range>,
    /// Taken on keydown so `input` can roll back past the length ceiling
    keydown_snapshot: Option<Snapshot>,
    /// Span holding a zero-width placeholder after collapsed font styling
    bogus: Option<NodeId>,
    focused: bool,
    outbox: Vec<Event>,
}

impl Editor {
    pub fn new(doc: Document, config: Config) -> Self {
        Self {
            doc,
            history: History::new(config.history_limit),
            style: Style::default(),
            config,
            key_map: default_key_map(),
            last_range: None,
            keydown_snapshot: None,
            bogus: None,
            focused: false,
            outbox: Vec::new(),
        }
    }

    /// Replace the default style engine, e.g. to plug in host capabilities.
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn emit(&mut self, event: Event) {
        self.outbox.push(event);
    }

    /// Queued notifications, oldest first.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    // ============ Lifecycle ============

    /// Fill an empty document with an empty paragraph and start a fresh
    /// history from it.
    pub fn initialize(&mut self) {
        if self.doc.markup().trim().is_empty() {
            self.doc.set_markup(EMPTY_PARA);
        }
        self.history.commit(&self.doc);
        self.set_last_range(None);
    }

    pub fn destroy(&mut self) {
        self.last_range = None;
        self.keydown_snapshot = None;
        self.bogus = None;
        self.focused = false;
    }

    /// Replace the content without notifying.
    pub fn set_contents(&mut self, markup: &str) {
        self.doc.set_markup(markup);
        self.last_range = None;
        self.bogus = None;
    }

    // ============ Selection ============

    fn fresh_range(&self) -> Range {
        let tree = self.doc.tree();
        match self.doc.selection() {
            Some(range) if range.is_on_editable(tree) && tree.is_attached(range.end.node) => range,
            _ => Range::from_body_element(tree),
        }
    }

    /// Remember `range`, or the live selection when `None`.
    pub fn set_last_range(&mut self, range: Option<Range>) {
        self.last_range = Some(range.unwrap_or_else(|| self.fresh_range()));
    }

    pub fn last_range(&mut self) -> Range {
        let tree = self.doc.tree();
        match self
            .last_range
            .filter(|r| tree.is_attached(r.start.node) && tree.is_attached(r.end.node))
        {
            Some(range) => range,
            None => {
                let range = self.fresh_range();
                self.last_range = Some(range);
                range
            }
        }
    }

    /// Make `range` both the live selection and the last range.
    fn select(&mut self, range: Range) {
        self.doc.select(range);
        self.last_range = Some(range);
    }

    pub fn create_range(&mut self) -> Range {
        self.focus();
        self.set_last_range(None);
        self.last_range()
    }

    pub fn save_range(&mut self, then_collapse: bool) {
        if then_collapse {
            let range = self.last_range().collapse(true);
            self.select(range);
        }
    }

    pub fn restore_range(&mut self) {
        if let Some(range) = self.last_range {
            self.doc.select(range);
            self.focus();
        }
    }

    pub fn save_target(&mut self, node: NodeId) {
        self.doc.set_target(Some(node));
    }

    pub fn restore_target(&self) -> Option<NodeId> {
        self.doc.target()
    }

    pub fn clear_target(&mut self) {
        self.doc.set_target(None);
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    // ============ Command protocol ============

    pub fn before_command(&mut self) {
        let markup = self.doc.markup();
        self.emit(Event::BeforeCommand(markup));
        self.focus();
    }

    /// Merge text runs, record a snapshot and, unless `prevent_trigger`,
    /// notify the change.
    pub fn after_command(&mut self, prevent_trigger: bool) {
        match self.last_range.as_mut() {
            Some(range) => self.doc.normalize(&mut [&mut range.start, &mut range.end]),
            None => self.doc.normalize(&mut []),
        }
        self.doc.touch();
        self.history.record_undo(&self.doc);
        if !prevent_trigger {
            let markup = self.doc.markup();
            self.emit(Event::Change(markup));
        }
    }

    fn run(&mut self, prevent_trigger: bool, operation: impl FnOnce(&mut Self)) {
        self.before_command();
        operation(self);
        self.after_command(prevent_trigger);
    }

    /// Whether adding `pad` characters would pass `max_text_length`.
    /// Keys that cannot add text are never limited.
    pub fn is_limited(&self, pad: usize, event: Option<&KeyEvent>) -> bool {
        if let Some(event) = event
            && (event.key.is_move()
                || event.key.is_navigation()
                || event.ctrl
                || event.meta
                || event.key.is_remove())
        {
            return false;
        }
        let max = self.config.max_text_length;
        if max > 0 {
            let tree = self.doc.tree();
            let length = tree.text_content(tree.root()).chars().count();
            return length + pad > max;
        }
        false
    }

    /// Run a command. Returns `false` when it was declined before touching
    /// the document.
    pub fn execute(&mut self, cmd: Cmd) -> bool {
        debug!("execute {}", cmd.name());
        match cmd {
            Cmd::Bold => self.toggle_format(FormatCommand::Bold),
            Cmd::Italic => self.toggle_format(FormatCommand::Italic),
            Cmd::Underline => self.toggle_format(FormatCommand::Underline),
            Cmd::Strikethrough => self.toggle_format(FormatCommand::Strikethrough),
            Cmd::Superscript => self.toggle_format(FormatCommand::Superscript),
            Cmd::Subscript => self.toggle_format(FormatCommand::Subscript),
            Cmd::JustifyLeft => self.style_paras(true, "text-align", "left"),
            Cmd::JustifyCenter => self.style_paras(true, "text-align", "center"),
            Cmd::JustifyRight => self.style_paras(true, "text-align", "right"),
            Cmd::JustifyFull => self.style_paras(true, "text-align", "justify"),
            Cmd::LineHeight(value) => self.style_paras(false, "line-height", &value),
            Cmd::FormatBlock(tag) => self.format_block(tag),
            Cmd::FormatPara => self.format_block(Tag::P),
            Cmd::FormatH(level) => self.format_block(Tag::H(level)),
            Cmd::RemoveFormat => {
                self.run(true, Self::remove_format);
                true
            }
            Cmd::FontName(name) => {
                let name = valid_font_name(&name);
                self.run(false, |ed| ed.font_styling(&[("font-family", name.as_str())]));
                true
            }
            Cmd::FontSize(size) => {
                let unit = self.current_style().info.font_size_unit;
                let value = format!("{}{unit}", size.trim());
                self.run(false, |ed| ed.font_styling(&[("font-size", value.as_str())]));
                true
            }
            Cmd::FontSizeUnit(unit) => {
                let size = self.current_style().info.font_size;
                let value = format!("{size}{}", unit.trim());
                self.run(false, |ed| ed.font_styling(&[("font-size", value.as_str())]));
                true
            }
            Cmd::ForeColor(color) => {
                self.run(false, |ed| ed.font_styling(&[("color", color.as_str())]));
                true
            }
            Cmd::BackColor(color) => {
                self.run(true, |ed| ed.font_styling(&[("background-color", color.as_str())]));
                true
            }
            Cmd::Color { fore, back } => {
                let mut properties = Vec::new();
                if let Some(fore) = fore.as_deref() {
                    properties.push(("color", fore));
                }
                if let Some(back) = back.as_deref() {
                    properties.push(("background-color", back));
                }
                self.run(false, |ed| ed.font_styling(&properties));
                true
            }
            Cmd::InsertText(text) => self.insert_text(&text),
            Cmd::InsertNode(markup) => self.insert_markup(&markup, false),
            Cmd::PasteHtml(markup) => self.insert_markup(&markup, true),
            Cmd::InsertParagraph => {
                self.run(false, Self::insert_paragraph);
                true
            }
            Cmd::InsertHorizontalRule => {
                self.run(false, Self::insert_horizontal_rule);
                true
            }
            Cmd::InsertTable { cols, rows } => self.insert_table(cols, rows),
            Cmd::InsertOrderedList => self.list_command(bullet::insert_ordered_list),
            Cmd::InsertUnorderedList => self.list_command(bullet::insert_unordered_list),
            Cmd::Indent => self.list_command(bullet::indent),
            Cmd::Outdent => self.list_command(bullet::outdent),
            Cmd::CreateLink(info) => self.create_link(info),
            Cmd::Unlink => self.unlink(),
            Cmd::RemoveMedia => self.remove_media(),
            Cmd::FloatMe(side) => self.float_me(side),
            Cmd::Resize(ratio) => self.resize(ratio),
            Cmd::InsertImage { src, filename } => self.insert_image(&src, filename.as_deref()),
            Cmd::InsertImagesAsDataUrl(files) => self.insert_images_as_data_url(&files),
            Cmd::Undo => {
                self.undo();
                true
            }
            Cmd::Redo => {
                self.redo();
                true
            }
            Cmd::Commit => {
                self.commit();
                true
            }
            Cmd::Tab => self.tab(),
            Cmd::Untab => self.untab(),
            Cmd::Empty => {
                self.empty();
                true
            }
        }
    }

    /// Queries by name, then commands. `None` when nothing matches.
    pub fn invoke(&mut self, method: &str, args: &[Value]) -> Option<Value> {
        let value = match method {
            "currentStyle" => self.current_style().to_json(self.doc.tree()),
            "getSelectedText" => Value::String(self.get_selected_text()),
            "getLinkInfo" => serde_json::to_value(self.get_link_info()).ok()?,
            "isEmpty" => Value::Bool(self.is_empty()),
            "hasFocus" => Value::Bool(self.has_focus()),
            "focus" => {
                self.focus();
                Value::Null
            }
            "createRange" => {
                self.create_range();
                Value::Null
            }
            "saveRange" => {
                self.save_range(args.first().and_then(Value::as_bool).unwrap_or(false));
                Value::Null
            }
            "restoreRange" => {
                self.restore_range();
                Value::Null
            }
            "clearTarget" => {
                self.clear_target();
                Value::Null
            }
            _ => {
                let cmd = Cmd::from_invocation(method, args)?;
                Value::Bool(self.execute(cmd))
            }
        };
        Some(value)
    }

    // ============ History ============

    pub fn undo(&mut self) {
        self.emit(Event::BeforeCommand(self.doc.markup()));
        self.history.undo(&mut self.doc);
        self.last_range = self.doc.selection();
        self.emit(Event::Change(self.doc.markup()));
    }

    pub fn redo(&mut self) {
        self.emit(Event::BeforeCommand(self.doc.markup()));
        self.history.redo(&mut self.doc);
        self.last_range = self.doc.selection();
        self.emit(Event::Change(self.doc.markup()));
    }

    pub fn commit(&mut self) {
        self.emit(Event::BeforeCommand(self.doc.markup()));
        self.history.commit(&self.doc);
        self.emit(Event::Change(self.doc.markup()));
    }

    // ============ Queries ============

    pub fn current_style(&self) -> CurrentStyle {
        let tree = self.doc.tree();
        let range = self.doc.create_range().normalize(tree);
        self.style.current(tree, &range)
    }

    /// Selected text; a selection inside a link yields the whole link text.
    pub fn get_selected_text(&mut self) -> String {
        let mut range = self.last_range();
        let tree = self.doc.tree();
        if let Some(anchor) = tree.ancestor(range.start.node, Tree::is_anchor) {
            range = Range::from_node(tree, anchor);
        }
        range.text(tree)
    }

    pub fn get_link_info(&mut self) -> LinkInfo {
        if !self.has_focus() {
            self.focus();
        }
        let tree = self.doc.tree();
        let range = self
            .last_range
            .unwrap_or_else(|| self.fresh_range())
            .expand(tree, Tree::is_anchor);
        let anchor = range
            .nodes(tree, Tree::is_anchor, NodesOptions::default())
            .next();
        LinkInfo {
            url: anchor
                .and_then(|a| tree.attr(a, "href"))
                .unwrap_or_default()
                .to_string(),
            text: range.text(tree),
            new_window: anchor.is_some_and(|a| tree.attr(a, "target") == Some("_blank")),
            range: Some(range),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.doc.is_empty() || self.doc.markup() == EMPTY_PARA
    }

    /// Reset the content to a single empty paragraph.
    pub fn empty(&mut self) {
        self.set_contents(EMPTY_PARA);
        self.emit(Event::Change(self.doc.markup()));
    }

    // ============ Character formatting ============

    fn toggle_format(&mut self, command: FormatCommand) -> bool {
        self.run(true, |ed| {
            let range = ed.last_range();
            let tree = ed.doc.tree();
            let probe = range
                .nodes(tree, Tree::is_text, NodesOptions::default())
                .next()
                .map_or(range, |text| Range::collapsed(Position::new(text, 0)));
            let active = ed
                .style
                .formatting()
                .query_state(tree, &probe, command)
                .unwrap_or(false);
            if active {
                ed.clear_format(range, command);
            } else {
                ed.apply_format(range, command);
            }
        });
        true
    }

    fn apply_format(&mut self, range: Range, command: FormatCommand) {
        let css = if self.config.style_with_css {
            format_css(command)
        } else {
            None
        };
        let opts = StyleNodesOptions {
            node_name: if css.is_some() {
                Tag::Span
            } else {
                format_tag(command)
            },
            expand_closest_sibling: css.is_none(),
            only_partial_contains: false,
        };
        let nodes = self.style.style_nodes(&mut self.doc.tree, &range, &opts);
        if let Some((property, value)) = css {
            for &node in &nodes {
                self.doc.tree.set_style(node, property, value);
            }
        }
        self.select_styled(range.is_collapsed(), &nodes);
    }

    fn clear_format(&mut self, range: Range, command: FormatCommand) {
        let tree = &mut self.doc.tree;
        let nodes: Vec<NodeId> = range
            .nodes(
                tree,
                |t, n| is_format_node(t, n, command),
                NodesOptions::include_ancestor(),
            )
            .collect();
        let tag = format_tag(command);
        for node in nodes {
            if let Some((property, _)) = format_css(command)
                && !tree.has_tag(node, &tag)
                && tree.style(node, property).is_some()
            {
                tree.remove_style(node, property);
                if tree.has_tag(node, &Tag::Span) && tree.attrs(node).is_empty() {
                    tree.unwrap(node);
                }
            } else {
                tree.unwrap(node);
            }
        }
        self.select(range);
    }

    /// Unwrap inline formatting inside the selection, splitting formatting
    /// elements that straddle its edges.
    fn remove_format(&mut self) {
        let range = self.last_range();
        if range.is_collapsed() {
            return;
        }
        let tree = &mut self.doc.tree;
        let range = range.split_text(tree);

        for point in [range.end, range.start] {
            if let Some(outer) = tree.last_ancestor(point.node, is_formatting_element) {
                tree.split_tree(outer, point, true);
            }
        }
        let contained: Vec<NodeId> = range
            .nodes(tree, is_formatting_element, NodesOptions::fully_contains())
            .collect();
        for node in contained {
            tree.unwrap(node);
        }
        self.select(range);
    }

    fn font_styling(&mut self, properties: &[(&str, &str)]) {
        let range = self.last_range();
        let spans = self
            .style
            .style_nodes(&mut self.doc.tree, &range, &StyleNodesOptions::default());
        for &span in &spans {
            for &(property, value) in properties {
                self.doc.tree.set_style(span, property, value);
            }
        }
        self.select_styled(range.is_collapsed(), &spans);
    }

    /// Select freshly styled nodes. An empty node from a collapsed range
    /// gets a zero-width placeholder so the cursor can sit inside it.
    fn select_styled(&mut self, collapsed: bool, nodes: &[NodeId]) {
        if collapsed {
            if let Some(&first) = nodes.first()
                && self.doc.tree.node_length(first) == 0
            {
                let placeholder = self.doc.tree.create_text(ZERO_WIDTH_NBSP.to_string());
                self.doc.tree.append_child(first, placeholder);
                let range = Range::from_node(&self.doc.tree, placeholder);
                self.select(range);
                self.bogus = Some(first);
            }
        } else if let Some(range) = range_from_list(&self.doc.tree, nodes) {
            self.select(range);
        }
    }

    /// Drop the placeholder once real text has been typed next to it.
    fn clear_bogus(&mut self) {
        let Some(span) = self.bogus else {
            return;
        };
        let tree = &mut self.doc.tree;
        if !tree.is_attached(span) {
            self.bogus = None;
            return;
        }
        if tree.text_content(span).chars().count() <= 1 {
            return;
        }
        for text_node in tree.list_descendant(span, Tree::is_text) {
            let original = tree.text(text_node).unwrap_or_default().to_string();
            if !original.contains(ZERO_WIDTH_NBSP) {
                continue;
            }
            let shift = |pos: &mut Position| {
                if pos.node == text_node {
                    let removed = original
                        .chars()
                        .take(pos.offset)
                        .filter(|&c| c == ZERO_WIDTH_NBSP)
                        .count();
                    pos.offset -= removed;
                }
            };
            for range in [self.doc.selection.as_mut(), self.last_range.as_mut()]
                .into_iter()
                .flatten()
            {
                shift(&mut range.start);
                shift(&mut range.end);
            }
            tree.set_text(text_node, original.replace(ZERO_WIDTH_NBSP, ""));
        }
        self.bogus = None;
    }

    // ============ Paragraph formatting ============

    fn style_paras(&mut self, prevent_trigger: bool, property: &str, value: &str) -> bool {
        self.run(prevent_trigger, |ed| {
            let range = ed.last_range();
            ed.style
                .style_para(&mut ed.doc.tree, &range, &[(property, value)]);
        });
        true
    }

    fn format_block(&mut self, tag: Tag) -> bool {
        if !matches!(
            tag,
            Tag::P | Tag::Div | Tag::Pre | Tag::H(1..=6) | Tag::Blockquote
        ) {
            debug!("formatBlock declined for <{tag}>");
            return false;
        }
        self.run(false, |ed| {
            let range = ed.last_range();
            let tree = &mut ed.doc.tree;
            let range = range.wrap_body_inline_with_para(tree);
            let paras: Vec<NodeId> = range
                .nodes(tree, Tree::is_para, NodesOptions::include_ancestor())
                .collect();

            if tag == Tag::Blockquote {
                for cluster in bullet::cluster_by_parent(tree, &paras) {
                    let in_quote = tree
                        .parent(cluster[0])
                        .is_some_and(|p| tree.has_tag(p, &Tag::Blockquote));
                    if in_quote {
                        continue;
                    }
                    let quote = tree.wrap(cluster[0], Tag::Blockquote);
                    tree.append_children(quote, &cluster[1..]);
                }
            } else {
                for para in paras {
                    if !tree.is_li(para) {
                        tree.retag(para, tag.clone());
                        continue;
                    }
                    match tree.element_children(para).as_slice() {
                        [only] if tree.is_pure_para(*only) && tree.node_length(para) == 1 => {
                            tree.retag(*only, tag.clone());
                        }
                        _ => {
                            let block = tree.create_element(tag.clone());
                            let children = tree.children(para).to_vec();
                            tree.append_children(block, &children);
                            tree.append_child(para, block);
                        }
                    }
                }
            }
            ed.select(range);
        });
        true
    }

    fn list_command(&mut self, operation: fn(&mut Document)) -> bool {
        self.run(false, |ed| {
            let range = ed.last_range();
            ed.doc.select(range);
            operation(&mut ed.doc);
            ed.last_range = ed.doc.selection();
        });
        true
    }

    // ============ Insertion ============

    fn insert_text(&mut self, text: &str) -> bool {
        if self.is_limited(text.chars().count(), None) {
            debug!("insertText declined: max text length reached");
            return false;
        }
        self.run(false, |ed| {
            let range = ed.last_range();
            let node = ed.doc.tree.create_text(text);
            let node = range.insert_node(&mut ed.doc.tree, node);
            let end = ed.doc.tree.node_length(node);
            ed.select(Range::collapsed(Position::new(node, end)));
        });
        true
    }

    /// Insert parsed markup at the selection, purifying it first for pastes.
    fn insert_markup(&mut self, markup: &str, paste: bool) -> bool {
        let markup = if paste {
            if self.is_limited(markup.chars().count(), None) {
                debug!("pasteHTML declined: max text length reached");
                return false;
            }
            codeview::purify(markup.trim())
        } else {
            markup.to_string()
        };

        let nodes = self.doc.tree.parse_fragment(&markup);
        let length: usize = nodes
            .iter()
            .map(|&n| self.doc.tree.text_content(n).chars().count())
            .sum();
        if !paste && self.is_limited(length, None) {
            debug!("insertNode declined: max text length reached");
            return false;
        }
        let Some((&first, rest)) = nodes.split_first() else {
            return false;
        };

        self.run(false, |ed| {
            let range = ed.last_range();
            let tree = &mut ed.doc.tree;
            let mut last = range.insert_node(tree, first);
            for &node in rest {
                tree.insert_after(node, last);
                last = node;
            }
            let after = Range::from_node_after(tree, last);
            ed.select(after);
        });
        true
    }

    /// Split the paragraph at the cursor. An empty list item leaves its
    /// list instead.
    fn insert_paragraph(&mut self) {
        let range = self.last_range();
        let tree = &mut self.doc.tree;
        let range = range.delete_contents(tree).wrap_body_inline_with_para(tree);

        let next_para = match tree.ancestor(range.start.node, Tree::is_para) {
            Some(li) if tree.is_li(li) && tree.is_empty(li) => {
                let kind = match tree.parent(li).and_then(|l| tree.tag(l)) {
                    Some(Tag::Ol) => ListKind::Ordered,
                    _ => ListKind::Unordered,
                };
                self.doc.select(range);
                bullet::toggle_list(&mut self.doc, kind);
                self.last_range = self.doc.selection();
                return;
            }
            Some(para) => {
                let Some(next) = tree.split_tree(para, range.start, false) else {
                    return;
                };
                let empty_anchors: Vec<NodeId> = [para, next]
                    .iter()
                    .flat_map(|&p| {
                        tree.list_descendant(p, |t, n| t.is_anchor(n) && t.is_empty(n))
                    })
                    .collect();
                for anchor in empty_anchors {
                    tree.remove(anchor);
                }
                for half in [para, next] {
                    let has_br = !tree
                        .list_descendant(half, |t, n| t.has_tag(n, &Tag::Br))
                        .is_empty();
                    if tree.is_empty(half) && !has_br {
                        let br = tree.create_element(Tag::Br);
                        tree.append_child(half, br);
                    }
                }
                if matches!(tree.tag(next), Some(Tag::H(_) | Tag::Pre)) && tree.is_empty(next) {
                    tree.retag(next, Tag::P);
                }
                next
            }
            None => {
                let para = tree.create_element(Tag::P);
                let br = tree.create_element(Tag::Br);
                tree.append_child(para, br);
                if tree.is_text(range.start.node) {
                    tree.insert_after(para, range.start.node);
                } else {
                    tree.insert_child(range.start.node, range.start.offset, para);
                }
                para
            }
        };

        let cursor = Range::collapsed(Position::new(next_para, 0)).normalize(&self.doc.tree);
        self.select(cursor);
    }

    fn insert_horizontal_rule(&mut self) {
        let range = self.last_range();
        let tree = &mut self.doc.tree;
        let hr = tree.create_element(Tag::Hr);
        let hr = range.insert_node(tree, hr);
        if let Some(next) = tree.next_sibling(hr) {
            let cursor = Range::collapsed(Position::new(next, 0)).normalize(tree);
            self.select(cursor);
        }
    }

    fn insert_table(&mut self, cols: usize, rows: usize) -> bool {
        if cols == 0 || rows == 0 {
            debug!("insertTable declined: {cols}x{rows}");
            return false;
        }
        self.run(false, |ed| {
            let range = ed.last_range();
            let tree = &mut ed.doc.tree;
            let range = range.delete_contents(tree);
            let table = create_table(tree, cols, rows);
            let table = range.insert_node(tree, table);
            if let Some(&cell) = tree.list_descendant(table, Tree::is_cell).first() {
                ed.select(Range::collapsed(Position::new(cell, 0)));
            }
        });
        true
    }

    // ============ Links ============

    fn create_link(&mut self, info: LinkInfo) -> bool {
        let range = info.range.unwrap_or_else(|| self.last_range());
        let current_text = range.text(self.doc.tree());
        let extra = info.text.chars().count().saturating_sub(current_text.chars().count());
        if extra > 0 && self.is_limited(extra, None) {
            debug!("createLink declined: max text length reached");
            return false;
        }

        self.run(false, |ed| {
            let url = check_link_url(info.url.trim());
            let tree = &mut ed.doc.tree;

            let anchors = if current_text != info.text {
                let range = range.delete_contents(tree);
                let anchor = tree.create_element(Tag::A);
                let anchor = range.insert_node(tree, anchor);
                if !info.text.is_empty() {
                    let text = tree.create_text(info.text.as_str());
                    tree.append_child(anchor, text);
                }
                vec![anchor]
            } else {
                let opts = StyleNodesOptions {
                    node_name: Tag::A,
                    expand_closest_sibling: true,
                    only_partial_contains: true,
                };
                ed.style.style_nodes(tree, &range, &opts)
            };

            let mut rel = Vec::new();
            if info.new_window {
                if ed.config.link_add_no_referrer {
                    rel.push("noreferrer");
                }
                if ed.config.link_add_no_opener {
                    rel.push("noopener");
                }
            }
            for &anchor in &anchors {
                tree.set_attr(anchor, "href", url.as_str());
                if info.new_window {
                    tree.set_attr(anchor, "target", "_blank");
                    if !rel.is_empty() {
                        tree.set_attr(anchor, "rel", rel.join(" "));
                    }
                } else {
                    tree.remove_attr(anchor, "target");
                }
            }

            if let Some(range) = range_from_list(tree, &anchors) {
                ed.select(range);
            }
        });
        true
    }

    fn unlink(&mut self) -> bool {
        let range = self.last_range();
        let Some(anchor) = self.doc.tree().ancestor(range.start.node, Tree::is_anchor) else {
            return false;
        };
        let anchor_range = Range::from_node(self.doc.tree(), anchor);
        self.select(anchor_range);

        self.run(false, |ed| {
            let tree = &mut ed.doc.tree;
            let children = tree.children(anchor).to_vec();
            tree.unwrap(anchor);
            if let Some(range) = range_from_list(tree, &children) {
                ed.select(range);
            }
        });
        true
    }

    // ============ Media ============

    fn remove_media(&mut self) -> bool {
        let Some(target) = self.restore_target() else {
            debug!("removeMedia declined: no target");
            return false;
        };
        self.run(false, |ed| {
            let tree = &mut ed.doc.tree;
            let removed = tree
                .ancestor(target, |t, n| t.has_tag(n, &Tag::Figure))
                .unwrap_or(target);
            let markup = tree.outer_markup(removed);
            let point = range::before(tree, removed);
            tree.remove(removed);
            ed.doc.set_target(None);
            ed.select(Range::collapsed(point));
            ed.emit(Event::MediaDelete(markup));
        });
        true
    }

    fn float_me(&mut self, side: Float) -> bool {
        let Some(target) = self.restore_target() else {
            debug!("floatMe declined: no target");
            return false;
        };
        self.run(false, |ed| {
            let tree = &mut ed.doc.tree;
            toggle_class(tree, target, "note-float-left", side == Float::Left);
            toggle_class(tree, target, "note-float-right", side == Float::Right);
            match side {
                Float::Left => tree.set_style(target, "float", "left"),
                Float::Right => tree.set_style(target, "float", "right"),
                Float::None => tree.remove_style(target, "float"),
            }
        });
        true
    }

    /// Scale the target to a fraction of its container; 0 restores the
    /// natural width.
    fn resize(&mut self, ratio: f64) -> bool {
        let Some(target) = self.restore_target() else {
            debug!("resize declined: no target");
            return false;
        };
        self.run(false, |ed| {
            let tree = &mut ed.doc.tree;
            if ratio == 0.0 {
                tree.remove_style(target, "width");
            } else {
                tree.set_style(target, "width", format!("{}%", css::format_number(ratio * 100.0)));
                tree.remove_style(target, "height");
            }
        });
        true
    }

    pub fn insert_image(&mut self, src: &str, filename: Option<&str>) -> bool {
        if src.trim().is_empty() {
            self.emit(Event::ImageUploadError("image source is empty".to_string()));
            return false;
        }
        self.run(false, |ed| {
            let range = ed.last_range();
            let tree = &mut ed.doc.tree;
            let image = tree.create_element(Tag::Img);
            tree.set_attr(image, "src", src);
            if let Some(filename) = filename {
                tree.set_attr(image, "data-filename", filename);
            }
            tree.set_style(image, "display", "block");
            let image = range.insert_node(tree, image);
            let after = Range::from_node_after(tree, image);
            ed.select(after);
        });
        true
    }

    /// Embed each file as a data URL. A rejected file fires
    /// `image.upload.error` and the rest are still inserted.
    pub fn insert_images_as_data_url(&mut self, files: &[ImageFile]) -> bool {
        let mut inserted = false;
        for file in files {
            match read_file_as_data_url(file, self.config.maximum_image_file_size) {
                Ok(url) => inserted |= self.insert_image(&url, Some(file.name.as_str())),
                Err(err) => {
                    debug!("image rejected: {err}");
                    self.emit(Event::ImageUploadError(err.to_string()));
                }
            }
        }
        inserted
    }

    // ============ Tab ============

    fn tab(&mut self) -> bool {
        let range = self.last_range();
        if range.is_collapsed() && range.is_on_cell(self.doc.tree()) {
            self.move_to_cell(range, false);
            return true;
        }
        let tab_size = self.config.tab_size;
        if tab_size == 0 {
            return false;
        }
        if self.is_limited(tab_size, None) {
            debug!("tab declined: max text length reached");
            return true;
        }
        self.run(false, |ed| {
            let tree = &mut ed.doc.tree;
            let spaces = tree.create_text(NBSP.to_string().repeat(tab_size));
            let spaces = range.insert_node(tree, spaces);
            let end = tree.node_length(spaces);
            ed.select(Range::collapsed(Position::new(spaces, end)));
        });
        true
    }

    fn untab(&mut self) -> bool {
        let range = self.last_range();
        if range.is_collapsed() && range.is_on_cell(self.doc.tree()) {
            self.move_to_cell(range, true);
            return true;
        }
        self.config.tab_size != 0
    }

    fn move_to_cell(&mut self, range: Range, backwards: bool) {
        let tree = self.doc.tree();
        let Some(cell) = tree.ancestor(range.common_ancestor(tree), Tree::is_cell) else {
            return;
        };
        let Some(table) = tree.ancestor(cell, |t, n| t.has_tag(n, &Tag::Table)) else {
            return;
        };
        let cells = tree.list_descendant(table, Tree::is_cell);
        let Some(index) = cells.iter().position(|&c| c == cell) else {
            return;
        };
        let target = if backwards {
            index.checked_sub(1).and_then(|i| cells.get(i))
        } else {
            cells.get(index + 1)
        };
        if let Some(&target) = target {
            self.select(Range::collapsed(Position::new(target, 0)));
        }
    }

    // ============ Keyboard and pointer ============

    pub fn keydown(&mut self, event: &KeyEvent) -> KeyResponse {
        if event.key == Key::Enter {
            self.emit(Event::Enter);
        }
        self.emit(Event::KeyDown(event.clone()));

        self.keydown_snapshot = Some(History::make_snapshot(&self.doc));
        let mut prevented = event.default_prevented;
        let mut has_shortcut = false;
        if !prevented {
            if self.config.shortcuts {
                has_shortcut = self.handle_key_map(event);
                prevented = has_shortcut;
            } else {
                prevented = prevents_editable_shortcut(event);
            }
        }

        if self.is_limited(1, Some(event)) && self.last_range().is_collapsed() {
            debug!("key declined: max text length reached");
            return KeyResponse::Declined;
        }
        self.set_last_range(None);

        if self.config.record_every_keystroke && !has_shortcut {
            self.history.record_undo(&self.doc);
        }

        if prevented {
            KeyResponse::PreventDefault
        } else {
            KeyResponse::Pass
        }
    }

    /// Run the binding for `event`. Returns whether a shortcut handled it.
    fn handle_key_map(&mut self, event: &KeyEvent) -> bool {
        let mut keys = Vec::new();
        if event.meta {
            keys.push("CMD".to_string());
        }
        if event.ctrl && !event.alt {
            keys.push("CTRL".to_string());
        }
        if event.shift {
            keys.push("SHIFT".to_string());
        }
        if let Some(name) = event.key.name() {
            keys.push(name);
        }
        let binding = self.key_map.get(&keys.join("+")).cloned();

        if event.key == Key::Tab && self.config.tab_disable {
            self.after_command(false);
        } else if let Some(binding) = binding {
            match Cmd::from_invocation(&binding, &[]) {
                Some(cmd) => return self.execute(cmd),
                None => debug!("key binding `{binding}` has no command"),
            }
        } else if event.key.is_edit() {
            if event.key.is_remove() {
                self.removed();
            }
            self.after_command(false);
        }
        false
    }

    /// Clean up after a deletion inside a table cell: a paragraph left with
    /// only a line break goes away, a cell keeps no stray line break.
    fn removed(&mut self) {
        let range = self.doc.create_range();
        let tree = &mut self.doc.tree;
        if !(range.is_collapsed() && range.is_on_cell(tree)) {
            return;
        }
        let node = range.end.node;
        let only_br = tree.node_length(node) == 1
            && tree
                .children(node)
                .first()
                .is_some_and(|&c| tree.has_tag(c, &Tag::Br));
        if !only_br {
            return;
        }
        if tree.has_tag(node, &Tag::P) {
            tree.remove(node);
        } else if tree.is_cell(node)
            && let Some(&first) = tree.children(node).first()
        {
            tree.remove(first);
        }
    }

    pub fn keyup(&mut self, event: &KeyEvent) {
        self.set_last_range(None);
        self.emit(Event::KeyUp(event.clone()));
    }

    /// Content changed outside a command (typing). Rolls back to the keydown
    /// snapshot when the text ceiling was passed.
    pub fn input(&mut self) {
        if self.is_limited(0, None)
            && let Some(snapshot) = self.keydown_snapshot.clone()
        {
            History::apply_snapshot(&mut self.doc, &snapshot);
            self.last_range = self.doc.selection();
            self.bogus = None;
        }
        self.clear_bogus();
        self.emit(Event::Change(self.doc.markup()));
    }

    pub fn focus_event(&mut self) {
        self.set_last_range(None);
        self.focused = true;
        self.emit(Event::Focus);
    }

    pub fn blur(&mut self) {
        self.focused = false;
        self.emit(Event::Blur);
    }

    pub fn mousedown(&mut self) {
        self.emit(Event::MouseDown);
    }

    pub fn mouseup(&mut self) {
        self.set_last_range(None);
        self.history.record_undo(&self.doc);
        self.emit(Event::MouseUp);
    }

    pub fn scroll(&mut self) {
        self.emit(Event::Scroll);
    }

    pub fn paste(&mut self) {
        self.set_last_range(None);
        self.emit(Event::Paste);
    }

    pub fn copy(&mut self) {
        self.emit(Event::Copy);
    }
}

// ============ Helpers ============

/// Built-in bindings. `CMD` chords mirror the `CTRL` ones.
fn default_key_map() -> HashMap<String, String> {
    let bindings = [
        ("ENTER", "insertParagraph"),
        ("CTRL+Z", "undo"),
        ("CTRL+Y", "redo"),
        ("CTRL+SHIFT+Z", "redo"),
        ("TAB", "tab"),
        ("SHIFT+TAB", "untab"),
        ("CTRL+B", "bold"),
        ("CTRL+I", "italic"),
        ("CTRL+U", "underline"),
        ("CTRL+SHIFT+S", "strikethrough"),
        ("CTRL+BACKSLASH", "removeFormat"),
        ("CTRL+SHIFT+L", "justifyLeft"),
        ("CTRL+SHIFT+E", "justifyCenter"),
        ("CTRL+SHIFT+R", "justifyRight"),
        ("CTRL+SHIFT+J", "justifyFull"),
        ("CTRL+SHIFT+NUM7", "insertUnorderedList"),
        ("CTRL+SHIFT+NUM8", "insertOrderedList"),
        ("CTRL+LEFTBRACKET", "outdent"),
        ("CTRL+RIGHTBRACKET", "indent"),
        ("CTRL+NUM0", "formatPara"),
        ("CTRL+NUM1", "formatH1"),
        ("CTRL+NUM2", "formatH2"),
        ("CTRL+NUM3", "formatH3"),
        ("CTRL+NUM4", "formatH4"),
        ("CTRL+NUM5", "formatH5"),
        ("CTRL+NUM6", "formatH6"),
        ("CTRL+ENTER", "insertHorizontalRule"),
    ];
    let mut map = HashMap::new();
    for (chord, method) in bindings {
        if let Some(rest) = chord.strip_prefix("CTRL+") {
            map.insert(format!("CMD+{rest}"), method.to_string());
        }
        map.insert(chord.to_string(), method.to_string());
    }
    map
}

/// Ctrl/Cmd + B, I or U.
fn prevents_editable_shortcut(event: &KeyEvent) -> bool {
    (event.ctrl || event.meta)
        && matches!(event.key, Key::Char(c) if matches!(c.to_ascii_uppercase(), 'B' | 'I' | 'U'))
}

fn format_tag(command: FormatCommand) -> Tag {
    match command {
        FormatCommand::Bold => Tag::B,
        FormatCommand::Italic => Tag::I,
        FormatCommand::Underline => Tag::U,
        FormatCommand::Strikethrough => Tag::Strike,
        FormatCommand::Subscript => Tag::Sub,
        FormatCommand::Superscript => Tag::Sup,
        FormatCommand::FontName => Tag::Span,
    }
}

fn format_css(command: FormatCommand) -> Option<(&'static str, &'static str)> {
    match command {
        FormatCommand::Bold => Some(("font-weight", "bold")),
        FormatCommand::Italic => Some(("font-style", "italic")),
        FormatCommand::Underline => Some(("text-decoration", "underline")),
        FormatCommand::Strikethrough => Some(("text-decoration", "line-through")),
        _ => None,
    }
}

fn is_format_node(tree: &Tree, node: NodeId, command: FormatCommand) -> bool {
    let tagged = match command {
        FormatCommand::Bold => matches!(tree.tag(node), Some(Tag::B | Tag::Strong)),
        FormatCommand::Italic => matches!(tree.tag(node), Some(Tag::I | Tag::Em)),
        FormatCommand::Underline => tree.has_tag(node, &Tag::U),
        FormatCommand::Strikethrough => matches!(tree.tag(node), Some(Tag::S | Tag::Strike)),
        FormatCommand::Subscript => tree.has_tag(node, &Tag::Sub),
        FormatCommand::Superscript => tree.has_tag(node, &Tag::Sup),
        FormatCommand::FontName => false,
    };
    tagged
        || format_css(command).is_some_and(|(property, value)| {
            tree.style(node, property)
                .is_some_and(|v| v.to_ascii_lowercase().contains(value))
        })
}

fn is_formatting_element(tree: &Tree, node: NodeId) -> bool {
    matches!(
        tree.tag(node),
        Some(
            Tag::B
                | Tag::Strong
                | Tag::I
                | Tag::Em
                | Tag::U
                | Tag::S
                | Tag::Strike
                | Tag::Sub
                | Tag::Sup
                | Tag::Font
                | Tag::Span
        )
    )
}

/// Range from before the first node to after the last.
fn range_from_list(tree: &Tree, nodes: &[NodeId]) -> Option<Range> {
    let (&first, &last) = (nodes.first()?, nodes.last()?);
    Some(Range::new(
        Range::from_node_before(tree, first).start,
        Range::from_node_after(tree, last).end,
    ))
}

/// Quote font names containing whitespace.
fn valid_font_name(name: &str) -> String {
    let name = name.trim();
    if name.contains(char::is_whitespace) && !name.starts_with(['\'', '"']) {
        format!("'{name}'")
    } else {
        name.to_string()
    }
}

/// Give a bare link target a scheme: e-mail addresses become `mailto://`,
/// phone numbers `tel://`, anything else without a scheme `http://`.
pub fn check_link_url(url: &str) -> String {
    static MAILTO_REGEX: OnceLock<Regex> = OnceLock::new();
    static TEL_REGEX: OnceLock<Regex> = OnceLock::new();
    static SCHEME_REGEX: OnceLock<Regex> = OnceLock::new();

    let mailto_regex = MAILTO_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Invalid mailto regex")
    });
    let tel_regex = TEL_REGEX.get_or_init(|| {
        Regex::new(r"^(\+?\d{1,3}[\s-]?)?(\d{1,4})[\s-]?(\d{1,4})[\s-]?(\d{1,4})$")
            .expect("Invalid tel regex")
    });
    let scheme_regex = SCHEME_REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*:|#|/)").expect("Invalid scheme regex")
    });

    if mailto_regex.is_match(url) {
        format!("mailto://{url}")
    } else if tel_regex.is_match(url) {
        format!("tel://{url}")
    } else if !scheme_regex.is_match(url) {
        format!("http://{url}")
    } else {
        url.to_string()
    }
}

pub fn read_file_as_data_url(file: &ImageFile, limit: Option<u64>) -> Result<String, ImageError> {
    let size = file.bytes.len() as u64;
    if let Some(limit) = limit
        && size > limit
    {
        return Err(ImageError::TooLarge {
            name: file.name.clone(),
            size,
            limit,
        });
    }
    if !file.mime.starts_with("image/") {
        return Err(ImageError::NotAnImage {
            name: file.name.clone(),
            mime: file.mime.clone(),
        });
    }
    Ok(format!("data:{};base64,{}", file.mime, STANDARD.encode(&file.bytes)))
}

fn create_table(tree: &mut Tree, cols: usize, rows: usize) -> NodeId {
    let table = tree.create_element(Tag::Table);
    tree.set_attr(table, "class", "table table-bordered");
    let body = tree.create_element(Tag::Tbody);
    tree.append_child(table, body);
    for _ in 0..rows {
        let row = tree.create_element(Tag::Tr);
        for _ in 0..cols {
            let cell = tree.create_element(Tag::Td);
            let br = tree.create_element(Tag::Br);
            tree.append_child(cell, br);
            tree.append_child(row, cell);
        }
        tree.append_child(body, row);
    }
    table
}

fn toggle_class(tree: &mut Tree, node: NodeId, class: &str, on: bool) {
    let mut classes: Vec<String> = tree
        .attr(node, "class")
        .unwrap_or_default()
        .split_whitespace()
        .filter(|c| *c != class)
        .map(str::to_string)
        .collect();
    if on {
        classes.push(class.to_string());
    }
    if classes.is_empty() {
        tree.remove_attr(node, "class");
    } else {
        tree.set_attr(node, "class", classes.join(" "));
    }
}

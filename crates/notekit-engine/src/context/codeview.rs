//! Source view of the document.
//!
//! While active, the markup is edited as text in [`CodeView::source`] and
//! written back through [`purify`] on deactivation.

use log::debug;
use serde_json::Value;

use super::Module;
use super::events::Event;
use crate::dom::{NodeId, Tree};
use crate::editing::Editor;

const BLOCKED_ELEMENTS: [&str; 5] = ["script", "style", "iframe", "object", "embed"];

/// Strip executable content: script-like elements and `on*` handler
/// attributes.
pub fn purify(markup: &str) -> String {
    let mut tree = Tree::from_markup(markup);
    let root = tree.root();

    let blocked: Vec<NodeId> = tree.list_descendant(root, |t, n| {
        t.tag(n)
            .is_some_and(|tag| BLOCKED_ELEMENTS.contains(&tag.name()))
    });
    for node in blocked {
        if tree.is_attached(node) {
            tree.remove(node);
        }
    }

    for element in tree.list_descendant(root, Tree::is_element) {
        let handlers: Vec<String> = tree
            .attrs(element)
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| name.to_ascii_lowercase().starts_with("on"))
            .collect();
        for name in handlers {
            tree.remove_attr(element, &name);
        }
    }

    tree.inner_markup(root)
}

#[derive(Debug, Default)]
pub struct CodeView {
    activated: bool,
    source: String,
}

impl CodeView {
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn activate(&mut self, editor: &mut Editor) {
        self.source = editor.document().markup();
        self.activated = true;
    }

    /// Write the source back into the document, notifying only when it
    /// differs from what the document holds.
    pub fn deactivate(&mut self, editor: &mut Editor) {
        if !self.activated {
            return;
        }
        let value = purify(&self.source);
        let changed = editor.document().markup() != value;
        editor.set_contents(&value);
        self.activated = false;
        if changed {
            editor.emit(Event::Change(editor.document().markup()));
        }
    }

    pub fn toggle(&mut self, editor: &mut Editor) {
        if self.activated {
            self.deactivate(editor);
        } else {
            self.activate(editor);
        }
    }

    pub fn sync(&mut self, source: Option<&str>) {
        if self.activated
            && let Some(source) = source
        {
            self.source = source.to_string();
        }
    }
}

impl Module for CodeView {
    fn destroy(&mut self, editor: &mut Editor) {
        self.deactivate(editor);
    }

    fn invoke(&mut self, editor: &mut Editor, method: &str, args: &[Value]) -> Option<Value> {
        match method {
            "activate" => self.activate(editor),
            "deactivate" => self.deactivate(editor),
            "toggle" => self.toggle(editor),
            "sync" => self.sync(args.first().and_then(Value::as_str)),
            "isActivated" => return Some(Value::Bool(self.activated)),
            "source" => return Some(Value::String(self.source.clone())),
            "purify" => return Some(Value::String(purify(args.first()?.as_str()?))),
            _ => {
                debug!("codeview has no method `{method}`");
                return None;
            }
        }
        Some(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::Document;
    use insta::assert_snapshot;
    use notekit_config::Config;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_purify_strips_scripts_and_handlers() {
        let markup = r#"<p onclick="x()" class="a">hi<script>alert(1)</script></p><iframe src="e"></iframe>"#;

        assert_snapshot!(purify(markup), @r#"<p class="a">hi</p>"#);
    }

    #[test]
    fn test_deactivate_writes_purified_source() {
        let mut editor = Editor::new(Document::from_markup("<p>a</p>"), Config::default());
        let mut view = CodeView::default();

        view.activate(&mut editor);
        assert_eq!(view.source(), "<p>a</p>");
        view.sync(Some(r#"<p onload="x()">b</p>"#));
        view.deactivate(&mut editor);

        assert!(!view.is_activated());
        assert_snapshot!(editor.document().markup(), @"<p>b</p>");
        assert_eq!(editor.take_events(), vec![Event::Change("<p>b</p>".into())]);
    }

    #[test]
    fn test_deactivate_without_change_is_silent() {
        let mut editor = Editor::new(Document::from_markup("<p>a</p>"), Config::default());
        let mut view = CodeView::default();

        view.toggle(&mut editor);
        view.toggle(&mut editor);

        assert!(editor.take_events().is_empty());
    }

    #[test]
    fn test_sync_ignored_when_inactive() {
        let mut view = CodeView::default();

        view.sync(Some("<p>x</p>"));

        assert_eq!(view.source(), "");
        assert!(!view.is_activated());
    }
}

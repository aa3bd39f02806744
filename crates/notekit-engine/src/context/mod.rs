/*!
# Context

The [`Context`] hosts one editor instance: a registry of named
[`Module`]s, the shared [`Config`], an event [`Emitter`] and the
enabled/disabled state.

## Invocation

Calls are addressed as `"module.method"` or just `"method"`:

```text
"code"              → context method
"codeview.toggle"   → module "codeview", method "toggle"
"bold"              → module "editor", method "bold"
```

Bare names are looked up on the context first (`code`, `enable`,
`disable`, `reset`, `isDisabled`, `empty`) and then on the editor module.
Unknown targets resolve to `None`.

After every call the editor's queued events are handed to the emitter.
*/

pub mod codeview;
pub mod events;

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use notekit_config::Config;
use serde_json::Value;
use uuid::Uuid;

use crate::editing::Document;
use crate::editing::editor::{EMPTY_PARA, Editor};
use codeview::CodeView;
use events::{Emitter, Event, EventKind};

/// A pluggable unit of editor behaviour.
pub trait Module {
    /// Modules can opt out based on configuration.
    fn should_initialize(&self, _config: &Config) -> bool {
        true
    }

    fn initialize(&mut self, _editor: &mut Editor) {}

    fn destroy(&mut self, _editor: &mut Editor) {}

    /// Run `method`; `None` when the module has no such method.
    fn invoke(&mut self, editor: &mut Editor, method: &str, args: &[Value]) -> Option<Value>;
}

/// Exposes [`Editor`] under the name `editor`.
#[derive(Debug, Default)]
pub struct EditorModule;

impl Module for EditorModule {
    fn initialize(&mut self, editor: &mut Editor) {
        editor.initialize();
    }

    fn destroy(&mut self, editor: &mut Editor) {
        editor.destroy();
    }

    fn invoke(&mut self, editor: &mut Editor, method: &str, args: &[Value]) -> Option<Value> {
        editor.invoke(method, args)
    }
}

/// Target of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub module: Option<String>,
    pub method: String,
}

impl Address {
    /// `"a.b"` addresses method `b` of module `a`; with more dots the first
    /// segment is the module and the last the method.
    pub fn parse(address: &str) -> Self {
        match address.split_once('.') {
            Some((module, rest)) => Self {
                module: Some(module.to_string()),
                method: rest.rsplit('.').next().unwrap_or(rest).to_string(),
            },
            None => Self {
                module: None,
                method: address.to_string(),
            },
        }
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.starts_with('.') || s.ends_with('.') {
            return Err(format!("invalid address `{s}`"));
        }
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{module}.{}", self.method),
            None => f.write_str(&self.method),
        }
    }
}

pub struct Context {
    id: Uuid,
    editor: Editor,
    modules: Vec<(String, Box<dyn Module>)>,
    emitter: Emitter,
    disabled: bool,
    initialized: bool,
}

impl Context {
    /// A context with the `editor` and `codeview` modules registered.
    pub fn new(doc: Document, config: Config) -> Self {
        let mut context = Self {
            id: Uuid::new_v4(),
            editor: Editor::new(doc, config),
            modules: Vec::new(),
            emitter: Emitter::new(),
            disabled: false,
            initialized: false,
        };
        context.register("editor", Box::new(EditorModule));
        context.register("codeview", Box::new(CodeView::default()));
        context
    }

    pub fn from_markup(markup: &str, config: Config) -> Self {
        Self::new(Document::from_markup(markup), config)
    }

    /// Unique id of this editor instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter {
        &mut self.emitter
    }

    /// Subscribe to one kind of event.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) {
        self.emitter.on(kind, handler);
    }

    /// Add or replace a module. Once the context is initialized, the
    /// module is initialized right away.
    pub fn register(&mut self, name: &str, mut module: Box<dyn Module>) {
        if self.initialized && module.should_initialize(self.editor.config()) {
            module.initialize(&mut self.editor);
            self.flush();
        }
        match self.modules.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = module,
            None => self.modules.push((name.to_string(), module)),
        }
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|(n, _)| n == name)
    }

    pub fn initialize(&mut self) {
        self.initialize_modules();
        info!("editor {} initialized", self.id);
        self.emitter.emit(&Event::Init);
    }

    fn initialize_modules(&mut self) {
        let config = self.editor.config().clone();
        for (name, module) in &mut self.modules {
            if module.should_initialize(&config) {
                debug!("initialize module {name}");
                module.initialize(&mut self.editor);
            }
        }
        self.initialized = true;
        self.flush();
    }

    fn destroy_modules(&mut self) {
        let config = self.editor.config().clone();
        for (name, module) in self.modules.iter_mut().rev() {
            if module.should_initialize(&config) {
                debug!("destroy module {name}");
                module.destroy(&mut self.editor);
            }
        }
        self.initialized = false;
        self.flush();
    }

    /// Tear down every module in reverse registration order.
    pub fn destroy(&mut self) {
        self.destroy_modules();
        self.modules.clear();
        self.emitter.emit(&Event::Destroy);
    }

    /// Empty the content and reinitialize all modules, keeping the
    /// disabled state.
    pub fn reset(&mut self) {
        let disabled = self.disabled;
        self.set_code(EMPTY_PARA);
        self.destroy_modules();
        self.emitter.emit(&Event::Destroy);
        self.initialize_modules();
        if disabled {
            self.disable();
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn enable(&mut self) {
        self.disabled = false;
        self.emitter.emit(&Event::Disable(false));
    }

    /// Leaves source view first so pending source edits are not lost.
    pub fn disable(&mut self) {
        if self.is_activated() {
            self.invoke_module("codeview", "deactivate", &[]);
        }
        self.disabled = true;
        self.flush();
        self.emitter.emit(&Event::Disable(true));
    }

    fn is_activated(&mut self) -> bool {
        self.invoke_module("codeview", "isActivated", &[]) == Some(Value::Bool(true))
    }

    /// Current markup, from the source view while it is active.
    pub fn code(&mut self) -> String {
        if self.is_activated()
            && let Some(Value::String(source)) = self.invoke_module("codeview", "source", &[])
        {
            return source;
        }
        self.editor.document().markup()
    }

    pub fn set_code(&mut self, markup: &str) {
        if self.is_activated() {
            self.invoke_module("codeview", "sync", &[Value::String(markup.to_string())]);
        } else {
            self.editor.set_contents(markup);
        }
        self.emitter.emit(&Event::Change(markup.to_string()));
    }

    /// Run an addressed method and dispatch the events it produced.
    pub fn invoke(&mut self, address: &str, args: &[Value]) -> Option<Value> {
        let address = Address::parse(address);
        let result = match (address.module.as_deref(), address.method.as_str()) {
            (None, "code") => match args.first().and_then(Value::as_str) {
                Some(markup) => {
                    self.set_code(markup);
                    Some(Value::Null)
                }
                None => Some(Value::String(self.code())),
            },
            (None, "enable") => {
                self.enable();
                Some(Value::Null)
            }
            (None, "disable") => {
                self.disable();
                Some(Value::Null)
            }
            (None, "reset") => {
                self.reset();
                Some(Value::Null)
            }
            (None, "isDisabled") => Some(Value::Bool(self.disabled)),
            (None, "empty") => {
                self.set_code(EMPTY_PARA);
                Some(Value::Null)
            }
            (module, method) => self.invoke_module(module.unwrap_or("editor"), method, args),
        };
        self.flush();
        if result.is_none() {
            debug!("nothing handles `{address}`");
        }
        result
    }

    fn invoke_module(&mut self, name: &str, method: &str, args: &[Value]) -> Option<Value> {
        let (_, module) = self.modules.iter_mut().find(|(n, _)| n == name)?;
        if !module.should_initialize(self.editor.config()) {
            return None;
        }
        module.invoke(&mut self.editor, method, args)
    }

    /// Direct access to the editor; queued events are dispatched after.
    pub fn with_editor<R>(&mut self, f: impl FnOnce(&mut Editor) -> R) -> R {
        let result = f(&mut self.editor);
        self.flush();
        result
    }

    fn flush(&mut self) {
        for event in self.editor.take_events() {
            self.emitter.emit(&event);
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field(
                "modules",
                &self.modules.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .field("disabled", &self.disabled)
            .finish()
    }
}

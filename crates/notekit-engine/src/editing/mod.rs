/*!
 * # Editing Core
 *
 * Everything that changes a [`Document`] lives here.
 *
 * ## Architecture Overview
 *
 * ### 1. Single Source of Truth: the Document Tree
 * - The content is one arena [`Tree`](crate::dom::Tree) owned by a `Document`
 * - The live selection and the media target are stored next to it
 * - Markup is produced from the tree on demand, never kept in parallel
 *
 * ### 2. Command-Based Editing
 * - Every edit is a **Command** (`Cmd` enum) run by the [`Editor`]
 * - Commands are wrapped in a before/after protocol that normalizes text
 *   runs, records history and queues change notifications
 *
 * ### 3. Snapshot History
 * - [`History`] keeps whole-content snapshots with a bookmarked selection
 * - Undo and redo move a cursor through the stack; new edits drop the redo tail
 *
 * ## Module Structure
 *
 * - **`document`**: `Document` with its tree, selection and target
 * - **`history`**: bounded undo/redo stack of `Snapshot`s
 * - **`bullet`**: list toggling, indent and outdent
 * - **`style`**: inline styling, paragraph styling and current-style queries
 * - **`commands`**: `Cmd` enum and invocation parsing
 * - **`editor`**: the command orchestrator
 *
 * ## Usage Pattern
 *
 * ```rust
 * use notekit_config::Config;
 * use notekit_engine::editing::*;
 * use notekit_engine::range::Range;
 *
 * let mut doc = Document::from_markup("<p>hello</p>");
 * doc.select(Range::select_all(doc.tree()));
 *
 * let mut editor = Editor::new(doc, Config::default());
 * editor.initialize();
 * editor.execute(Cmd::Bold);
 * editor.execute(Cmd::Undo);
 *
 * assert_eq!(editor.document().markup(), "<p>hello</p>");
 * ```
 */

pub mod bullet;
pub mod commands;
pub mod document;
pub mod editor;
pub mod history;
pub mod style;

pub use commands::{Cmd, Float, ImageFile, LinkInfo};
pub use document::{Document, DocumentError};
pub use editor::{EMPTY_PARA, Editor, ImageError, KeyResponse};
pub use history::{History, Snapshot};
pub use style::{CurrentStyle, Style, StyleInfo, StyleNodesOptions};

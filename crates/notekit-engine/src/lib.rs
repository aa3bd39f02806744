pub mod context;
pub mod dom;
pub mod editing;
pub mod range;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use context::events::{Event, EventKind, Key, KeyEvent};
pub use context::{Address, Context, Module};
pub use editing::{bullet::ListKind, commands::*, document::*, editor::*, history::*, style::*};
pub use range::Range;

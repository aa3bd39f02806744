//! # notekit-markup
//!
//! Reads the native serialization of a notekit document: a small, forgiving
//! HTML-like markup of elements, attributes and text.
//!
//! ## Pipeline
//!
//! ```text
//! Source Text → Lexer → Tokens → Parser → Events → (engine) Tree
//!               (Logos)
//! ```
//!
//! The lexer ([`lexer`]) never loses a byte; the parser ([`parser`]) repairs
//! mismatched tags so the events it emits are always balanced. Building the
//! actual node tree is left to the consumer, which only needs a stack.
//!
//! ```
//! use notekit_markup::{Event, parse};
//!
//! let events = parse("<p>Hello <b>world</b></p>");
//! assert_eq!(events.len(), 6);
//! assert!(matches!(&events[0], Event::Start { name, .. } if name == "p"));
//! ```

pub mod lexer;
pub mod parser;

pub use parser::{Event, is_void_element, parse};

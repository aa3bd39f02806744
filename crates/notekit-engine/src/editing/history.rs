//! Undo/redo stack of whole-content snapshots.
//!
//! `stack_offset` is `None` only while the stack is empty; otherwise it is
//! always a valid index, and the stack never holds more than `limit`
//! snapshots.

use log::trace;

use crate::editing::Document;
use crate::range::{Bookmark, Range};

/// Content and selection captured at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub contents: Option<String>,
    pub bookmark: Option<Bookmark>,
}

#[derive(Debug, Clone)]
pub struct History {
    stack: Vec<Snapshot>,
    stack_offset: Option<usize>,
    limit: usize,
}

impl History {
    /// A limit below one is raised to one.
    pub fn new(limit: usize) -> Self {
        Self {
            stack: Vec::new(),
            stack_offset: None,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn stack_offset(&self) -> Option<usize> {
        self.stack_offset
    }

    pub fn can_undo(&self) -> bool {
        self.stack_offset.is_some_and(|offset| offset > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.stack_offset
            .is_some_and(|offset| offset + 1 < self.stack.len())
    }

    pub fn snapshot_at(&self, index: usize) -> Option<&Snapshot> {
        self.stack.get(index)
    }

    fn current(&self) -> Option<&Snapshot> {
        self.stack_offset.and_then(|offset| self.stack.get(offset))
    }

    /// Capture the document; without a live selection the bookmark is the
    /// all-zero default.
    pub fn make_snapshot(doc: &Document) -> Snapshot {
        let bookmark = doc
            .selection()
            .map(|range| range.bookmark(doc.tree()))
            .unwrap_or_default();
        Snapshot {
            contents: Some(doc.markup()),
            bookmark: Some(bookmark),
        }
    }

    /// Restore content (unless absent) then the selection (unless absent).
    pub fn apply_snapshot(doc: &mut Document, snapshot: &Snapshot) {
        if let Some(contents) = &snapshot.contents {
            doc.set_markup(contents);
        }
        if let Some(bookmark) = &snapshot.bookmark {
            let range = Range::from_bookmark(doc.tree(), bookmark);
            doc.select(range);
        }
    }

    /// Whether the live content moved away from the current snapshot
    /// without being recorded.
    fn has_drifted(&self, doc: &Document) -> bool {
        match self.current() {
            Some(snapshot) => snapshot.contents.as_deref() != Some(doc.markup().as_str()),
            None => true,
        }
    }

    /// Push a snapshot after the cursor, dropping any redo tail and evicting
    /// the oldest snapshot past the limit.
    pub fn record_undo(&mut self, doc: &Document) {
        let offset = self.stack_offset.map_or(0, |offset| offset + 1);
        self.stack.truncate(offset);
        self.stack.push(Self::make_snapshot(doc));

        if self.stack.len() > self.limit {
            self.stack.remove(0);
            self.stack_offset = Some(offset - 1);
        } else {
            self.stack_offset = Some(offset);
        }
        trace!(
            "history recorded: offset {:?} of {}",
            self.stack_offset,
            self.stack.len()
        );
    }

    pub fn undo(&mut self, doc: &mut Document) {
        if self.has_drifted(doc) {
            self.record_undo(doc);
        }
        if let Some(offset) = self.stack_offset
            && offset > 0
        {
            self.stack_offset = Some(offset - 1);
            trace!("history undo to {}", offset - 1);
            let snapshot = self.stack[offset - 1].clone();
            Self::apply_snapshot(doc, &snapshot);
        }
    }

    pub fn redo(&mut self, doc: &mut Document) {
        if let Some(offset) = self.stack_offset
            && offset + 1 < self.stack.len()
        {
            self.stack_offset = Some(offset + 1);
            trace!("history redo to {}", offset + 1);
            let snapshot = self.stack[offset + 1].clone();
            Self::apply_snapshot(doc, &snapshot);
        }
    }

    /// Return to the oldest recorded state, keeping the stack.
    pub fn rewind(&mut self, doc: &mut Document) {
        if self.has_drifted(doc) {
            self.record_undo(doc);
        }
        self.stack_offset = Some(0);
        let snapshot = self.stack[0].clone();
        Self::apply_snapshot(doc, &snapshot);
    }

    /// Drop all history and record the live content as the new baseline.
    pub fn commit(&mut self, doc: &Document) {
        self.stack.clear();
        self.stack_offset = None;
        self.record_undo(doc);
    }

    /// Clear the live content and the history, then record the empty
    /// baseline.
    pub fn reset(&mut self, doc: &mut Document) {
        self.stack.clear();
        self.stack_offset = None;
        doc.set_markup("");
        self.record_undo(doc);
    }
}

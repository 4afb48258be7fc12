#![forbid(unsafe_code)]

//! Revision history for accepted style documents.
//!
//! [`RevisionHistory`] keeps every accepted document as an `Arc` snapshot.
//! [`StyleDocument`] stores its layers and sources in persistent
//! collections, so a thousand revisions of a large style share almost all
//! of their memory.
//!
//! # Architecture
//!
//! ```text
//! append(r3)
//! ┌──────────────────────────────────────────┐
//! │ Past:    [r0, r1, r2, r3]   cursor = 3   │
//! │ Future:  []                              │
//! └──────────────────────────────────────────┘
//!
//! undo() x2
//! ┌──────────────────────────────────────────┐
//! │ Past:    [r0, r1]           cursor = 1   │
//! │ Future:  [r3, r2]                        │
//! └──────────────────────────────────────────┘
//!
//! append(r4): the future is discarded
//! ┌──────────────────────────────────────────┐
//! │ Past:    [r0, r1, r4]       cursor = 2   │
//! │ Future:  []                              │
//! └──────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use maputnik_core::StyleDocument;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A recorded document.
pub type Revision = Arc<StyleDocument>;

/// Configuration for the revision history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of revisions kept behind the cursor, current included.
    /// The oldest revisions are evicted first. `None` keeps everything.
    pub max_depth: Option<usize>,
}

impl HistoryConfig {
    #[must_use]
    pub fn bounded(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth.max(1)),
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// Linear undo/redo over accepted documents.
///
/// # Invariants
///
/// 1. `past` holds the current revision at its back once anything was appended.
/// 2. `future` is cleared on every `append`.
/// 3. `past.len() <= max_depth` after every operation.
pub struct RevisionHistory {
    past: VecDeque<Revision>,
    /// Most recently undone at the back.
    future: Vec<Revision>,
    config: HistoryConfig,
}

impl fmt::Debug for RevisionHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionHistory")
            .field("past", &self.past.len())
            .field("future", &self.future.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for RevisionHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl RevisionHistory {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            config,
        }
    }

    /// Record a new revision, discarding anything that could have been redone.
    pub fn append(&mut self, document: StyleDocument) {
        self.append_arc(Arc::new(document));
    }

    pub fn append_arc(&mut self, revision: Revision) {
        if !self.future.is_empty() {
            debug!(discarded = self.future.len(), "dropping redo history");
            self.future.clear();
        }
        self.past.push_back(revision);
        self.enforce_depth();
    }

    /// Step back one revision. `None` at the first revision or when empty.
    pub fn undo(&mut self) -> Option<Revision> {
        if self.past.len() < 2 {
            return None;
        }
        let current = self.past.pop_back()?;
        self.future.push(current);
        self.past.back().cloned()
    }

    /// Step forward one revision. `None` when nothing was undone.
    pub fn redo(&mut self) -> Option<Revision> {
        let revision = self.future.pop()?;
        self.past.push_back(revision);
        self.past.back().cloned()
    }

    /// Replace the whole history; the cursor lands on the last document.
    pub fn reset(&mut self, documents: impl IntoIterator<Item = StyleDocument>) {
        self.past = documents.into_iter().map(Arc::new).collect();
        self.future.clear();
        self.enforce_depth();
    }

    #[must_use]
    pub fn current(&self) -> Option<&Revision> {
        self.past.back()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.past.len() >= 2
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Index of the current revision, `None` when empty.
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.past.len().checked_sub(1)
    }

    /// Total number of revisions on both sides of the cursor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.past.len() + self.future.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.past.is_empty() && self.future.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    fn enforce_depth(&mut self) {
        let Some(max_depth) = self.config.max_depth else {
            return;
        };
        while self.past.len() > max_depth {
            self.past.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maputnik_core::empty_style;

    fn named(name: &str) -> StyleDocument {
        let mut style = empty_style();
        style.name = Some(name.to_string());
        style
    }

    fn name(revision: &Revision) -> &str {
        revision.name.as_deref().unwrap_or_default()
    }

    #[test]
    fn new_history_is_empty() {
        let mut history = RevisionHistory::default();
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_then_redo() {
        let mut history = RevisionHistory::default();
        history.append(named("a"));
        history.append(named("b"));
        assert_eq!(name(&history.undo().unwrap()), "a");
        assert!(history.undo().is_none());
        assert_eq!(name(&history.redo().unwrap()), "b");
        assert!(history.redo().is_none());
    }

    #[test]
    fn append_after_undo_discards_future() {
        let mut history = RevisionHistory::default();
        history.append(named("a"));
        history.append(named("b"));
        history.undo();
        history.append(named("c"));
        assert!(history.redo().is_none());
        assert_eq!(name(history.current().unwrap()), "c");
        assert_eq!(name(&history.undo().unwrap()), "a");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn reset_positions_cursor_at_end() {
        let mut history = RevisionHistory::default();
        history.append(named("old"));
        history.reset([named("x"), named("y"), named("z")]);
        assert_eq!(history.cursor(), Some(2));
        assert!(!history.can_redo());
        assert_eq!(name(&history.undo().unwrap()), "y");
    }

    #[test]
    fn depth_limit_evicts_oldest() {
        let mut history = RevisionHistory::new(HistoryConfig::bounded(2));
        for n in ["a", "b", "c"] {
            history.append(named(n));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(name(&history.undo().unwrap()), "b");
        assert!(history.undo().is_none());
    }
}

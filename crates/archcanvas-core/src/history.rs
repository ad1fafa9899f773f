//! Linear undo/redo over whole diagram revisions.
//!
//! ```text
//! begin(d0)        [d0]             cursor 0  clean
//! push(d1), (d2)   [d0, d1, d2]     cursor 2  dirty
//! undo             [d0, d1, d2]     cursor 1  dirty
//! push(d3)         [d0, d1, d3]     cursor 2  dirty   (redo tail dropped)
//! undo x2          [d0, d1, d3]     cursor 0  clean
//! ```
//!
//! Entry 0 is the baseline captured when edit mode was entered; undo never goes past it.
//! Clean means "at the saved entry". A save moves that mark; a push that drops the saved
//! entry from the redo tail makes it unreachable, so every later position is dirty.

use crate::Diagram;

#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<Diagram>,
    cursor: usize,
    saved: Option<usize>,
}

impl HistoryManager {
    /// Seed the stack with the diagram as loaded.
    pub fn begin(baseline: Diagram) -> Self {
        Self {
            entries: vec![baseline],
            cursor: 0,
            saved: Some(0),
        }
    }

    /// Record a committed revision, dropping anything that could have been redone.
    pub fn push(&mut self, revision: Diagram) {
        if self.saved.is_some_and(|saved| saved > self.cursor) {
            self.saved = None;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(revision);
        self.cursor += 1;
        tracing::debug!(cursor = self.cursor, len = self.entries.len(), "history push");
    }

    pub fn undo(&mut self) -> Option<&Diagram> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        tracing::debug!(cursor = self.cursor, "undo");
        Some(&self.entries[self.cursor])
    }

    pub fn redo(&mut self) -> Option<&Diagram> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        tracing::debug!(cursor = self.cursor, "redo");
        Some(&self.entries[self.cursor])
    }

    pub fn current(&self) -> &Diagram {
        &self.entries[self.cursor]
    }

    /// The snapshot edit mode started from.
    pub fn pristine(&self) -> &Diagram {
        &self.entries[0]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.saved != Some(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A successful save makes the current revision the clean state.
    pub fn mark_saved(&mut self) {
        self.saved = Some(self.cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(title: &str) -> Diagram {
        Diagram::new(title)
    }

    #[test]
    fn baseline_is_clean() {
        let h = HistoryManager::begin(rev("d0"));
        assert!(!h.is_dirty());
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.current().title, "d0");
    }

    #[test]
    fn undo_to_baseline_clears_dirty() {
        let mut h = HistoryManager::begin(rev("d0"));
        h.push(rev("d1"));
        h.push(rev("d2"));
        assert!(h.is_dirty());
        assert_eq!(h.undo().map(|d| d.title.clone()), Some("d1".to_string()));
        assert!(h.is_dirty());
        assert_eq!(h.undo().map(|d| d.title.clone()), Some("d0".to_string()));
        assert!(!h.is_dirty());
        assert!(h.undo().is_none());
    }

    #[test]
    fn redo_walks_forward_and_dirties() {
        let mut h = HistoryManager::begin(rev("d0"));
        h.push(rev("d1"));
        h.undo();
        assert!(h.can_redo());
        assert_eq!(h.redo().map(|d| d.title.clone()), Some("d1".to_string()));
        assert!(h.is_dirty());
        assert!(h.redo().is_none());
    }

    #[test]
    fn push_after_undo_drops_the_redo_tail() {
        let mut h = HistoryManager::begin(rev("d0"));
        h.push(rev("d1"));
        h.push(rev("d2"));
        h.undo();
        h.push(rev("d3"));
        assert_eq!(h.len(), 3);
        assert!(!h.can_redo());
        assert_eq!(h.current().title, "d3");
        assert_eq!(h.pristine().title, "d0");
    }

    #[test]
    fn save_point_moves_with_mark_saved() {
        let mut h = HistoryManager::begin(rev("d0"));
        h.push(rev("d1"));
        h.mark_saved();
        assert!(!h.is_dirty());
        assert_eq!(h.cursor(), 1);
        h.undo();
        assert!(h.is_dirty(), "the baseline differs from what was saved");
        h.redo();
        assert!(!h.is_dirty());
    }

    #[test]
    fn dropping_the_saved_entry_leaves_no_clean_position() {
        let mut h = HistoryManager::begin(rev("d0"));
        h.push(rev("d1"));
        h.push(rev("d2"));
        h.mark_saved();
        h.undo();
        h.push(rev("d3"));
        assert!(h.is_dirty());
        h.undo();
        assert!(h.is_dirty());
        h.undo();
        assert!(h.is_dirty());
    }
}

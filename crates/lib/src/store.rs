//! Committed transcript snapshots for one open conversation view.
//!
//! The store owns the authoritative order. Readers only ever hold committed,
//! fully merged snapshots; the scheduler replaces the snapshot wholesale in
//! one atomic step per flush and nothing mutates a published snapshot.

use crate::message::Message;
use std::sync::Arc;

/// The externally observed ordered message sequence for the active
/// conversation. Created empty when a conversation view opens, discarded when
/// it closes.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    committed: Arc<Vec<Message>>,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self {
            committed: Arc::new(Vec::new()),
        }
    }

    /// Current committed snapshot. Cheap to clone and safe to hold across
    /// later commits; it never changes underneath the reader.
    pub fn snapshot(&self) -> Arc<Vec<Message>> {
        Arc::clone(&self.committed)
    }

    /// Atomic wholesale replacement; the single commit point for a flush.
    pub(crate) fn replace(&mut self, next: Arc<Vec<Message>>) {
        self.committed = next;
    }

    /// Replace wholesale from persisted history when a conversation view
    /// opens. No incremental merge against the existing snapshot.
    pub fn hydrate(&mut self, messages: Vec<Message>) {
        self.committed = Arc::new(messages);
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_stable_across_commits() {
        let mut store = TranscriptStore::new();
        let before = store.snapshot();
        store.replace(Arc::new(vec![Message::text("a", "hi")]));
        assert!(before.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn hydrate_replaces_wholesale() {
        let mut store = TranscriptStore::new();
        store.replace(Arc::new(vec![Message::text("a", "stale")]));
        store.hydrate(vec![Message::text("b", "one"), Message::text("c", "two")]);
        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].msg_id, "b");
    }
}

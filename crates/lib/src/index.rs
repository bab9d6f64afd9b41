//! Message index: O(1) update targeting over a transcript snapshot.
//!
//! Three mappings, each key -> position in the sequence: by `msg_id`, by
//! `tool_call` callId, and by codex/acp toolCallId (one shared map, populated
//! from either variant; the compose step re-checks the entry's kind so the two
//! namespaces never cross-merge). An index is valid only for the exact snapshot
//! it was built from; [`IndexCache`] enforces that by keying on instance
//! identity rather than content.

use crate::message::{Message, MessageKind};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Position lookups for one transcript snapshot.
#[derive(Debug, Default)]
pub struct MessageIndex {
    msg_id: HashMap<String, usize>,
    call_id: HashMap<String, usize>,
    tool_call_id: HashMap<String, usize>,
}

impl MessageIndex {
    /// Single scan over the sequence, populating all three mappings.
    pub fn build(list: &[Message]) -> Self {
        let mut index = Self::default();
        for (i, msg) in list.iter().enumerate() {
            index.note_appended(msg, i);
        }
        index
    }

    /// Record a just-appended entry so later updates in the same flush target
    /// it instead of duplicating it.
    pub fn note_appended(&mut self, msg: &Message, position: usize) {
        if !msg.msg_id.is_empty() {
            self.msg_id.insert(msg.msg_id.clone(), position);
        }
        if let Some(key) = msg.merge_key() {
            match msg.kind {
                MessageKind::ToolCall => {
                    self.call_id.insert(key.to_string(), position);
                }
                MessageKind::CodexToolCall | MessageKind::AcpToolCall => {
                    self.tool_call_id.insert(key.to_string(), position);
                }
                _ => {}
            }
        }
    }

    /// Position of the live entry for a merge key, looked up in the mapping
    /// that matches the variant. Non-keyed kinds always return `None`.
    pub fn lookup(&self, kind: MessageKind, key: &str) -> Option<usize> {
        match kind {
            MessageKind::ToolCall => self.call_id.get(key).copied(),
            MessageKind::CodexToolCall | MessageKind::AcpToolCall => {
                self.tool_call_id.get(key).copied()
            }
            _ => None,
        }
    }

    /// Position of the entry with this `msg_id`, if indexed.
    pub fn position_of(&self, msg_id: &str) -> Option<usize> {
        self.msg_id.get(msg_id).copied()
    }
}

/// Identity-keyed index cache: one index per live transcript snapshot.
///
/// The key is the snapshot's allocation address and the entry holds a [`Weak`]
/// handle, so the cache never keeps a replaced snapshot's contents alive. The
/// weak handle pins the allocation's control block, so a live entry found at an
/// address is necessarily the same snapshot; once the snapshot is dropped the
/// entry reads as dead and is swept on the next miss. A content-equal but
/// distinct snapshot instance always gets a fresh build.
pub struct IndexCache {
    entries: HashMap<usize, CacheEntry>,
    builds: u64,
}

struct CacheEntry {
    seq: Weak<Vec<Message>>,
    index: MessageIndex,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            builds: 0,
        }
    }

    /// Return the index for this snapshot, building it on first sight.
    pub fn get_or_build(&mut self, seq: &Arc<Vec<Message>>) -> &mut MessageIndex {
        let key = Arc::as_ptr(seq) as usize;
        let live = self
            .entries
            .get(&key)
            .map(|e| e.seq.strong_count() > 0)
            .unwrap_or(false);
        if !live {
            self.entries.retain(|_, e| e.seq.strong_count() > 0);
            self.builds += 1;
            log::debug!("index cache miss, building for {} entries", seq.len());
            self.entries.insert(
                key,
                CacheEntry {
                    seq: Arc::downgrade(seq),
                    index: MessageIndex::build(seq),
                },
            );
        }
        match self.entries.get_mut(&key) {
            Some(entry) => &mut entry.index,
            None => unreachable!("entry inserted above"),
        }
    }

    /// Number of index builds performed so far (instrumentation for tests).
    pub fn builds(&self) -> u64 {
        self.builds
    }
}

//! Tool-group compose: merge a grouped tool-call container by inner identity.
//!
//! A `tool_group` entry carries an ordered array of grouped tool items, so it
//! cannot be matched through a single top-level key the way the keyed variants
//! are. The container is matched by `msg_id` over the full sequence and the
//! incoming items are merged into the existing array by their `callId`.

use crate::compose::shallow_merge;
use crate::index::MessageIndex;
use crate::message::{Message, MessageKind};
use serde_json::Value;

/// Merge a `tool_group` update into `list`. Updates that match no existing
/// container append as a new entry (and are indexed, so same-flush followups
/// find them by `msg_id`).
pub fn compose_tool_group(message: Message, list: &mut Vec<Message>, index: &mut MessageIndex) {
    let found = list
        .iter()
        .position(|m| m.kind == MessageKind::ToolGroup && m.msg_id == message.msg_id);
    match found {
        Some(p) => {
            let merged = merge_group_items(&list[p].content, &message.content);
            list[p].content = merged;
        }
        None => {
            index.note_appended(&message, list.len());
            list.push(message);
        }
    }
}

/// Item-by-item merge of two grouped arrays: incoming items land on the
/// existing item with the same `callId` (shallow merge, incoming wins) or are
/// appended in arrival order. Existing item order is preserved.
fn merge_group_items(old: &Value, incoming: &Value) -> Value {
    let (Value::Array(old_items), Value::Array(new_items)) = (old, incoming) else {
        return incoming.clone();
    };
    let mut out = old_items.clone();
    for item in new_items {
        let key = item.get("callId").and_then(Value::as_str);
        let slot = key.and_then(|k| {
            out.iter()
                .position(|o| o.get("callId").and_then(Value::as_str) == Some(k))
        });
        match slot {
            Some(i) => {
                let merged = shallow_merge(&out[i], item);
                out[i] = merged;
            }
            None => out.push(item.clone()),
        }
    }
    Value::Array(out)
}

//! Compose/merge engine: apply one update event to a working transcript.
//!
//! Operates on the working copy the scheduler clones from the committed
//! snapshot at flush start; published snapshots are never touched. Keyed
//! variants merge by id through the index, everything else merges into the
//! last entry only when `msg_id` and kind both match (consecutive-run merge).

use crate::group;
use crate::index::MessageIndex;
use crate::message::{Message, MessageKind};
use serde_json::Value;

/// Apply `message` to `list`, keeping `index` in step for any append so a
/// later update in the same flush finds it.
pub fn compose_into(message: Message, list: &mut Vec<Message>, index: &mut MessageIndex) {
    if list.is_empty() {
        index.note_appended(&message, 0);
        list.push(message);
        return;
    }

    // Groups match by identity inside their nested item array, not by a single
    // top-level key, so they have their own routine.
    if message.kind == MessageKind::ToolGroup {
        group::compose_tool_group(message, list, index);
        return;
    }

    if let Some(key) = message.merge_key().map(str::to_string) {
        if let Some(p) = index.lookup(message.kind, &key) {
            // The kind re-check keeps codex and acp ids from cross-merging when
            // the literal strings collide.
            if p < list.len() && list[p].kind == message.kind {
                let merged = shallow_merge(&list[p].content, &message.content);
                list[p].content = merged;
                return;
            }
        }
        let pos = list.len();
        index.note_appended(&message, pos);
        list.push(message);
        return;
    }

    // Plain messages, permission prompts, and keyed updates missing their id
    // all land here: compare against the last entry only.
    let last_pos = list.len() - 1;
    let matches_last = {
        let last = &list[last_pos];
        last.msg_id == message.msg_id && last.kind == message.kind
    };
    if !matches_last {
        index.note_appended(&message, list.len());
        list.push(message);
        return;
    }

    let mut message = message;
    if message.kind == MessageKind::Text {
        // Streamed delta: existing text first, incoming appended.
        let combined = format!(
            "{}{}",
            text_of(&list[last_pos].content),
            text_of(&message.content)
        );
        if let Value::Object(map) = &mut message.content {
            map.insert("content".to_string(), Value::String(combined));
        }
    }
    overlay(&mut list[last_pos], message);
}

/// Key-by-key copy: `old` fields first, `incoming` overwrites on collision,
/// fields only present in `old` are retained. Produces a new object; neither
/// operand is mutated. Non-object operands: incoming wins wholesale.
pub fn shallow_merge(old: &Value, incoming: &Value) -> Value {
    match (old, incoming) {
        (Value::Object(a), Value::Object(b)) => {
            let mut out = a.clone();
            for (k, v) in b {
                out.insert(k.clone(), v.clone());
            }
            Value::Object(out)
        }
        _ => incoming.clone(),
    }
}

fn text_of(content: &Value) -> &str {
    content.get("content").and_then(Value::as_str).unwrap_or("")
}

/// Record-level overlay for a consecutive-run merge: the incoming payload
/// replaces the old one (text concatenation, when due, already happened on the
/// incoming side) and optional fields only overwrite when present.
fn overlay(last: &mut Message, incoming: Message) {
    last.content = incoming.content;
    if incoming.conversation_id.is_some() {
        last.conversation_id = incoming.conversation_id;
    }
    if incoming.created_at.is_some() {
        last.created_at = incoming.created_at;
    }
}

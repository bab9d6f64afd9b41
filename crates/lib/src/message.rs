//! Transcript message model: tagged variants, per-variant merge keys, urgency.
//!
//! Each agent bridge (Gemini-style CLI, ACP, Codex) emits update events that share
//! this record shape but define their own `content` payloads, so `content` stays
//! free-form JSON and the merge rules read only the identity fields they need.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Discriminator for a transcript entry. Wire names match the bridge event `type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    ToolCall,
    CodexToolCall,
    AcpToolCall,
    ToolGroup,
    AcpPermission,
    CodexPermission,
}

/// One transcript entry (a message or a tool-call record).
///
/// `msg_id` is the stable identity for "same logical turn, update in place";
/// streamed updates may omit it (empty string) when the variant carries its own
/// merge key inside `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Unix ms when the host recorded the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Message {
    pub fn new(kind: MessageKind, msg_id: impl Into<String>, content: Value) -> Self {
        Self {
            msg_id: msg_id.into(),
            kind,
            content,
            conversation_id: None,
            created_at: Some(Utc::now().timestamp_millis()),
        }
    }

    /// A streamed text delta; deltas with the same `msg_id` concatenate.
    pub fn text(msg_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, msg_id, json!({ "content": text.into() }))
    }

    /// The per-variant identity used to find an existing entry to update in place.
    ///
    /// `tool_call` keys on `content.callId`, `codex_tool_call` on
    /// `content.toolCallId`, `acp_tool_call` on the nested
    /// `content.update.toolCallId`. Codex and ACP ids live in separate variant
    /// namespaces even when the literal strings collide; the merge step re-checks
    /// the stored entry's kind for that reason. Returns `None` when the id field
    /// is missing or not a string, which routes the update down the plain
    /// consecutive-run path instead of erroring.
    pub fn merge_key(&self) -> Option<&str> {
        match self.kind {
            MessageKind::ToolCall => self.content.get("callId").and_then(Value::as_str),
            MessageKind::CodexToolCall => self.content.get("toolCallId").and_then(Value::as_str),
            MessageKind::AcpToolCall => self
                .content
                .get("update")
                .and_then(|u| u.get("toolCallId"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    /// Interactive permission prompts are never merged and always urgent.
    pub fn is_permission_prompt(&self) -> bool {
        matches!(
            self.kind,
            MessageKind::AcpPermission | MessageKind::CodexPermission
        )
    }

    /// True for a `tool_group` containing at least one item awaiting confirmation.
    /// The status match is the exact string the bridges emit; other statuses
    /// (including errors) are not treated as urgent.
    pub fn has_confirming_tool(&self) -> bool {
        self.kind == MessageKind::ToolGroup
            && self
                .content
                .as_array()
                .is_some_and(|items| {
                    items
                        .iter()
                        .any(|t| t.get("status").and_then(Value::as_str) == Some("Confirming"))
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_key_per_variant() {
        let tool = Message::new(
            MessageKind::ToolCall,
            "t1",
            json!({ "callId": "c1", "status": "Running" }),
        );
        assert_eq!(tool.merge_key(), Some("c1"));

        let codex = Message::new(MessageKind::CodexToolCall, "t2", json!({ "toolCallId": "x" }));
        assert_eq!(codex.merge_key(), Some("x"));

        let acp = Message::new(
            MessageKind::AcpToolCall,
            "t3",
            json!({ "update": { "toolCallId": "y" } }),
        );
        assert_eq!(acp.merge_key(), Some("y"));
    }

    #[test]
    fn merge_key_absent_or_wrong_shape_is_none() {
        let no_id = Message::new(MessageKind::ToolCall, "t1", json!({ "status": "Running" }));
        assert_eq!(no_id.merge_key(), None);

        let numeric = Message::new(MessageKind::ToolCall, "t1", json!({ "callId": 7 }));
        assert_eq!(numeric.merge_key(), None);

        let text = Message::text("m1", "hello");
        assert_eq!(text.merge_key(), None);
    }

    #[test]
    fn acp_key_is_nested_only() {
        // A top-level toolCallId on an acp_tool_call is not its identity.
        let acp = Message::new(MessageKind::AcpToolCall, "t1", json!({ "toolCallId": "z" }));
        assert_eq!(acp.merge_key(), None);
    }

    #[test]
    fn confirming_group_detection() {
        let confirming = Message::new(
            MessageKind::ToolGroup,
            "g1",
            json!([
                { "callId": "a", "status": "Success" },
                { "callId": "b", "status": "Confirming" }
            ]),
        );
        assert!(confirming.has_confirming_tool());

        let quiet = Message::new(
            MessageKind::ToolGroup,
            "g2",
            json!([{ "callId": "a", "status": "Executing" }]),
        );
        assert!(!quiet.has_confirming_tool());

        // Exact-string policy: error statuses are not urgent.
        let errored = Message::new(
            MessageKind::ToolGroup,
            "g3",
            json!([{ "callId": "a", "status": "Error" }]),
        );
        assert!(!errored.has_confirming_tool());
    }

    #[test]
    fn wire_tags_round_trip() {
        let msg = Message::new(MessageKind::AcpPermission, "p1", json!({ "options": [] }));
        let wire = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(wire.get("type").and_then(Value::as_str), Some("acp_permission"));
        let back: Message = serde_json::from_value(wire).expect("deserialize");
        assert_eq!(back.kind, MessageKind::AcpPermission);
    }

    #[test]
    fn msg_id_defaults_to_empty_on_wire() {
        let back: Message = serde_json::from_value(json!({
            "type": "tool_call",
            "content": { "callId": "c1" }
        }))
        .expect("deserialize");
        assert!(back.msg_id.is_empty());
        assert_eq!(back.merge_key(), Some("c1"));
    }
}

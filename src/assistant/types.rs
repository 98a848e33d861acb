//! Shared types for the assistant core.
//!
//! Parsed reply segments, file references, merge request/result pairs, and
//! the chat envelopes exchanged with the host editor's UI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ─── Reply Segments ──────────────────────────────────────────────────────────

/// One parsed unit of a model reply: prose text or a labeled code block.
///
/// Constructed by [`segments::parse`](crate::assistant::segments::parse)
/// immediately after a reply arrives and consumed exactly once by the
/// orchestrator — raw text plus flags never travels through the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSegment {
    /// A line of prose from the model.
    Prose { text: String },
    /// A fenced code block, optionally bound to a workspace file.
    Code {
        /// Language tag from the fence line (`plaintext` if absent).
        language: String,
        /// Block body without the trailing newline.
        body: String,
        /// Target file from a `{file: <path>}` fence annotation, if any.
        target_file: Option<String>,
    },
}

// ─── File References ─────────────────────────────────────────────────────────

/// A workspace file pulled into context by an `@name` mention.
///
/// Resolution may fail; unresolved references are dropped from context
/// silently (logged, never surfaced as a hard error).
#[derive(Debug, Clone)]
pub struct FileReference {
    /// The name as typed after `@`.
    pub name: String,
    /// Workspace-relative path the name resolved to.
    pub resolved_path: Option<PathBuf>,
    /// File content, when resolution succeeded.
    pub content: Option<String>,
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Input to one merge: existing content plus the fragment to reconcile.
///
/// A value object — no identity beyond its fields; consumed once by the
/// merge engine.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Full current text of the target file.
    pub old_content: String,
    /// Candidate code block from the model.
    pub new_fragment: String,
    /// Workspace-relative target, when the fragment is bound to a file.
    pub target_path: Option<String>,
}

/// Output of a successful merge. Owned — retains no references to the
/// request it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub merged_content: String,
}

// ─── Chat Envelopes ──────────────────────────────────────────────────────────

/// One user-submitted message from the chat input box.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Raw input text, possibly containing `@` mentions.
    pub text: String,
    /// Model picked in the dropdown; `None` uses the configured default.
    #[serde(default)]
    pub model: Option<String>,
}

/// One transcript entry sent back to the UI — one per response segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Prose text, or the code block body.
    pub text: String,
    pub is_code: bool,
    /// Language tag, present only for code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Target file binding carried over from the fence annotation, so the
    /// UI can offer "apply" with the right path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file: Option<String>,
}

impl ChatEvent {
    /// Build a prose transcript entry.
    pub fn prose(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_code: false,
            language: None,
            target_file: None,
        }
    }
}

/// Inbound envelope from the chat surface, discriminated by `command`.
///
/// Mirrors the host webview's message shapes: submit a message, apply a
/// code block, or ask for `@` mention suggestions.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    SendMessage(ChatRequest),
    ApplyCode {
        code: String,
        #[serde(default)]
        target_path: Option<String>,
    },
    GetFileSuggestions {
        query: String,
    },
}

/// Outbound envelope to the chat surface, one per transcript entry or
/// suggestion batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    ReceiveMessage(ChatEvent),
    FileSuggestions { files: Vec<String>, query: String },
}

impl From<&ResponseSegment> for ChatEvent {
    fn from(segment: &ResponseSegment) -> Self {
        match segment {
            ResponseSegment::Prose { text } => ChatEvent::prose(text.clone()),
            ResponseSegment::Code {
                language,
                body,
                target_file,
            } => ChatEvent {
                text: body.clone(),
                is_code: true,
                language: Some(language.clone()),
                target_file: target_file.clone(),
            },
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_event_camel_case_shape() {
        let event = ChatEvent {
            text: "let x = 1;".to_string(),
            is_code: true,
            language: Some("rust".to_string()),
            target_file: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"isCode\":true"));
        assert!(json.contains("\"language\":\"rust\""));
        assert!(!json.contains("targetFile"), "absent binding is omitted");
    }

    #[test]
    fn test_chat_event_from_code_segment() {
        let segment = ResponseSegment::Code {
            language: "python".to_string(),
            body: "print(1)".to_string(),
            target_file: Some("src/app.py".to_string()),
        };
        let event = ChatEvent::from(&segment);
        assert!(event.is_code);
        assert_eq!(event.language.as_deref(), Some("python"));
        assert_eq!(event.target_file.as_deref(), Some("src/app.py"));
    }

    #[test]
    fn test_chat_request_model_defaults_to_none() {
        let req: ChatRequest = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert!(req.model.is_none());
    }

    #[test]
    fn test_inbound_send_message_envelope() {
        let json = r#"{"command":"sendMessage","text":"hi","model":"gpt-4o-mini"}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        match msg {
            InboundMessage::SendMessage(req) => {
                assert_eq!(req.text, "hi");
                assert_eq!(req.model.as_deref(), Some("gpt-4o-mini"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_inbound_apply_code_envelope() {
        let json = r#"{"command":"applyCode","code":"fn f() {}","targetPath":"src/lib.rs"}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        match msg {
            InboundMessage::ApplyCode { code, target_path } => {
                assert_eq!(code, "fn f() {}");
                assert_eq!(target_path.as_deref(), Some("src/lib.rs"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_outbound_envelope_carries_command_tag() {
        let msg = OutboundMessage::FileSuggestions {
            files: vec!["a.rs".to_string()],
            query: "a".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"command\":\"fileSuggestions\""));
        assert!(json.contains("\"files\":[\"a.rs\"]"));
    }
}

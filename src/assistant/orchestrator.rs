//! Request orchestration — one user message in, transcript events out.
//!
//! Lifecycle per message: expand `@` file references into a context block,
//! call the chat model, parse the reply, and route each segment to the
//! transcript in parse order. Applying a code segment is a separate,
//! explicit user action — never automatic — that runs the merge engine and
//! then the workspace mutator.
//!
//! Independent messages are not serialized against each other: a message
//! submitted while another is awaiting the model does not cancel it, and
//! both replies are delivered as they arrive. Each reply is self-contained,
//! so cross-message ordering does not matter.

use std::path::PathBuf;

use uuid::Uuid;

use crate::inference::client::CompletionModel;
use crate::inference::types::ChatMessage;

use super::errors::{MergeError, WorkspaceError};
use super::merge::MergeEngine;
use super::segments;
use super::types::{
    ChatEvent, ChatRequest, FileReference, InboundMessage, MergeRequest, OutboundMessage,
};
use super::workspace::Workspace;

/// System prompt for the conversational flow. The merge engine uses its own.
const CHAT_SYSTEM_PROMPT: &str = "You are a helpful AI coding assistant.";

/// Lifecycle phase of one in-flight message, recorded in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestPhase {
    ExpandingReferences,
    AwaitingModel,
    RoutingSegments,
}

/// Drives the per-message flow between the UI, the model, and the workspace.
pub struct ChatOrchestrator<M> {
    workspace: Workspace,
    model: M,
}

impl<M: CompletionModel> ChatOrchestrator<M> {
    pub fn new(workspace: Workspace, model: M) -> Self {
        Self { workspace, model }
    }

    /// The workspace this orchestrator mutates through.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    // ─── Envelope Dispatch ──────────────────────────────────────────────

    /// Dispatch one inbound UI envelope to the matching flow.
    ///
    /// Every branch ends in outbound messages — apply failures come back as
    /// a transcript entry with the classified error, never as an `Err`.
    pub async fn handle(&self, message: InboundMessage) -> Vec<OutboundMessage> {
        match message {
            InboundMessage::SendMessage(request) => self
                .handle_message(request)
                .await
                .into_iter()
                .map(OutboundMessage::ReceiveMessage)
                .collect(),
            InboundMessage::ApplyCode { code, target_path } => {
                let event = match self.apply_code(&code, target_path.as_deref()).await {
                    Ok(written) => {
                        ChatEvent::prose(format!("Applied code to {}", written.display()))
                    }
                    Err(e) => ChatEvent::prose(format!("Failed to apply code: {e}")),
                };
                vec![OutboundMessage::ReceiveMessage(event)]
            }
            InboundMessage::GetFileSuggestions { query } => {
                vec![OutboundMessage::FileSuggestions {
                    files: self.suggest_files(&query),
                    query,
                }]
            }
        }
    }

    // ─── Chat Flow ──────────────────────────────────────────────────────

    /// Handle one submitted message and return the transcript events.
    ///
    /// Model failures never escape as errors — they come back as a prose
    /// event so the chat surface can show them.
    pub async fn handle_message(&self, request: ChatRequest) -> Vec<ChatEvent> {
        let request_id = Uuid::new_v4();

        self.log_phase(request_id, RequestPhase::ExpandingReferences);
        let prompt = self.expand_references(&request.text);

        self.log_phase(request_id, RequestPhase::AwaitingModel);
        let messages = vec![
            ChatMessage::system(CHAT_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let reply = match self.model.complete(messages, request.model.as_deref()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "model call failed");
                return vec![ChatEvent::prose(format!("Error from model provider: {e}"))];
            }
        };

        self.log_phase(request_id, RequestPhase::RoutingSegments);
        let events: Vec<ChatEvent> = segments::parse(&reply).iter().map(ChatEvent::from).collect();

        tracing::info!(
            request_id = %request_id,
            segment_count = events.len(),
            "message handled"
        );
        events
    }

    /// Expand `@name` mentions into a context block ahead of the message.
    ///
    /// Each mention is a maximal run of non-whitespace after `@`. Unreadable
    /// references are dropped silently — logged for diagnostics, never a
    /// hard error. With zero resolved references the message goes out
    /// unmodified.
    fn expand_references(&self, text: &str) -> String {
        let resolved: Vec<FileReference> = scan_mentions(text)
            .into_iter()
            .filter_map(|name| match self.workspace.read(&name) {
                Ok(content) => Some(FileReference {
                    resolved_path: Some(PathBuf::from(&name)),
                    name,
                    content: Some(content),
                }),
                Err(e) => {
                    tracing::debug!(reference = %name, error = %e, "dropping unreadable reference");
                    None
                }
            })
            .collect();

        if resolved.is_empty() {
            return text.to_string();
        }

        let blocks: Vec<String> = resolved
            .iter()
            .map(|r| {
                format!(
                    "File {}:\n{}",
                    r.name,
                    r.content.as_deref().unwrap_or_default()
                )
            })
            .collect();

        tracing::info!(resolved = resolved.len(), "expanded file references");
        format!("Context:\n{}\n\nUser Query: {text}", blocks.join("\n\n"))
    }

    // ─── Apply Flow ─────────────────────────────────────────────────────

    /// Apply a code block the user explicitly accepted.
    ///
    /// An existing non-empty target goes through the merge engine and then
    /// a whole-file update. A missing or empty target takes the fragment
    /// verbatim — there is nothing to merge with. No target at all creates
    /// a generated file. Returns the path written.
    pub async fn apply_code(
        &self,
        code: &str,
        target: Option<&str>,
    ) -> Result<PathBuf, MergeError> {
        if code.trim().is_empty() {
            return Err(MergeError::EmptyFragment);
        }

        let Some(path) = target else {
            return Ok(self.workspace.apply_code_block(code, None)?);
        };

        let old_content = match self.workspace.read(path) {
            Ok(content) => content,
            Err(WorkspaceError::NotFound { .. }) => String::new(),
            Err(e) => return Err(e.into()),
        };

        if old_content.trim().is_empty() {
            tracing::info!(path, "target empty or new, applying fragment verbatim");
            return Ok(self.workspace.update(path, code)?);
        }

        let engine = MergeEngine::new(&self.model);
        let merged = engine
            .merge(MergeRequest {
                old_content,
                new_fragment: code.to_string(),
                target_path: Some(path.to_string()),
            })
            .await?;

        engine.apply_merged(&self.workspace, path, &merged)
    }

    // ─── Suggestions ────────────────────────────────────────────────────

    /// File suggestions for the `@` mention autocomplete popup.
    pub fn suggest_files(&self, query: &str) -> Vec<String> {
        self.workspace.suggest(query)
    }

    fn log_phase(&self, request_id: Uuid, phase: RequestPhase) {
        tracing::debug!(request_id = %request_id, phase = ?phase, "chat request");
    }
}

/// Collect `@` mention tokens: each is the maximal run of non-whitespace
/// characters following an `@`.
fn scan_mentions(text: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        if c != '@' {
            continue;
        }
        let rest = &text[i + c.len_utf8()..];
        let token: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
        if !token.is_empty() {
            // Skip past the token so an `@` inside it is not re-scanned.
            for _ in 0..token.chars().count() {
                chars.next();
            }
            mentions.push(token);
        }
    }

    mentions
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Model-assisted merge of a code fragment into existing file content.
//!
//! A fragment arriving from chat may be a full replacement, an isolated
//! addition (one new method for an existing type), or a partial
//! context-dependent edit — and it carries no anchors saying which. A text
//! diff cannot disambiguate arbitrary-language source without a parser, so
//! the engine delegates the structural decision to a second model call whose
//! prompt pins the merge policy: preserve the original structure,
//! incorporate the new code, return only the merged body. The tradeoff is
//! accepted: merge quality rides on the assisting call, and failure means
//! `MergeUnavailable` with the target file untouched — apply only proceeds
//! past a successful merge.

use std::path::PathBuf;

use crate::inference::client::CompletionModel;
use crate::inference::types::ChatMessage;

use super::errors::MergeError;
use super::segments;
use super::types::{MergeRequest, MergeResult, ResponseSegment};
use super::workspace::Workspace;

/// System prompt fixing the merge policy for the assisting model.
const MERGE_SYSTEM_PROMPT: &str = "\
You are a coder tasked with comparing and merging old code with new corrected code.
Follow these rules:
1. Analyze both old and new code carefully
2. The new code might be a complete file or just a portion
3. Merge the codes while preserving the original structure
4. Return only the merged code without any explanations or summaries";

/// Reconciles code fragments with existing file content via an assisting
/// model call, generic over the [`CompletionModel`] seam so tests can run
/// against a stub.
pub struct MergeEngine<M> {
    model: M,
    /// Model identifier override for merge calls; `None` uses the client's
    /// default.
    merge_model: Option<String>,
}

impl<M: CompletionModel> MergeEngine<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            merge_model: None,
        }
    }

    /// Route merge calls to a specific model (e.g. a cheaper one than the
    /// chat default).
    pub fn with_merge_model(mut self, model: impl Into<String>) -> Self {
        self.merge_model = Some(model.into());
        self
    }

    /// Merge a fragment into existing content.
    ///
    /// Fails with [`MergeError::EmptyFragment`] on a blank fragment without
    /// issuing any call, and with [`MergeError::MergeUnavailable`] when the
    /// assisting call errors or produces no body. Neither failure touches
    /// any file — the result is owned and carries no references back to the
    /// request.
    pub async fn merge(&self, request: MergeRequest) -> Result<MergeResult, MergeError> {
        if request.new_fragment.trim().is_empty() {
            return Err(MergeError::EmptyFragment);
        }

        let messages = vec![
            ChatMessage::system(MERGE_SYSTEM_PROMPT),
            ChatMessage::user(build_merge_prompt(
                &request.old_content,
                &request.new_fragment,
            )),
        ];

        tracing::info!(
            target_path = request.target_path.as_deref().unwrap_or("<unbound>"),
            old_bytes = request.old_content.len(),
            fragment_bytes = request.new_fragment.len(),
            "requesting assisted merge"
        );

        let reply = self
            .model
            .complete(messages, self.merge_model.as_deref())
            .await
            .map_err(|e| MergeError::MergeUnavailable {
                reason: e.to_string(),
            })?;

        let merged = extract_merged_body(&reply);
        if merged.trim().is_empty() {
            return Err(MergeError::MergeUnavailable {
                reason: "assisting model returned an empty merge body".to_string(),
            });
        }

        Ok(MergeResult {
            merged_content: merged,
        })
    }

    /// Write a merged body back: whole-file replace of the target through
    /// the workspace mutator, never a line-range patch.
    pub fn apply_merged(
        &self,
        workspace: &Workspace,
        path: &str,
        merged: &MergeResult,
    ) -> Result<PathBuf, MergeError> {
        Ok(workspace.update(path, &merged.merged_content)?)
    }
}

/// User prompt carrying both code versions to the assisting model.
fn build_merge_prompt(old_content: &str, new_fragment: &str) -> String {
    format!(
        "Compare and merge these code versions:\n\n\
         OLD CODE:\n{old_content}\n\n\
         NEW CODE:\n{new_fragment}\n\n\
         Please merge these codes following best practices and return only the merged code."
    )
}

/// Pull the merged body out of the assisting reply.
///
/// Models asked to "return only the code" still frequently fence it; the
/// first segment of the parsed reply is the body either way.
fn extract_merged_body(reply: &str) -> String {
    match segments::parse(reply).into_iter().next() {
        Some(ResponseSegment::Code { body, .. }) => body,
        // No fence at all — the raw reply is the merged body.
        Some(ResponseSegment::Prose { .. }) => reply.trim().to_string(),
        None => String::new(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

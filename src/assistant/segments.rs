//! Model reply parsing — prose and fenced code segments.
//!
//! `parse` converts raw reply text into typed [`ResponseSegment`]s; `format`
//! renders segments back into transcript form. Parsing always terminates and
//! never fails: malformed fences degrade to prose, and a fence left open at
//! end of input still emits its partial body, because truncated streamed
//! replies are common.

use super::types::ResponseSegment;

/// Language assumed when a fence line carries no tag.
const DEFAULT_LANGUAGE: &str = "plaintext";

/// Marker that opens a `{file: <path>}` fence annotation.
const FILE_ANNOTATION_OPEN: &str = "{file:";

// ─── Parse ───────────────────────────────────────────────────────────────────

/// Parse a raw model reply into a segment sequence.
///
/// Line scanner: a line beginning with a triple-backtick fence toggles the
/// code region. Outside a region, each non-blank line becomes one `Prose`
/// segment (blank lines are dropped). Inside, lines accumulate into the
/// `Code` body; the fence-opening line may carry a language tag and a
/// `{file: <path>}` binding.
pub fn parse(raw: &str) -> Vec<ResponseSegment> {
    let mut segments = Vec::new();
    let mut open_fence: Option<(String, Option<String>)> = None;
    let mut body_lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.starts_with("```") {
            match open_fence.take() {
                Some((language, target_file)) => {
                    segments.push(ResponseSegment::Code {
                        language,
                        body: body_lines.join("\n"),
                        target_file,
                    });
                    body_lines.clear();
                }
                None => {
                    open_fence = Some(parse_fence_tag(&line[3..]));
                }
            }
        } else if open_fence.is_some() {
            body_lines.push(line);
        } else if !line.trim().is_empty() {
            segments.push(ResponseSegment::Prose {
                text: line.trim().to_string(),
            });
        }
    }

    // Unclosed fence: the reply was cut off mid-block. Emit what we have
    // rather than dropping it.
    if let Some((language, target_file)) = open_fence {
        segments.push(ResponseSegment::Code {
            language,
            body: body_lines.join("\n"),
            target_file,
        });
    }

    segments
}

/// Split a fence-opening tag into `(language, target_file)`.
///
/// Accepted shapes: empty, `rust`, `rust {file: src/main.rs}`. An annotation
/// with no closing brace is dropped and the text before it is kept as the
/// language tag.
fn parse_fence_tag(tag: &str) -> (String, Option<String>) {
    let tag = tag.trim();

    if let Some(open) = tag.find(FILE_ANNOTATION_OPEN) {
        let language = tag[..open].trim();
        let language = if language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            language
        };
        let rest = &tag[open + FILE_ANNOTATION_OPEN.len()..];
        if let Some(close) = rest.find('}') {
            let file = rest[..close].trim();
            let target_file = if file.is_empty() {
                None
            } else {
                Some(file.to_string())
            };
            return (language.to_string(), target_file);
        }
        return (language.to_string(), None);
    }

    if tag.is_empty() {
        (DEFAULT_LANGUAGE.to_string(), None)
    } else {
        (tag.to_string(), None)
    }
}

// ─── Format ──────────────────────────────────────────────────────────────────

/// Render segments back into transcript text.
///
/// Inverse of [`parse`] for sequences with non-empty bodies: parsing the
/// output yields a segment-equivalent sequence.
pub fn format(segments: &[ResponseSegment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            ResponseSegment::Prose { text } => text.clone(),
            ResponseSegment::Code {
                language,
                body,
                target_file,
            } => match target_file {
                Some(file) => format!("```{language} {{file: {file}}}\n{body}\n```"),
                None => format!("```{language}\n{body}\n```"),
            },
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

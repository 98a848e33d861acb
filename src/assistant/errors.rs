//! Assistant error types.
//!
//! Nothing here is fatal to the host — every variant degrades to a reported
//! chat message. Validation errors are local and immediate; I/O errors go
//! through the restore-then-report path in the workspace.

use thiserror::Error;

/// Errors from safe file operations under the workspace root.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The path is empty, absolute, or escapes the workspace root.
    #[error("invalid path: '{path}'")]
    InvalidPath { path: String },

    /// The path falls under a reserved system-directory prefix.
    #[error("operation not allowed on protected path: '{path}'")]
    ProtectedPath { path: String },

    /// Content exceeds the size ceiling.
    #[error("content too large: {size} bytes (limit {limit})")]
    ContentTooLarge { size: usize, limit: usize },

    /// Target file does not exist.
    #[error("file not found: '{path}'")]
    NotFound { path: String },

    /// I/O failure mid-operation. The original content was restored from
    /// backup before this was reported — the file is intact, the logical
    /// operation did not take effect.
    #[error("write failed for '{path}': {reason}")]
    WriteFailure { path: String, reason: String },

    /// Other I/O error (read, metadata, directory creation).
    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the merge engine and the apply flow.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The code fragment is blank — nothing to merge.
    #[error("cannot merge an empty code fragment")]
    EmptyFragment,

    /// The assisting model call failed or returned no usable body. The
    /// target file is guaranteed untouched.
    #[error("merge unavailable: {reason}")]
    MergeUnavailable { reason: String },

    /// Writing the merged content back failed.
    #[error(transparent)]
    Apply(#[from] WorkspaceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_error_display() {
        let err = WorkspaceError::ContentTooLarge {
            size: 100,
            limit: 50,
        };
        assert_eq!(err.to_string(), "content too large: 100 bytes (limit 50)");
    }

    #[test]
    fn test_merge_error_wraps_workspace_error() {
        let err = MergeError::from(WorkspaceError::NotFound {
            path: "a.txt".to_string(),
        });
        assert_eq!(err.to_string(), "file not found: 'a.txt'");
    }
}

//! Safe file operations under a workspace root.
//!
//! All filesystem mutation in the crate goes through [`Workspace`] — one
//! authority for the write-safety protocol: path sanitization and
//! containment, a content size ceiling, protected system prefixes, and a
//! backup/restore sequence around update and delete so the target is never
//! observable in a half-written state.
//!
//! `Workspace` is an injected collaborator owning the root path, passed by
//! reference to whatever needs it — there is no global access point.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::errors::WorkspaceError;
use super::ranking;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Maximum content size accepted by create/update (bytes).
const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Characters replaced with `_` during path sanitization.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Top-level prefixes mutating operations must not touch.
const PROTECTED_PREFIXES: &[&str] = &[".git", ".vscode", "node_modules", "target"];

/// Directories excluded from suggestion walks, alongside hidden entries.
const EXCLUDED_DIRS: &[&str] = &["node_modules", "dist", "build", "target"];

/// Extensions tried when resolving an extensionless path to an existing file.
const KNOWN_EXTENSIONS: &[&str] = &["rs", "go", "js", "ts", "cpp", "py", "java"];

// ─── Workspace ───────────────────────────────────────────────────────────────

/// Single authority for file operations confined to one root directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `root`. The directory is not required to
    /// exist yet; operations will report I/O errors against it as they run.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root all operations are confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─── Create / Update / Delete ───────────────────────────────────────

    /// Create (or overwrite) a file at a workspace-relative path.
    ///
    /// Parent directories are created as needed — existing parents are not
    /// an error. Line endings are normalized to `\n` before writing.
    pub fn create(&self, path: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        let rel = self.validate(path, Some(content))?;
        let full = self.root.join(&rel);

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(&rel, e))?;
        }

        tracing::debug!(path = %rel.display(), phase = "writing", "create");
        fs::write(&full, normalize_newlines(content)).map_err(|e| io_error(&rel, e))?;
        tracing::debug!(path = %rel.display(), phase = "done", "create");

        Ok(full)
    }

    /// Replace the content of an existing file, all-or-nothing.
    ///
    /// A missing target degrades to [`create`](Self::create). Otherwise the
    /// current content is copied to a sibling backup first; if the write
    /// fails, the backup is restored before the error propagates, so the
    /// file is never left in a state the caller did not ask for. The backup
    /// is an implementation detail of atomicity, not an exposed feature.
    pub fn update(&self, path: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        self.update_with(path, content, |target, data| fs::write(target, data))
    }

    /// Delete a file, with the same backup/restore protection as update.
    pub fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
        self.delete_with(path, |target| fs::remove_file(target))
    }

    /// `update` with an injectable write step, so tests can force the
    /// rollback path.
    fn update_with<F>(
        &self,
        path: &str,
        content: &str,
        write_fn: F,
    ) -> Result<PathBuf, WorkspaceError>
    where
        F: FnOnce(&Path, &str) -> std::io::Result<()>,
    {
        let rel = self.validate(path, Some(content))?;
        let full = self.root.join(&rel);

        if !full.exists() {
            tracing::debug!(path = %rel.display(), "update target missing, degrading to create");
            return self.create(path, content);
        }

        self.ensure_writable(&rel, &full)?;

        let backup = backup_path(&full);
        tracing::debug!(path = %rel.display(), phase = "backing-up", "update");
        fs::copy(&full, &backup).map_err(|e| io_error(&rel, e))?;

        tracing::debug!(path = %rel.display(), phase = "writing", "update");
        match write_fn(&full, &normalize_newlines(content)) {
            Ok(()) => {
                tracing::debug!(path = %rel.display(), phase = "committing", "update");
                let _ = fs::remove_file(&backup);
                tracing::debug!(path = %rel.display(), phase = "done", "update");
                Ok(full)
            }
            Err(write_err) => {
                if let Err(restore_err) = fs::copy(&backup, &full) {
                    tracing::error!(
                        path = %rel.display(),
                        error = %restore_err,
                        "backup restore failed, backup left on disk"
                    );
                } else {
                    let _ = fs::remove_file(&backup);
                }
                tracing::warn!(
                    path = %rel.display(),
                    phase = "rolled-back",
                    error = %write_err,
                    "update"
                );
                Err(WorkspaceError::WriteFailure {
                    path: rel.display().to_string(),
                    reason: write_err.to_string(),
                })
            }
        }
    }

    /// `delete` with an injectable remove step, so tests can force the
    /// rollback path.
    fn delete_with<F>(&self, path: &str, remove_fn: F) -> Result<(), WorkspaceError>
    where
        F: FnOnce(&Path) -> std::io::Result<()>,
    {
        let rel = self.validate(path, None)?;
        let full = self.root.join(&rel);

        if !full.exists() {
            return Err(WorkspaceError::NotFound {
                path: rel.display().to_string(),
            });
        }

        self.ensure_writable(&rel, &full)?;

        let backup = backup_path(&full);
        tracing::debug!(path = %rel.display(), phase = "backing-up", "delete");
        fs::copy(&full, &backup).map_err(|e| io_error(&rel, e))?;

        match remove_fn(&full) {
            Ok(()) => {
                let _ = fs::remove_file(&backup);
                tracing::debug!(path = %rel.display(), phase = "done", "delete");
                Ok(())
            }
            Err(remove_err) => {
                if let Err(restore_err) = fs::copy(&backup, &full) {
                    tracing::error!(
                        path = %rel.display(),
                        error = %restore_err,
                        "backup restore failed, backup left on disk"
                    );
                } else {
                    let _ = fs::remove_file(&backup);
                }
                tracing::warn!(
                    path = %rel.display(),
                    phase = "rolled-back",
                    error = %remove_err,
                    "delete"
                );
                Err(WorkspaceError::WriteFailure {
                    path: rel.display().to_string(),
                    reason: remove_err.to_string(),
                })
            }
        }
    }

    // ─── Read / Suggest / Apply ─────────────────────────────────────────

    /// Read a workspace-relative file. Extensionless names resolve to an
    /// existing `name.{rs,go,js,ts,cpp,py,java}` when one exists.
    pub fn read(&self, path: &str) -> Result<String, WorkspaceError> {
        let rel = self.resolve_known_extension(self.sanitize(path)?);
        let full = self.root.join(&rel);

        if !full.is_file() {
            return Err(WorkspaceError::NotFound {
                path: rel.display().to_string(),
            });
        }

        fs::read_to_string(&full).map_err(|e| io_error(&rel, e))
    }

    /// Suggest workspace files for an autocomplete query.
    ///
    /// Enumerates the tree (hidden entries and build/dependency directories
    /// excluded), then delegates ordering to [`ranking::rank`]. Never more
    /// than ten results.
    pub fn suggest(&self, query: &str) -> Vec<String> {
        let mut files = Vec::new();
        self.walk_files(&self.root, &mut files);
        ranking::rank(query, &files)
    }

    /// Write a code block into the workspace.
    ///
    /// With a target path this is a whole-file update. Without one, a fresh
    /// `generated_<timestamp><ext>` file is created, with the extension
    /// guessed from the code.
    pub fn apply_code_block(
        &self,
        code: &str,
        target: Option<&str>,
    ) -> Result<PathBuf, WorkspaceError> {
        match target {
            Some(path) => self.update(path, code),
            None => {
                let name = format!(
                    "generated_{}{}",
                    chrono::Local::now().format("%Y%m%d_%H%M%S"),
                    detect_extension(code)
                );
                tracing::info!(file = %name, "no target file, creating a generated file");
                self.create(&name, code)
            }
        }
    }

    // ─── Validation ─────────────────────────────────────────────────────

    /// Sanitize and validate a mutating-operation path plus its content.
    fn validate(&self, path: &str, content: Option<&str>) -> Result<PathBuf, WorkspaceError> {
        let rel = self.resolve_known_extension(self.sanitize(path)?);

        if let Some(Component::Normal(first)) = rel.components().next() {
            let first = first.to_string_lossy();
            if PROTECTED_PREFIXES.iter().any(|p| *p == first) {
                return Err(WorkspaceError::ProtectedPath {
                    path: rel.display().to_string(),
                });
            }
        }

        if let Some(content) = content {
            if content.len() > MAX_FILE_SIZE {
                return Err(WorkspaceError::ContentTooLarge {
                    size: content.len(),
                    limit: MAX_FILE_SIZE,
                });
            }
        }

        Ok(rel)
    }

    /// Reduce a caller-supplied path to a contained, workspace-relative one.
    ///
    /// Forbidden characters are substituted with `_`; `.` segments are
    /// dropped and interior `..` segments resolve against what precedes
    /// them. Anything absolute, empty, or climbing above the root is
    /// `InvalidPath` — escapes are rejected, never silently repaired.
    fn sanitize(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        if path.trim().is_empty() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
            });
        }

        let substituted: String = path
            .chars()
            .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
            .collect();

        let candidate = Path::new(&substituted);
        let mut normalized: Vec<std::ffi::OsString> = Vec::new();

        for component in candidate.components() {
            match component {
                Component::Normal(part) => normalized.push(part.to_os_string()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if normalized.pop().is_none() {
                        return Err(WorkspaceError::InvalidPath {
                            path: path.to_string(),
                        });
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(WorkspaceError::InvalidPath {
                        path: path.to_string(),
                    });
                }
            }
        }

        if normalized.is_empty() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
            });
        }

        Ok(normalized.iter().collect())
    }

    /// Map an extensionless relative path onto an existing file with a
    /// known extension, if there is one. Paths with an extension pass
    /// through untouched.
    fn resolve_known_extension(&self, rel: PathBuf) -> PathBuf {
        if rel.extension().is_some() {
            return rel;
        }
        for ext in KNOWN_EXTENSIONS {
            let candidate = rel.with_extension(ext);
            if self.root.join(&candidate).is_file() {
                return candidate;
            }
        }
        rel
    }

    /// Reject targets the OS would refuse to write, before any backup is
    /// taken — the file stays untouched.
    fn ensure_writable(&self, rel: &Path, full: &Path) -> Result<(), WorkspaceError> {
        let metadata = fs::metadata(full).map_err(|e| io_error(rel, e))?;
        if metadata.permissions().readonly() {
            return Err(WorkspaceError::WriteFailure {
                path: rel.display().to_string(),
                reason: "file is not writable".to_string(),
            });
        }
        Ok(())
    }

    /// Depth-first walk collecting workspace-relative file paths, hidden
    /// entries and build directories skipped, per-directory name order for
    /// determinism.
    fn walk_files(&self, dir: &Path, out: &mut Vec<String>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "suggestion walk skipped dir");
                return;
            }
        };

        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_str()) {
                continue;
            }

            let path = entry.path();
            if path.is_dir() {
                self.walk_files(&path, out);
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Sibling backup path for a target file (`foo.rs` → `foo.rs.bak`).
fn backup_path(full: &Path) -> PathBuf {
    PathBuf::from(format!("{}.bak", full.display()))
}

/// Normalize line endings to `\n`.
fn normalize_newlines(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Guess a file extension from code content. Crude by design — it only
/// names freshly generated files, it never routes parsing.
fn detect_extension(code: &str) -> &'static str {
    if code.contains("#include") {
        ".cpp"
    } else if code.contains("class ") && code.contains("public ") {
        ".java"
    } else if code.contains("fn ") {
        ".rs"
    } else if code.contains("interface ") || code.contains("namespace ") {
        ".ts"
    } else if code.contains("function") || code.contains("const ") || code.contains("let ") {
        ".js"
    } else {
        ".txt"
    }
}

fn io_error(rel: &Path, source: std::io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: rel.display().to_string(),
        source,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    // ─── Create ─────────────────────────────────────────────────────────

    #[test]
    fn test_create_writes_file_and_parents() {
        let (_dir, ws) = test_workspace();
        let written = ws.create("src/deep/mod.rs", "pub fn f() {}").unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "pub fn f() {}");
    }

    #[test]
    fn test_create_overwrites_existing() {
        let (_dir, ws) = test_workspace();
        ws.create("a.txt", "old").unwrap();
        let written = ws.create("a.txt", "new").unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "new");
    }

    #[test]
    fn test_create_normalizes_line_endings() {
        let (_dir, ws) = test_workspace();
        let written = ws.create("a.txt", "one\r\ntwo\rthree").unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "one\ntwo\nthree");
    }

    #[test]
    fn test_create_substitutes_forbidden_chars() {
        let (dir, ws) = test_workspace();
        ws.create("we?ird<name>.txt", "x").unwrap();
        assert!(dir.path().join("we_ird_name_.txt").is_file());
    }

    // ─── Containment ────────────────────────────────────────────────────

    #[test]
    fn test_escaping_paths_rejected_with_no_write() {
        let (dir, ws) = test_workspace();
        for path in ["../evil.txt", "a/../../evil.txt", "/etc/evil.txt", "..", ""] {
            assert!(
                matches!(
                    ws.create(path, "x"),
                    Err(WorkspaceError::InvalidPath { .. })
                ),
                "create({path:?}) should be InvalidPath"
            );
            assert!(
                matches!(
                    ws.update(path, "x"),
                    Err(WorkspaceError::InvalidPath { .. })
                ),
                "update({path:?}) should be InvalidPath"
            );
            assert!(
                matches!(ws.delete(path), Err(WorkspaceError::InvalidPath { .. })),
                "delete({path:?}) should be InvalidPath"
            );
        }
        // Nothing escaped above the root.
        assert!(!dir.path().parent().unwrap().join("evil.txt").exists());
    }

    #[test]
    fn test_interior_parent_segments_resolve_inside_root() {
        let (dir, ws) = test_workspace();
        ws.create("a/../b.txt", "ok").unwrap();
        assert!(dir.path().join("b.txt").is_file());
    }

    #[test]
    fn test_protected_prefixes_rejected() {
        let (dir, ws) = test_workspace();
        for path in [".git/config", ".vscode/settings.json", "node_modules/x.js", "target/out"] {
            assert!(
                matches!(
                    ws.create(path, "x"),
                    Err(WorkspaceError::ProtectedPath { .. })
                ),
                "create({path:?}) should be ProtectedPath"
            );
        }
        assert!(!dir.path().join(".git").exists());
    }

    #[test]
    fn test_content_too_large_rejected() {
        let (dir, ws) = test_workspace();
        let oversized = "x".repeat(MAX_FILE_SIZE + 1);
        let err = ws.create("big.txt", &oversized).unwrap_err();
        assert!(matches!(err, WorkspaceError::ContentTooLarge { .. }));
        assert!(!dir.path().join("big.txt").exists());
    }

    // ─── Update ─────────────────────────────────────────────────────────

    #[test]
    fn test_update_missing_degrades_to_create() {
        let (_dir, ws) = test_workspace();
        let written = ws.update("missing.txt", "x").unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "x");
    }

    #[test]
    fn test_update_replaces_and_removes_backup() {
        let (dir, ws) = test_workspace();
        ws.create("a.txt", "old").unwrap();
        let written = ws.update("a.txt", "new").unwrap();
        assert_eq!(fs::read_to_string(&written).unwrap(), "new");
        assert!(!dir.path().join("a.txt.bak").exists());
    }

    #[test]
    fn test_update_write_failure_restores_original() {
        let (dir, ws) = test_workspace();
        ws.create("a.txt", "original bytes").unwrap();

        let err = ws
            .update_with("a.txt", "replacement", |_, _| {
                Err(std::io::Error::other("disk full"))
            })
            .unwrap_err();

        assert!(matches!(err, WorkspaceError::WriteFailure { .. }));
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "original bytes"
        );
        assert!(!dir.path().join("a.txt.bak").exists());
    }

    #[test]
    fn test_update_readonly_target_reports_without_touching() {
        let (dir, ws) = test_workspace();
        let target = dir.path().join("a.txt");
        fs::write(&target, "locked").unwrap();
        let mut perms = fs::metadata(&target).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&target, perms).unwrap();

        let err = ws.update("a.txt", "new").unwrap_err();
        assert!(matches!(err, WorkspaceError::WriteFailure { .. }));
        assert_eq!(fs::read_to_string(&target).unwrap(), "locked");

        // Cleanup so the tempdir can be removed on all platforms.
        let mut perms = fs::metadata(&target).unwrap().permissions();
        perms.set_readonly(false);
        fs::set_permissions(&target, perms).unwrap();
    }

    // ─── Delete ─────────────────────────────────────────────────────────

    #[test]
    fn test_delete_missing_is_not_found() {
        let (_dir, ws) = test_workspace();
        assert!(matches!(
            ws.delete("nope.txt"),
            Err(WorkspaceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_removes_file_and_backup() {
        let (dir, ws) = test_workspace();
        ws.create("a.txt", "x").unwrap();
        ws.delete("a.txt").unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert!(!dir.path().join("a.txt.bak").exists());
    }

    #[test]
    fn test_delete_failure_restores_file() {
        let (dir, ws) = test_workspace();
        ws.create("a.txt", "keep me").unwrap();

        let err = ws
            .delete_with("a.txt", |_| Err(std::io::Error::other("busy")))
            .unwrap_err();

        assert!(matches!(err, WorkspaceError::WriteFailure { .. }));
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "keep me"
        );
        assert!(!dir.path().join("a.txt.bak").exists());
    }

    // ─── Read ───────────────────────────────────────────────────────────

    #[test]
    fn test_read_existing() {
        let (_dir, ws) = test_workspace();
        ws.create("notes.md", "content").unwrap();
        assert_eq!(ws.read("notes.md").unwrap(), "content");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_dir, ws) = test_workspace();
        assert!(matches!(
            ws.read("nope.md"),
            Err(WorkspaceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_read_resolves_extensionless_name() {
        let (_dir, ws) = test_workspace();
        ws.create("calc.py", "print(1)").unwrap();
        assert_eq!(ws.read("calc").unwrap(), "print(1)");
    }

    // ─── Suggest ────────────────────────────────────────────────────────

    #[test]
    fn test_suggest_skips_hidden_and_build_dirs() {
        let (_dir, ws) = test_workspace();
        ws.create("src/main.rs", "fn main() {}").unwrap();
        // Plant excluded entries directly — create() refuses protected paths.
        fs::create_dir_all(ws.root().join(".git")).unwrap();
        fs::write(ws.root().join(".git/HEAD"), "ref").unwrap();
        fs::create_dir_all(ws.root().join("node_modules/pkg")).unwrap();
        fs::write(ws.root().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::create_dir_all(ws.root().join("dist")).unwrap();
        fs::write(ws.root().join("dist/bundle.js"), "x").unwrap();
        fs::write(ws.root().join(".hidden"), "x").unwrap();

        let all = ws.suggest("");
        assert_eq!(all, vec!["src/main.rs".to_string()]);
    }

    #[test]
    fn test_suggest_ranks_and_caps() {
        let (_dir, ws) = test_workspace();
        ws.create("src/calc.py", "x").unwrap();
        ws.create("src/calculator.ts", "x").unwrap();
        ws.create("README.md", "x").unwrap();
        for i in 0..15 {
            ws.create(&format!("lib/calc_helper_{i:02}.py"), "x").unwrap();
        }

        let suggestions = ws.suggest("calc");
        assert_eq!(suggestions.len(), 10);
        assert_eq!(suggestions[0], "src/calc.py");
        assert!(!suggestions.contains(&"README.md".to_string()));
    }

    // ─── Apply ──────────────────────────────────────────────────────────

    #[test]
    fn test_apply_code_block_with_target_updates() {
        let (dir, ws) = test_workspace();
        ws.create("app.js", "old").unwrap();
        ws.apply_code_block("const x = 1;", Some("app.js")).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("app.js")).unwrap(),
            "const x = 1;"
        );
    }

    #[test]
    fn test_apply_code_block_without_target_generates_file() {
        let (_dir, ws) = test_workspace();
        let written = ws.apply_code_block("fn main() {}", None).unwrap();
        let name = written.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("generated_"), "got {name}");
        assert!(name.ends_with(".rs"), "got {name}");
    }

    #[test]
    fn test_detect_extension_heuristics() {
        assert_eq!(detect_extension("#include <stdio.h>"), ".cpp");
        assert_eq!(detect_extension("public class Main { }"), ".java");
        assert_eq!(detect_extension("fn main() { }"), ".rs");
        assert_eq!(detect_extension("interface Props { }"), ".ts");
        assert_eq!(detect_extension("const x = require('x');"), ".js");
        assert_eq!(detect_extension("plain words"), ".txt");
    }
}

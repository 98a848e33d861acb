//! codeweave — backend for an editor chat assistant.
//!
//! Submodules:
//! - `config`: YAML assistant configuration (provider endpoint, workspace root)
//! - `inference`: chat completion client for an OpenAI-compatible endpoint
//! - `assistant`: reply parsing, file suggestion ranking, the safe file
//!   mutator, the merge engine, and the request orchestrator
//!
//! The host editor owns the UI — transcript, input box, model dropdown — and
//! the command wiring. It talks to this crate through the envelope types in
//! [`assistant::types`] and the operations on [`assistant::ChatOrchestrator`].

pub mod assistant;
pub mod config;
pub mod inference;

use std::io::Write;
use std::path::{Path, PathBuf};

/// Return the platform-standard data directory for codeweave.
///
/// - macOS: `~/Library/Application Support/com.codeweave.app/`
/// - Windows: `{FOLDERID_RoamingAppData}\codeweave\`
/// - Linux: `$XDG_DATA_HOME/com.codeweave.app/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.codeweave/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("com.codeweave.app");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codeweave")
}

/// Initialize the tracing subscriber — writes structured logs to the data
/// directory. The host glue calls this once at startup, before any other
/// crate entry point.
///
/// On each startup:
/// 1. Rotates existing logs (assistant.log → .1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh assistant.log with a line-flushing writer so entries
///    survive a crash.
/// 3. Logs a startup banner with the log path for discoverability.
///
/// If the log file cannot be opened, logging falls back to stderr.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("codeweave=info,warn"));

    let log_dir = data_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let log_path = log_dir.join("assistant.log");

    rotate_log_file(&log_path, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);

    match log_file {
        Ok(file) => {
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(FlushingWriter::new(file))
                .with_ansi(false)
                .with_target(true)
                .init();
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                log_file = %log_path.display(),
                pid = std::process::id(),
                "=== codeweave starting ==="
            );
        }
        Err(e) => {
            fmt::fmt().with_env_filter(filter).init();
            tracing::warn!(
                path = %log_path.display(),
                error = %e,
                "could not open log file, logging to stderr"
            );
        }
    }
}

/// Rotate log files: `assistant.log` → `.1` → `.2` → … → `.{keep}`.
///
/// The oldest file beyond `keep` is deleted. Missing files in the chain are
/// skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// `tracing-subscriber` buffers output internally; without explicit flushing,
/// log lines can sit in OS buffers and be lost when the host editor dies.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = f.write(buf)?;
        f.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        f.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

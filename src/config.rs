//! Assistant configuration loading.
//!
//! Reads `codeweave.yaml` and resolves the API key from the environment.
//! Config is the single source of truth for the provider endpoint, the
//! default model, and the workspace root. Every field has a default so a
//! missing file yields a usable config pointing at a local endpoint.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::inference::errors::InferenceError;

/// Config file name, looked up in the workspace root and then the data dir.
pub const CONFIG_FILE_NAME: &str = "codeweave.yaml";

// ─── Provider ────────────────────────────────────────────────────────────────

/// Chat-model provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible endpoint base, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    /// Environment variable holding the API key. The key itself never lives
    /// in the config file. A missing variable is fine for local endpoints.
    pub api_key_env: String,
    /// Model identifier sent when the UI does not pick one.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key_env: "CODEWEAVE_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: Some(4096),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}

// ─── Workspace ───────────────────────────────────────────────────────────────

/// Workspace settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root all file operations are confined to. Defaults to the directory
    /// the host opened.
    pub root: Option<PathBuf>,
}

// ─── Top Level ───────────────────────────────────────────────────────────────

/// Top-level assistant config (mirrors `codeweave.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub provider: ProviderConfig,
    pub workspace: WorkspaceConfig,
}

impl AssistantConfig {
    /// Load config from an explicit path.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let content = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        serde_yaml::from_str(&content).map_err(|e| InferenceError::ConfigError {
            reason: format!("cannot parse {}: {e}", path.display()),
        })
    }

    /// Load config from the first `codeweave.yaml` found in the workspace
    /// root or the data dir, falling back to defaults.
    ///
    /// A present-but-unparsable file is logged and skipped, not fatal — the
    /// assistant must come up even with a broken config on disk.
    pub fn load_or_default(workspace_root: &Path) -> Self {
        let candidates = [
            workspace_root.join(CONFIG_FILE_NAME),
            crate::data_dir().join(CONFIG_FILE_NAME),
        ];

        for path in &candidates {
            if !path.is_file() {
                continue;
            }
            match Self::load(path) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded assistant config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load assistant config, trying next candidate"
                    );
                }
            }
        }

        tracing::info!("no config file found, using defaults");
        Self::default()
    }

    /// The effective workspace root: configured value, else the current dir.
    pub fn workspace_root(&self) -> PathBuf {
        match self.workspace.root {
            Some(ref root) => root.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

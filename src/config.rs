//! Configuration loading from environment variables via dotenvy.
//! No secrets are ever hardcoded here.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ChatError;

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key: sourced from `OPENAI_API_KEY`
    pub openai_api_key: String,
    /// Base URL of the Assistants API: sourced from `OPENAI_BASE_URL`
    pub openai_base_url: String,
    /// Model used when an assistant has to be created: sourced from `OPENAI_MODEL`
    pub model: String,
    /// Name of the remote vector store: sourced from `VECSYNC_STORE_NAME`
    pub store_name: String,
    /// Location of the settings file: sourced from `VECSYNC_SETTINGS_PATH`
    pub settings_path: PathBuf,
    /// Bounded wait of the fragment consumer: sourced from `VECSYNC_POLL_INTERVAL_MS`
    pub poll_interval: Duration,
}

impl Config {
    /// Copy of this config pointing at another vector store.
    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self
    }
}

/// Load configuration purely from already-set environment variables.
///
/// Does **not** call `dotenvy::dotenv()`; useful in tests that need to
/// control the env precisely via [`std::env::set_var`] / [`std::env::remove_var`].
///
/// # Errors
/// Returns [`ChatError::Config`] if required variables are missing or invalid.
pub fn load_config_from_env() -> Result<Config, ChatError> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| ChatError::Config("OPENAI_API_KEY not set".to_string()))?;

    if api_key.trim().is_empty() {
        return Err(ChatError::Config("OPENAI_API_KEY is empty".to_string()));
    }

    let base_url = std::env::var("OPENAI_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ChatError::Config(
            "OPENAI_BASE_URL must start with http:// or https://".to_string(),
        ));
    }

    // The key travels in the Authorization header.
    if base_url.starts_with("http://") {
        tracing::warn!(
            "OPENAI_BASE_URL uses plaintext http://; the API key will be sent without TLS"
        );
    }

    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

    let store_name = std::env::var("VECSYNC_STORE_NAME")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());

    let settings_path = settings_path_from_env();

    let poll_interval = std::env::var("VECSYNC_POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_POLL_INTERVAL);

    Ok(Config {
        openai_api_key: api_key,
        openai_base_url: base_url.trim_end_matches('/').to_string(),
        model,
        store_name,
        settings_path,
        poll_interval,
    })
}

/// Load configuration from the environment (`.env` + system env vars).
///
/// Loads `.env` via `dotenvy` first (ignoring errors if the file is absent),
/// then delegates to [`load_config_from_env`].
///
/// # Errors
/// Returns [`ChatError::Config`] if required variables are missing or invalid.
pub fn load_config() -> Result<Config, ChatError> {
    let _ = dotenvy::dotenv();
    load_config_from_env()
}

/// Settings file location; needs no API key, so `settings clear` works offline.
pub fn settings_path_from_env() -> PathBuf {
    std::env::var("VECSYNC_SETTINGS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| exe_dir().join(SETTINGS_FILE_NAME))
}

/// Directory containing the running executable, falling back to the CWD.
pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

// ── Defaults and limits ────────────────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const DEFAULT_STORE_NAME: &str = "default";

pub const SETTINGS_FILE_NAME: &str = "vecsync_settings.json";

/// Bounded wait used by the fragment consumer between channel polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Every assistant owned by this tool carries this name prefix.
pub const ASSISTANT_PREFIX: &str = "vecsync-";

/// Settings key under which the active conversation thread is persisted.
pub const THREAD_ID_KEY: &str = "openai_thread_id";

/// Maximum allowed length (characters) for a single prompt.
pub const MAX_PROMPT_LENGTH: usize = 32_768;

/// Maximum number of bytes from an HTTP error body included in error messages.
pub const MAX_ERROR_BODY_LEN: usize = 200;

/// System instructions for newly created assistants.
pub const ASSISTANT_INSTRUCTIONS: &str = "You are a helpful research assistant that can search \
through a large number of journals and papers to help answer the user questions. You have been \
given a file store which contains the relevant documents the user is referencing. These documents \
should be your primary source of information. You may only use external knowledge if it is \
helpful in clarifying questions. It is very important that you remain factual and cite \
information from the sources provided to you in the file store. You are not allowed to make up \
information.";

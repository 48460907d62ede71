//! Configuration
//!
//! Centralized configuration loading, with a TOML file at
//! `~/.config/parecer/config.toml`.
//!
//! # Configuration Priority
//!
//! Each layer overrides the ones below it:
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [model]
//! backend = "gemini"            # or "ollama"
//! model = "gemini-2.5-flash"
//! connect_timeout_secs = 10
//! ollama_host = "localhost"
//! ollama_port = 11434
//!
//! [extraction]
//! max_document_mb = 50
//!
//! [prompt]
//! template_path = "/home/me/modelos/analise.md"
//!
//! [transcript]
//! html_out = "/home/me/analises/ultima.html"
//! ```
//!
//! The API key is never read from the file's neighbours by accident: it
//! comes from `model.api_key`, `GEMINI_API_KEY` or `API_KEY`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::DEFAULT_GEMINI_BASE_URL;
use crate::error::ComposeError;
use crate::prompt::PromptComposer;

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// =============================================================================
// Error Types
// =============================================================================

/// Failure resolving an [`AnalystConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config or template file
    #[error("Failed to read {path}: {source}")]
    ReadError {
        /// File that could not be read
        path: PathBuf,
        /// IO failure
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// The prompt template is unusable
    #[error("Invalid prompt template: {0}")]
    Template(#[from] ComposeError),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Which layer a resolved configuration was last touched by
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Which model provider to talk to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted Gemini API
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::ValidationError(format!(
                "unknown backend \"{other}\" (expected gemini or ollama)"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Model backend settings
#[derive(Clone)]
pub struct ModelConfig {
    /// Provider
    pub backend: BackendKind,
    /// Model identifier
    pub model: String,
    /// API key for hosted providers
    pub api_key: Option<String>,
    /// Base URL of the hosted API
    pub base_url: String,
    /// Ollama host address
    pub ollama_host: String,
    /// Ollama port number
    pub ollama_port: u16,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("ollama_host", &self.ollama_host)
            .field("ollama_port", &self.ollama_port)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Gemini,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            ollama_host: "localhost".to_string(),
            ollama_port: 11434,
            connect_timeout_secs: 10,
        }
    }
}

/// Centralized configuration
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct AnalystConfig {
    /// Model backend settings
    pub model: ModelConfig,

    /// Largest document accepted for extraction, in bytes
    pub max_document_bytes: u64,

    /// Custom prompt template (built-in template when `None`)
    pub template_path: Option<PathBuf>,

    /// Where `/save` writes the HTML transcript by default
    pub html_out: Option<PathBuf>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            max_document_bytes: 50 * 1024 * 1024,
            template_path: None,
            html_out: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl AnalystConfig {
    /// Built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority layer that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model.model must not be empty".to_string(),
            ));
        }
        if self.model.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "model.connect_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.model.ollama_port == 0 {
            return Err(ConfigError::ValidationError(
                "model.ollama_port must not be 0".to_string(),
            ));
        }
        if self.max_document_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "extraction.max_document_mb must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the prompt composer for the configured template
    ///
    /// # Errors
    ///
    /// Fails if the template file cannot be read or does not contain the
    /// subject marker exactly once.
    pub async fn composer(&self) -> Result<PromptComposer, ConfigError> {
        let Some(path) = &self.template_path else {
            return Ok(PromptComposer::default());
        };

        let template =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::ReadError {
                    path: path.clone(),
                    source,
                })?;
        let composer = PromptComposer::new(&template)?;

        tracing::info!(path = %path.display(), "Loaded prompt template");
        Ok(composer)
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Model section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelToml {
    /// Provider: "gemini" or "ollama"
    pub backend: Option<BackendKind>,

    /// Model identifier
    pub model: Option<String>,

    /// API key (prefer the environment)
    pub api_key: Option<String>,

    /// Base URL of the hosted API
    pub base_url: Option<String>,

    /// Ollama host address
    pub ollama_host: Option<String>,

    /// Ollama port number
    pub ollama_port: Option<u16>,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

/// Extraction section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionToml {
    /// Largest document accepted, in MiB
    pub max_document_mb: Option<u64>,
}

/// Prompt section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptToml {
    /// Path to a custom template
    pub template_path: Option<PathBuf>,
}

/// Transcript section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptToml {
    /// Default HTML export path
    pub html_out: Option<PathBuf>,
}

/// The whole `config.toml` file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParecerToml {
    /// Model configuration section
    pub model: ModelToml,

    /// Extraction configuration section
    pub extraction: ExtractionToml,

    /// Prompt configuration section
    pub prompt: PromptToml,

    /// Transcript configuration section
    pub transcript: TranscriptToml,
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Where the config file lives when `--config` is not given
///
/// Returns `$XDG_CONFIG_HOME/parecer/config.toml` or
/// `~/.config/parecer/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("parecer").join("config.toml"))
}

/// Resolve configuration from the default file and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting values are invalid. A missing config file is not an error.
pub fn load_config() -> Result<AnalystConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Resolve configuration from `path` and the process environment
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed, or if the
/// resolved values are invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<AnalystConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration using `env` to look up environment variables
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AnalystConfig, ConfigError> {
    // Start with defaults
    let mut config = AnalystConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ParecerToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, env)?;

    config.validate()?;
    Ok(config)
}

/// Copy every value present in the file over the defaults
fn apply_toml_config(config: &mut AnalystConfig, toml: &ParecerToml) {
    // Model settings
    if let Some(backend) = toml.model.backend {
        config.model.backend = backend;
    }
    if let Some(ref model) = toml.model.model {
        config.model.model = model.clone();
    }
    if toml.model.api_key.is_some() {
        config.model.api_key = toml.model.api_key.clone();
    }
    if let Some(ref url) = toml.model.base_url {
        config.model.base_url = url.clone();
    }
    if let Some(ref host) = toml.model.ollama_host {
        config.model.ollama_host = host.clone();
    }
    if let Some(port) = toml.model.ollama_port {
        config.model.ollama_port = port;
    }
    if let Some(timeout) = toml.model.connect_timeout_secs {
        config.model.connect_timeout_secs = timeout;
    }

    // Extraction settings
    if let Some(mb) = toml.extraction.max_document_mb {
        config.max_document_bytes = mb.saturating_mul(1024 * 1024);
    }

    // Prompt and transcript settings
    if toml.prompt.template_path.is_some() {
        config.template_path = toml.prompt.template_path.clone();
    }
    if toml.transcript.html_out.is_some() {
        config.html_out = toml.transcript.html_out.clone();
    }
}

/// Overlay `PARECER_*`, `OLLAMA_*` and API key variables
///
/// Unparseable numeric values are ignored; an unknown backend name is an
/// error since silently talking to the wrong provider is worse.
fn apply_env_config(
    config: &mut AnalystConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let mut from_env = false;
    let model = &mut config.model;

    if let Some(key) = env("GEMINI_API_KEY").or_else(|| env("API_KEY")) {
        model.api_key = Some(key);
        from_env = true;
    }
    if let Some(backend) = env("PARECER_BACKEND") {
        model.backend = backend.parse()?;
        from_env = true;
    }
    if let Some(id) = env("PARECER_MODEL") {
        model.model = id;
        from_env = true;
    }
    if let Some(url) = env("PARECER_BASE_URL") {
        model.base_url = url;
        from_env = true;
    }
    if let Some(host) = env("OLLAMA_HOST") {
        model.ollama_host = host;
        from_env = true;
    }
    if let Some(port) = env("OLLAMA_PORT").and_then(|v| v.parse::<u16>().ok()) {
        model.ollama_port = port;
        from_env = true;
    }
    if let Some(secs) = env("PARECER_CONNECT_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        model.connect_timeout_secs = secs;
        from_env = true;
    }
    if let Some(path) = env("PARECER_TEMPLATE") {
        config.template_path = Some(PathBuf::from(path));
        from_env = true;
    }
    if let Some(path) = env("PARECER_HTML_OUT") {
        config.html_out = Some(PathBuf::from(path));
        from_env = true;
    }

    if from_env {
        config.source = ConfigSource::Env;
    }
    Ok(())
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line values, applied last
///
/// Only the settings a user plausibly changes per run are overridable.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend override
    pub backend: Option<BackendKind>,

    /// Model override
    pub model: Option<String>,

    /// Template path override
    pub template_path: Option<PathBuf>,

    /// HTML export path override
    pub html_out: Option<PathBuf>,
}

impl ConfigOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend override
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set template path override
    #[must_use]
    pub fn with_template_path(mut self, path: PathBuf) -> Self {
        self.template_path = Some(path);
        self
    }

    /// Set HTML export path override
    #[must_use]
    pub fn with_html_out(mut self, path: PathBuf) -> Self {
        self.html_out = Some(path);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override produces an
    /// invalid configuration.
    pub fn apply(&self, config: &mut AnalystConfig) -> Result<(), ConfigError> {
        if self.backend.is_some()
            || self.model.is_some()
            || self.template_path.is_some()
            || self.html_out.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(backend) = self.backend {
            config.model.backend = backend;
        }
        if let Some(ref model) = self.model {
            config.model.model = model.clone();
        }
        if let Some(ref path) = self.template_path {
            config.template_path = Some(path.clone());
        }
        if let Some(ref path) = self.html_out {
            config.html_out = Some(path.clone());
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! # Configuration
//!
//! Application settings shared by the CLI and the HTTP server.
//!
//! ## Resolution order (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file: `--config <path>`, or `curriculum.toml` in the working
//!    directory if it exists
//! 3. Environment: `CURRICULUM_DATABASE`, `CURRICULUM_API_KEY`,
//!    `CURRICULUM_CORS_ORIGINS`, `CURRICULUM_LOG_FORMAT`
//! 4. CLI flags (applied by the command layer)
//!
//! ## Example
//!
//! ```toml
//! database = "curriculum.db"
//! log_format = "json"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! api_key = "change-me"
//! cors_origins = ["https://admin.example.org"]
//!
//! [import]
//! strict_references = false
//! max_archive_bytes = 16777216
//! ```

use curriculum_core::{CurriculumError, primitives::MAX_ARCHIVE_BYTES};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "curriculum.toml";

/// Database path used when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "curriculum.db";

// =============================================================================
// SECTIONS
// =============================================================================

/// Log output format of the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse `text` or `json`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required by `POST /import`. Unset disables the check.
    pub api_key: Option<String>,
    /// Allowed CORS origins; empty means localhost only, `"*"` allows all.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
            cors_origins: Vec::new(),
        }
    }
}

/// `[import]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub strict_references: bool,
    pub max_archive_bytes: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            strict_references: false,
            max_archive_bytes: MAX_ARCHIVE_BYTES,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Fully resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: PathBuf,
    pub log_format: LogFormat,
    pub server: ServerConfig,
    pub import: ImportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            log_format: LogFormat::default(),
            server: ServerConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Resolve defaults, the TOML file and the process environment.
    ///
    /// An explicit `path` must exist; the implicit `curriculum.toml` is
    /// only read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, CurriculumError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.is_file() {
                    Self::from_file(implicit)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, CurriculumError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CurriculumError::IoError(format!("Read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text. Missing keys keep their defaults; unknown keys are
    /// rejected.
    pub fn from_toml(text: &str) -> Result<Self, CurriculumError> {
        toml::from_str(text)
            .map_err(|e| CurriculumError::InvalidInput(format!("Invalid configuration: {}", e)))
    }

    /// Apply environment overrides through `lookup`. Empty values are
    /// ignored, as are unknown log formats.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(database) = var("CURRICULUM_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(key) = var("CURRICULUM_API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Some(origins) = var("CURRICULUM_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(format) = var("CURRICULUM_LOG_FORMAT").and_then(|f| LogFormat::parse(&f)) {
            self.log_format = format;
        }
    }

    /// The configured API key, if authentication is enabled.
    pub fn api_key(&self) -> Option<&str> {
        self.server.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Archive size limit for the HTTP body and the CLI reader. Never looser
    /// than the engine's own limit.
    pub fn archive_limit(&self) -> usize {
        self.import.max_archive_bytes.min(MAX_ARCHIVE_BYTES)
    }
}

// =============================================================================
// TESTS
// =============================================================================

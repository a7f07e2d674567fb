//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSCRUB_CONFIG` (environment variable)
//! 2. `~/.config/mailscrub/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailscrub\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Only defaults and operator knobs live here; source, destination, and
//! attachment locations are always explicit CLI arguments.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Attachment defaults.
    pub attach: AttachConfig,
    /// Batch-mode settings.
    pub batch: BatchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Attachment defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachConfig {
    /// Content type used when `--attach-type` is not given.
    pub content_type: String,
}

/// Batch-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// File extension to pick up from the input directory.
    pub extension: String,
    /// Abort on the first failed message instead of warning and continuing.
    pub fail_fast: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            content_type: "application/pdf".to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extension: "eml".to_string(),
            fail_fast: false,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILSCRUB_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mailscrub").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailscrub")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.attach.content_type, "application/pdf");
        assert_eq!(cfg.batch.extension, "eml");
        assert!(!cfg.batch.fail_fast);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
        assert_eq!(parsed.attach.content_type, cfg.attach.content_type);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[batch]
fail_fast = true
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(cfg.batch.fail_fast);
        // Other fields use defaults
        assert_eq!(cfg.batch.extension, "eml");
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_config_file_path_resolves() {
        // Should return Some on most systems (has config dir).
        // On CI it might be None, so just verify it doesn't panic.
        let _ = config_file_path();
    }
}

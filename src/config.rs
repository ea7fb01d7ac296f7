use crate::chart::RenderMode;
use crate::counter::{CountOptions, DEFAULT_CONFIDENCE_THRESHOLD, UnknownTagPolicy};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "FRAMECOUNT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid tag pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub counting: CountingConfig,
    #[serde(default)]
    pub output_formatting: OutputFormattingConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    pub confidence_threshold: f64,
    pub unknown_tags: UnknownTagPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFormattingConfig {
    pub color: bool,
    pub bar_width: usize,
    pub render_mode: RenderMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub tag_pattern: String,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            unknown_tags: UnknownTagPolicy::Reject,
        }
    }
}

impl Default for OutputFormattingConfig {
    fn default() -> Self {
        Self {
            color: true,
            bar_width: 40,
            render_mode: RenderMode::Bar,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tag_pattern: r"^\S(.*\S)?$".to_string(),
        }
    }
}

impl CountingConfig {
    pub fn options(&self) -> CountOptions {
        CountOptions {
            confidence_threshold: self.confidence_threshold,
            unknown_tags: self.unknown_tags,
        }
    }
}

impl ValidationConfig {
    pub fn tag_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.tag_pattern).map_err(|source| ConfigError::Pattern {
            pattern: self.tag_pattern.clone(),
            source,
        })
    }
}

impl CliConfig {
    /// Load the user config, falling back to defaults when there is none.
    ///
    /// A file that exists but cannot be parsed is an error rather than
    /// silently ignored.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::resolved_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `$FRAMECOUNT_CONFIG` if set, otherwise the platform config file.
    pub fn resolved_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(Self::config_file_path)
    }

    pub fn config_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|mut path| {
            path.push("config.toml");
            path
        })
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("framecount");
            path
        })
    }
}

//! Configuration for codemap

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "CODEMAP_CONFIG";

/// User configuration, read from `~/.config/codemap/config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Output line count at which codemap warns or prompts
    #[serde(default = "default_line_limit")]
    pub line_limit: usize,

    /// Lines shown when choosing "head" at the prompt
    #[serde(default = "default_head_lines")]
    pub head_lines: usize,

    /// Index document filename looked up in the project root
    #[serde(default = "default_index_filename")]
    pub index_filename: String,

    /// Project ignore file with extra exclusion patterns
    #[serde(default = "default_ignore_filename")]
    pub ignore_filename: String,

    /// Patterns added to the built-in excludes for every project
    #[serde(default)]
    pub extra_excludes: Vec<String>,
}

fn default_line_limit() -> usize {
    100
}

fn default_head_lines() -> usize {
    50
}

fn default_index_filename() -> String {
    "PROJECT_INDEX.json".to_string()
}

fn default_ignore_filename() -> String {
    ".codemapignore".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line_limit: default_line_limit(),
            head_lines: default_head_lines(),
            index_filename: default_index_filename(),
            ignore_filename: default_ignore_filename(),
            extra_excludes: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Load from the standard location; a broken config falls back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                config
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "using default config");
                Self::default()
            }
        }
    }

    /// `$CODEMAP_CONFIG`, else `<config dir>/codemap/config.json`
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("codemap").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let tmp = TempDir::new()?;
        let config = Config::load(&tmp.path().join("config.json"))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.line_limit, 100);
        assert_eq!(config.head_lines, 50);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"line_limit": 300, "extra_excludes": ["*.snap"]}"#)?;

        let config = Config::load(&path)?;
        assert_eq!(config.line_limit, 300);
        assert_eq!(config.extra_excludes, vec!["*.snap"]);
        assert_eq!(config.index_filename, "PROJECT_INDEX.json");
        Ok(())
    }

    #[test]
    fn test_invalid_file_is_an_error() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ nope")?;
        assert!(Config::load(&path).is_err());
        Ok(())
    }
}

//! CLI configuration (`treemerge.toml`).
//!
//! Supplies defaults for flags the user did not pass. Command-line flags
//! always win over the file.
//!
//! ```toml
//! [merge]
//! mode = "update"
//! verify_result = true
//!
//! [output]
//! format = "json"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use treemerge_core::merge::{MergeMode, MergeOptions};

use crate::report::OutputFormat;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "treemerge.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration. Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreemergeConfig {
    /// Merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Report rendering.
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Merge behaviour settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// `merge` aborts on items without a common basis; `update` keeps the
    /// baseline version and reports them.
    #[serde(default)]
    pub mode: MergeMode,

    /// Check the result is a well-formed tree before reporting it.
    #[serde(default = "default_verify_result")]
    pub verify_result: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            mode: MergeMode::default(),
            verify_result: default_verify_result(),
        }
    }
}

const fn default_verify_result() -> bool {
    true
}

impl MergeConfig {
    /// Engine options for these settings.
    #[must_use]
    pub fn to_options(&self) -> MergeOptions {
        MergeOptions {
            mode: self.mode,
            verify_result: self.verify_result,
            ..MergeOptions::default()
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{}: {}", p.display(), self.message),
            None => write!(f, "config error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl TreemergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults. Invalid TOML or unknown keys
    /// yield a [`ConfigError`] naming the file and line.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start].chars().filter(|&c| c == '\n').count() + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;

    #[test]
    fn defaults_all_fields() {
        let cfg = TreemergeConfig::default();
        assert_eq!(cfg.merge.mode, MergeMode::Merge);
        assert!(cfg.merge.verify_result);
        assert_eq!(cfg.output.format, OutputFormat::Text);
    }

    #[test]
    fn parse_empty_string() {
        assert_eq!(TreemergeConfig::parse("").unwrap(), TreemergeConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[merge]
mode = "update"
verify_result = false

[output]
format = "json"
"#;
        let cfg = TreemergeConfig::parse(toml).unwrap();
        assert_eq!(cfg.merge.mode, MergeMode::Update);
        assert!(!cfg.merge.verify_result);
        assert_eq!(cfg.output.format, OutputFormat::Json);

        let opts = cfg.merge.to_options();
        assert_eq!(opts.mode, MergeMode::Update);
        assert!(!opts.verify_result);
        assert!(opts.found.is_empty());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = TreemergeConfig::parse("[merge]\nstrategy = \"ours\"\n").unwrap_err();
        assert!(err.message.contains("unknown field"), "{}", err.message);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = TreemergeConfig::parse("[merge]\nmode = \"rebase\"\n").unwrap_err();
        assert!(err.message.contains("unknown variant"), "{}", err.message);
    }

    #[test]
    fn parse_includes_line_number_on_error() {
        let err = TreemergeConfig::parse("[merge]\n\nverify_result = 3\n").unwrap_err();
        assert!(err.message.contains("line 3"), "{}", err.message);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = TreemergeConfig::load(Path::new("/nonexistent/treemerge.toml")).unwrap();
        assert_eq!(cfg, TreemergeConfig::default());
    }

    #[test]
    fn load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treemerge.toml");
        std::fs::write(&path, "[output]\nformat = \"json\"\n").unwrap();
        let cfg = TreemergeConfig::load(&path).unwrap();
        assert_eq!(cfg.output.format, OutputFormat::Json);
        assert_eq!(cfg.merge, MergeConfig::default());
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = TreemergeConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(format!("{err}").contains("bad.toml"));
    }

    #[test]
    fn config_error_display_without_path() {
        let err = ConfigError {
            path: None,
            message: "parse error".to_owned(),
        };
        assert_eq!(format!("{err}"), "config error: parse error");
    }
}

//! Configuration management for marq.
//!
//! Parses `marq.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! Programmatic settings can be applied during load via [`Overrides`].
//!
//! ## Example
//!
//! ```toml
//! [markdown]
//! output_format = "html"
//! tab_length = 4
//!
//! [limits]
//! max_nesting_depth = 50
//!
//! [extensions]
//! enabled = ["admonition"]
//!
//! [extensions.options.admonition]
//! class = "note"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct Overrides {
    /// Override output markup flavor.
    pub output_format: Option<OutputFormat>,
    /// Override tab length.
    pub tab_length: Option<usize>,
    /// Override lazy ordered list numbering.
    pub lazy_ol: Option<bool>,
    /// Extensions to enable in addition to the configured ones.
    pub extra_extensions: Vec<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "marq.toml";

/// Converter configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Markup dialect settings.
    pub markdown: MarkdownConfig,
    /// Step budgets for block and inline matching.
    pub limits: LimitsConfig,
    /// Extension selection and per-extension options.
    pub extensions: ExtensionsConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Serialized markup flavor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// XHTML: void elements render as `<br />`.
    #[default]
    Xhtml,
    /// HTML: void elements render as `<br>`.
    Html,
}

/// Markup dialect configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Serialized markup flavor.
    pub output_format: OutputFormat,
    /// Number of columns a tab expands to; also the indent of code blocks and nested lists.
    pub tab_length: usize,
    /// Ignore the first number of an ordered list (no `start` attribute).
    pub lazy_ol: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Xhtml,
            tab_length: 4,
            lazy_ol: true,
        }
    }
}

/// Step budgets guarding against pathological input.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum depth of recursive block matching (nested quotes and lists).
    pub max_nesting_depth: usize,
    /// Maximum depth of nested inline matching (emphasis inside links inside emphasis...).
    pub max_inline_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 100,
            max_inline_depth: 64,
        }
    }
}

/// Extension configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Extension names, applied in order.
    pub enabled: Vec<String>,
    /// Options keyed by extension name.
    pub options: BTreeMap<String, toml::Table>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a numeric field to be at least one.
fn require_positive(value: usize, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional overrides.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `marq.toml` in current directory and parents,
    /// falling back to defaults when none exists.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        overrides: Option<&Overrides>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_from(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
            config.validate()?;
        }

        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Validation` for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the nearest `marq.toml` in `start` or its parents.
    ///
    /// Returns the default configuration when no file exists.
    ///
    /// # Errors
    ///
    /// Returns error if the discovered file cannot be read, parsed or validated.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        match Self::discover_from(start) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Search for a config file in `start` and its parents.
    #[must_use]
    pub fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Options table for an extension, if the config provides one.
    #[must_use]
    pub fn extension_options(&self, name: &str) -> Option<&toml::Table> {
        self.extensions.options.get(name)
    }

    /// Apply overrides to the configuration.
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(format) = overrides.output_format {
            self.markdown.output_format = format;
        }
        if let Some(tab_length) = overrides.tab_length {
            self.markdown.tab_length = tab_length;
        }
        if let Some(lazy_ol) = overrides.lazy_ol {
            self.markdown.lazy_ol = lazy_ol;
        }
        for name in &overrides.extra_extensions {
            if !self.extensions.enabled.contains(name) {
                self.extensions.enabled.push(name.clone());
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after parsing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive(self.markdown.tab_length, "markdown.tab_length")?;
        require_positive(self.limits.max_nesting_depth, "limits.max_nesting_depth")?;
        require_positive(self.limits.max_inline_depth, "limits.max_inline_depth")?;
        self.validate_extensions()
    }

    /// Validate extension configuration.
    fn validate_extensions(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for name in &self.extensions.enabled {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "extensions.enabled cannot contain an empty name".to_owned(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "extension {name} is enabled more than once"
                )));
            }
        }
        for name in self.extensions.options.keys() {
            if !seen.contains(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "options given for extension {name}, which is not enabled"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.markdown.output_format, OutputFormat::Xhtml);
        assert_eq!(config.markdown.tab_length, 4);
        assert!(config.markdown.lazy_ol);
        assert_eq!(config.limits.max_nesting_depth, 100);
        assert_eq!(config.limits.max_inline_depth, 64);
        assert!(config.extensions.enabled.is_empty());
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.markdown.tab_length, 4);
        assert_eq!(config.markdown.output_format, OutputFormat::Xhtml);
    }

    #[test]
    fn test_parse_markdown_config() {
        let toml = r#"
[markdown]
output_format = "html"
tab_length = 2
lazy_ol = false
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.markdown.output_format, OutputFormat::Html);
        assert_eq!(config.markdown.tab_length, 2);
        assert!(!config.markdown.lazy_ol);
    }

    #[test]
    fn test_parse_extensions_config() {
        let toml = r#"
[extensions]
enabled = ["first", "second"]

[extensions.options.second]
marker = "!"
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.extensions.enabled, vec!["first", "second"]);
        let options = config.extension_options("second").unwrap();
        assert_eq!(options.get("marker").and_then(|v| v.as_str()), Some("!"));
        assert!(config.extension_options("first").is_none());
    }

    #[test]
    fn test_unknown_output_format_is_parse_error() {
        let toml = r#"
[markdown]
output_format = "rtf"
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn test_zero_tab_length_rejected() {
        let toml = r"
[markdown]
tab_length = 0
";
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("markdown.tab_length"));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let toml = r"
[limits]
max_inline_depth = 0
";
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("limits.max_inline_depth"));
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let toml = r#"
[extensions]
enabled = ["a", "a"]
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_options_for_disabled_extension_rejected() {
        let toml = r#"
[extensions]
enabled = []

[extensions.options.ghost]
x = 1
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let overrides = Overrides {
            output_format: Some(OutputFormat::Html),
            extra_extensions: vec!["extra".to_owned()],
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.markdown.output_format, OutputFormat::Html);
        assert_eq!(config.markdown.tab_length, 4); // Unchanged
        assert_eq!(config.extensions.enabled, vec!["extra"]);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[markdown]\ntab_length = 8\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.markdown.tab_length, 8);
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = Config::load(Some(&path), None).unwrap_err();

        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_with_invalid_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = Overrides {
            tab_length: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_discover_from_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();

        let found = Config::discover_from(&nested);

        assert_eq!(found, Some(dir.path().join(CONFIG_FILENAME)));
    }

    #[test]
    fn test_discover_nearest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("inner");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();
        std::fs::write(nested.join(CONFIG_FILENAME), "").unwrap();

        let found = Config::discover_from(&nested);

        assert_eq!(found, Some(nested.join(CONFIG_FILENAME)));
    }

    #[test]
    fn test_discover_loads_nearest_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("docs");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILENAME),
            "[markdown]\noutput_format = \"html\"\n",
        )
        .unwrap();

        let config = Config::discover(&nested).unwrap();

        assert_eq!(config.markdown.output_format, OutputFormat::Html);
        assert_eq!(config.config_path, Some(dir.path().join(CONFIG_FILENAME)));
    }

    #[test]
    fn test_discover_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "[limits]\nmax_inline_depth = 0\n").unwrap();

        let err = Config::discover(dir.path()).unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
    }
}

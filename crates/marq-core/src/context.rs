//! Runtime settings and per-conversion state.

use std::collections::HashMap;

use marq_config::{Config, ConfigError, OutputFormat};

use crate::inline::InlinePattern;
use crate::registry::Registry;
use crate::stash::Stash;

/// Settings shared by every stage of a converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Serialized markup flavor.
    pub output_format: OutputFormat,
    /// Columns per tab stop and per indentation level.
    pub tab_length: usize,
    /// Ignore the first number of ordered lists.
    pub lazy_ol: bool,
    /// Maximum depth of recursive block matching.
    pub max_nesting_depth: usize,
    /// Maximum depth of nested inline matching.
    pub max_inline_depth: usize,
    /// Tag of the document root element.
    pub root_tag: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            output_format: config.markdown.output_format,
            tab_length: config.markdown.tab_length,
            lazy_ol: config.markdown.lazy_ol,
            max_nesting_depth: config.limits.max_nesting_depth,
            max_inline_depth: config.limits.max_inline_depth,
            root_tag: "div".to_owned(),
        }
    }
}

impl Settings {
    /// Check the limits every stage relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first zero-valued limit
    /// or an empty root tag.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (value, field) in [
            (self.tab_length, "tab_length"),
            (self.max_nesting_depth, "max_nesting_depth"),
            (self.max_inline_depth, "max_inline_depth"),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{field} must be greater than 0"
                )));
            }
        }
        if self.root_tag.trim().is_empty() {
            return Err(ConfigError::Validation(
                "root_tag cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Target of a link reference definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    /// Link destination.
    pub url: String,
    /// Optional link title.
    pub title: Option<String>,
}

/// State owned by exactly one conversion.
///
/// Created fresh for every call to [`Converter::convert`](crate::Converter::convert),
/// so nothing leaks between conversions and one converter can serve several
/// threads at once.
pub struct Context<'a> {
    settings: &'a Settings,
    patterns: &'a Registry<Box<dyn InlinePattern>>,
    /// Protected raw content.
    pub stash: Stash,
    /// Link reference definitions keyed by normalized label.
    pub references: HashMap<String, LinkReference>,
    nesting_budget_hit: bool,
    inline_budget_hit: bool,
}

impl<'a> Context<'a> {
    /// Create an empty context.
    #[must_use]
    pub fn new(settings: &'a Settings, patterns: &'a Registry<Box<dyn InlinePattern>>) -> Self {
        Self {
            settings,
            patterns,
            stash: Stash::new(),
            references: HashMap::new(),
            nesting_budget_hit: false,
            inline_budget_hit: false,
        }
    }

    /// Converter settings.
    #[must_use]
    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    /// Inline pattern rules, highest priority first.
    #[must_use]
    pub fn patterns(&self) -> &'a Registry<Box<dyn InlinePattern>> {
        self.patterns
    }

    /// Clear all per-conversion state.
    pub fn reset(&mut self) {
        self.stash.reset();
        self.references.clear();
        self.nesting_budget_hit = false;
        self.inline_budget_hit = false;
    }

    /// Record that block nesting hit its budget; logs once per conversion.
    pub(crate) fn note_nesting_budget(&mut self) {
        if !self.nesting_budget_hit {
            self.nesting_budget_hit = true;
            tracing::warn!(
                limit = self.settings.max_nesting_depth,
                "Block nesting limit reached; deeper content kept as plain paragraphs"
            );
        }
    }

    /// Record that inline nesting hit its budget; logs once per conversion.
    pub(crate) fn note_inline_budget(&mut self) {
        if !self.inline_budget_hit {
            self.inline_budget_hit = true;
            tracing::warn!(
                limit = self.settings.max_inline_depth,
                "Inline nesting limit reached; deeper content kept as literal text"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = Config::from_toml_str("[markdown]\ntab_length = 2\nlazy_ol = false").unwrap();
        let settings = Settings::from(&config);
        assert_eq!(settings.tab_length, 2);
        assert!(!settings.lazy_ol);
        assert_eq!(settings.output_format, OutputFormat::Xhtml);
        assert_eq!(settings.root_tag, "div");
    }

    #[test]
    fn test_settings_validate() {
        assert!(Settings::default().validate().is_ok());

        let settings = Settings {
            tab_length: 0,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: tab_length must be greater than 0"
        );

        let settings = Settings {
            max_inline_depth: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(m)) if m.contains("max_inline_depth")));

        let settings = Settings {
            root_tag: String::new(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_context_reset() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);
        cx.stash.store("x");
        cx.references.insert(
            "a".to_owned(),
            LinkReference {
                url: "/a".to_owned(),
                title: None,
            },
        );

        cx.reset();

        assert!(cx.stash.is_empty());
        assert!(cx.references.is_empty());
    }
}

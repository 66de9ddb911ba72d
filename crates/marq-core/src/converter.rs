//! Pipeline orchestration: setup through [`ConverterBuilder`], conversion
//! through [`Converter`].
//!
//! Registries are only mutable on the builder. A built [`Converter`] is
//! read-only and creates a fresh [`Context`] for every conversion, so one
//! instance can be shared across threads.

use marq_config::Config;

use crate::blocks::{BlockParser, BlockRule, builtin_rules};
use crate::context::{Context, Settings};
use crate::error::{ConfigurationError, ConvertError};
use crate::extension::{Extension, ExtensionCatalog};
use crate::inline::{InlinePattern, builtin_patterns};
use crate::postprocessors::{AmpSubstitutePostprocessor, Postprocessor, UnstashPostprocessor};
use crate::preprocessors::{HtmlBlockPreprocessor, NormalizeWhitespace, Preprocessor};
use crate::registry::{Placement, Registry};
use crate::serializer::serialize;
use crate::stash::StashStats;
use crate::tree::Element;
use crate::treeprocessors::{InlineProcessor, PrettifyProcessor, TreeProcessor, validate_tree};

/// Stages a converter cannot work without, as `(registry, name)`.
const REQUIRED_STAGES: &[(&str, &str)] = &[
    ("block", "paragraph"),
    ("tree processor", "inline"),
    ("postprocessor", "unstash"),
];

/// Result of [`Converter::convert_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Final output text.
    pub output: String,
    /// Tree after all tree processors ran.
    pub tree: Element,
    /// Stash usage of this conversion.
    pub stash: StashStats,
}

/// Mutable setup phase of a [`Converter`].
///
/// [`new`](Self::new) registers the built-in stages; extensions then add,
/// replace or remove entries before [`build`](Self::build) freezes them.
pub struct ConverterBuilder {
    settings: Settings,
    preprocessors: Registry<Box<dyn Preprocessor>>,
    block_rules: Registry<Box<dyn BlockRule>>,
    inline_patterns: Registry<Box<dyn InlinePattern>>,
    tree_processors: Registry<Box<dyn TreeProcessor>>,
    postprocessors: Registry<Box<dyn Postprocessor>>,
    extensions: Vec<String>,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    /// Create a builder with default settings and the built-in stages.
    #[must_use]
    pub fn new() -> Self {
        let mut preprocessors: Registry<Box<dyn Preprocessor>> = Registry::new();
        preprocessors.insert("normalize_whitespace", Box::new(NormalizeWhitespace), 30.0);
        preprocessors.insert("html_block", Box::new(HtmlBlockPreprocessor), 20.0);

        let mut tree_processors: Registry<Box<dyn TreeProcessor>> = Registry::new();
        tree_processors.insert("inline", Box::new(InlineProcessor), 20.0);
        tree_processors.insert("prettify", Box::new(PrettifyProcessor), 10.0);

        let mut postprocessors: Registry<Box<dyn Postprocessor>> = Registry::new();
        postprocessors.insert("amp_substitute", Box::new(AmpSubstitutePostprocessor), 20.0);
        postprocessors.insert("unstash", Box::new(UnstashPostprocessor), 0.0);

        Self {
            settings: Settings::default(),
            preprocessors,
            block_rules: builtin_rules(),
            inline_patterns: builtin_patterns(),
            tree_processors,
            postprocessors,
            extensions: Vec::new(),
        }
    }

    /// Create a builder from configuration, applying every enabled extension
    /// from `catalog` in the configured order.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, names an unknown
    /// extension, or an extension fails to register.
    pub fn from_config(
        config: &Config,
        catalog: &ExtensionCatalog,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let mut builder = Self::new().with_settings(Settings::from(config));
        for name in &config.extensions.enabled {
            let extension = catalog.instantiate(name, config.extension_options(name))?;
            builder.apply(extension.as_ref())?;
        }
        Ok(builder)
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Apply `extension`, builder style.
    ///
    /// # Errors
    ///
    /// Returns whatever the extension's registration returns.
    pub fn with_extension(mut self, extension: &dyn Extension) -> Result<Self, ConfigurationError> {
        self.apply(extension)?;
        Ok(self)
    }

    /// Apply `extension`.
    ///
    /// # Errors
    ///
    /// Returns whatever the extension's registration returns.
    pub fn apply(&mut self, extension: &dyn Extension) -> Result<(), ConfigurationError> {
        tracing::debug!(extension = extension.name(), "Applying extension");
        extension.extend(self)?;
        self.extensions.push(extension.name().to_owned());
        Ok(())
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable settings.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Register a preprocessor, returning its resolved priority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Registry`] if the placement cannot be resolved.
    pub fn register_preprocessor(
        &mut self,
        name: impl Into<String>,
        item: Box<dyn Preprocessor>,
        placement: impl Into<Placement>,
    ) -> Result<f64, ConfigurationError> {
        self.preprocessors
            .register_at(name, item, placement)
            .map_err(|e| ConfigurationError::registry("preprocessor", e))
    }

    /// Register a block rule, returning its resolved priority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Registry`] if the placement cannot be resolved.
    pub fn register_block_rule(
        &mut self,
        name: impl Into<String>,
        item: Box<dyn BlockRule>,
        placement: impl Into<Placement>,
    ) -> Result<f64, ConfigurationError> {
        self.block_rules
            .register_at(name, item, placement)
            .map_err(|e| ConfigurationError::registry("block", e))
    }

    /// Register an inline pattern, returning its resolved priority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Registry`] if the placement cannot be resolved.
    pub fn register_inline_pattern(
        &mut self,
        name: impl Into<String>,
        item: Box<dyn InlinePattern>,
        placement: impl Into<Placement>,
    ) -> Result<f64, ConfigurationError> {
        self.inline_patterns
            .register_at(name, item, placement)
            .map_err(|e| ConfigurationError::registry("inline", e))
    }

    /// Register a tree processor, returning its resolved priority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Registry`] if the placement cannot be resolved.
    pub fn register_tree_processor(
        &mut self,
        name: impl Into<String>,
        item: Box<dyn TreeProcessor>,
        placement: impl Into<Placement>,
    ) -> Result<f64, ConfigurationError> {
        self.tree_processors
            .register_at(name, item, placement)
            .map_err(|e| ConfigurationError::registry("tree processor", e))
    }

    /// Register a postprocessor, returning its resolved priority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Registry`] if the placement cannot be resolved.
    pub fn register_postprocessor(
        &mut self,
        name: impl Into<String>,
        item: Box<dyn Postprocessor>,
        placement: impl Into<Placement>,
    ) -> Result<f64, ConfigurationError> {
        self.postprocessors
            .register_at(name, item, placement)
            .map_err(|e| ConfigurationError::registry("postprocessor", e))
    }

    /// Preprocessor registry, for removal or inspection.
    pub fn preprocessors_mut(&mut self) -> &mut Registry<Box<dyn Preprocessor>> {
        &mut self.preprocessors
    }

    /// Block rule registry.
    pub fn block_rules_mut(&mut self) -> &mut Registry<Box<dyn BlockRule>> {
        &mut self.block_rules
    }

    /// Inline pattern registry.
    pub fn inline_patterns_mut(&mut self) -> &mut Registry<Box<dyn InlinePattern>> {
        &mut self.inline_patterns
    }

    /// Tree processor registry.
    pub fn tree_processors_mut(&mut self) -> &mut Registry<Box<dyn TreeProcessor>> {
        &mut self.tree_processors
    }

    /// Postprocessor registry.
    pub fn postprocessors_mut(&mut self) -> &mut Registry<Box<dyn Postprocessor>> {
        &mut self.postprocessors
    }

    /// Freeze the registries into a [`Converter`].
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Configuration`] if the settings carry a zero
    /// limit or tab length, and [`ConvertError::InvariantViolation`] if a
    /// required stage (`paragraph`, `inline` or `unstash`) was removed.
    pub fn build(self) -> Result<Converter, ConvertError> {
        self.settings.validate().map_err(ConfigurationError::from)?;

        for (registry, name) in REQUIRED_STAGES {
            let present = match *registry {
                "block" => self.block_rules.contains(name),
                "tree processor" => self.tree_processors.contains(name),
                _ => self.postprocessors.contains(name),
            };
            if !present {
                return Err(ConvertError::InvariantViolation(format!(
                    "required {registry} stage `{name}` is not registered"
                )));
            }
        }

        tracing::debug!(
            preprocessors = self.preprocessors.len(),
            block_rules = self.block_rules.len(),
            inline_patterns = self.inline_patterns.len(),
            tree_processors = self.tree_processors.len(),
            postprocessors = self.postprocessors.len(),
            extensions = ?self.extensions,
            "Converter built"
        );
        Ok(Converter {
            settings: self.settings,
            preprocessors: self.preprocessors,
            block_rules: self.block_rules,
            inline_patterns: self.inline_patterns,
            tree_processors: self.tree_processors,
            postprocessors: self.postprocessors,
            extensions: self.extensions,
        })
    }
}

/// A configured, read-only conversion pipeline.
///
/// # Example
///
/// ```
/// use marq_core::Converter;
///
/// let converter = Converter::new();
/// let html = converter.convert("Some *emphasis* here.")?;
/// assert_eq!(html, "<p>Some <em>emphasis</em> here.</p>");
/// # Ok::<(), marq_core::ConvertError>(())
/// ```
pub struct Converter {
    settings: Settings,
    preprocessors: Registry<Box<dyn Preprocessor>>,
    block_rules: Registry<Box<dyn BlockRule>>,
    inline_patterns: Registry<Box<dyn InlinePattern>>,
    tree_processors: Registry<Box<dyn TreeProcessor>>,
    postprocessors: Registry<Box<dyn Postprocessor>>,
    extensions: Vec<String>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// Converter with the built-in stages and default settings.
    #[must_use]
    pub fn new() -> Self {
        let builder = ConverterBuilder::new();
        Self {
            settings: builder.settings,
            preprocessors: builder.preprocessors,
            block_rules: builder.block_rules,
            inline_patterns: builder.inline_patterns,
            tree_processors: builder.tree_processors,
            postprocessors: builder.postprocessors,
            extensions: builder.extensions,
        }
    }

    /// Start configuring a converter.
    #[must_use]
    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::new()
    }

    /// Build a converter from configuration and an extension catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, names an unknown
    /// extension, or an extension breaks a required stage.
    pub fn from_config(config: &Config, catalog: &ExtensionCatalog) -> Result<Self, ConvertError> {
        ConverterBuilder::from_config(config, catalog)?.build()
    }

    /// Converter settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Names of the applied extensions, in application order.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Preprocessors, highest priority first.
    #[must_use]
    pub fn preprocessors(&self) -> &Registry<Box<dyn Preprocessor>> {
        &self.preprocessors
    }

    /// Block rules, highest priority first.
    #[must_use]
    pub fn block_rules(&self) -> &Registry<Box<dyn BlockRule>> {
        &self.block_rules
    }

    /// Inline patterns, highest priority first.
    #[must_use]
    pub fn inline_patterns(&self) -> &Registry<Box<dyn InlinePattern>> {
        &self.inline_patterns
    }

    /// Tree processors, highest priority first.
    #[must_use]
    pub fn tree_processors(&self) -> &Registry<Box<dyn TreeProcessor>> {
        &self.tree_processors
    }

    /// Postprocessors, highest priority first.
    #[must_use]
    pub fn postprocessors(&self) -> &Registry<Box<dyn Postprocessor>> {
        &self.postprocessors
    }

    /// Convert `source` to output text.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::InvariantViolation`] if a tree processor leaves
    /// a malformed tree. Irregular source text never fails.
    pub fn convert(&self, source: &str) -> Result<String, ConvertError> {
        self.convert_document(source).map(|conversion| conversion.output)
    }

    /// Convert `source`, also returning the final tree and stash statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::InvariantViolation`] if a tree processor leaves
    /// a malformed tree.
    pub fn convert_document(&self, source: &str) -> Result<Conversion, ConvertError> {
        let root_tag = self.settings.root_tag.as_str();
        if source.trim().is_empty() {
            return Ok(Conversion {
                output: String::new(),
                tree: Element::new(root_tag),
                stash: StashStats::default(),
            });
        }

        tracing::debug!(bytes = source.len(), "Conversion started");
        let mut cx = Context::new(&self.settings, &self.inline_patterns);

        let mut lines: Vec<String> = source.split('\n').map(str::to_owned).collect();
        for (name, preprocessor) in self.preprocessors.iter() {
            tracing::debug!(stage = name, "Running preprocessor");
            lines = preprocessor.run(lines, &mut cx);
        }

        let mut root = BlockParser::new(&self.block_rules, &mut cx).parse_document(&lines);
        tracing::debug!(blocks = root.children.len(), "Block tree built");

        for (name, processor) in self.tree_processors.iter() {
            tracing::debug!(stage = name, "Running tree processor");
            processor.run(&mut root, &mut cx)?;
            validate_tree(&root, root_tag, name)?;
        }

        let mut output = serialize(&root, self.settings.output_format);
        for (name, postprocessor) in self.postprocessors.iter() {
            tracing::debug!(stage = name, "Running postprocessor");
            output = postprocessor.run(&output, &mut cx);
        }

        let stash = cx.stash.stats();
        tracing::debug!(
            bytes = output.len(),
            stashed = stash.stored,
            unstashed = stash.retrieved,
            "Conversion finished"
        );
        Ok(Conversion {
            output: output.trim().to_owned(),
            tree: root,
            stash,
        })
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("settings", &self.settings)
            .field("preprocessors", &self.preprocessors.names().collect::<Vec<_>>())
            .field("block_rules", &self.block_rules.names().collect::<Vec<_>>())
            .field("inline_patterns", &self.inline_patterns.names().collect::<Vec<_>>())
            .field("tree_processors", &self.tree_processors.names().collect::<Vec<_>>())
            .field("postprocessors", &self.postprocessors.names().collect::<Vec<_>>())
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Convert `source` with the built-in stages plus `extensions`, applied in order.
///
/// # Errors
///
/// Returns an error if an extension fails to register or breaks a required stage.
///
/// # Example
///
/// ```
/// let html = marq_core::convert("# Title\n\nText", &[])?;
/// assert_eq!(html, "<h1>Title</h1>\n<p>Text</p>");
/// # Ok::<(), marq_core::ConvertError>(())
/// ```
pub fn convert(source: &str, extensions: &[&dyn Extension]) -> Result<String, ConvertError> {
    let mut builder = ConverterBuilder::new();
    for extension in extensions {
        builder.apply(*extension)?;
    }
    builder.build()?.convert(source)
}

//! Extensions and the catalog that instantiates them from configuration.

use std::collections::BTreeMap;

use crate::converter::ConverterBuilder;
use crate::error::ConfigurationError;

/// A bundle of stage registrations applied to a [`ConverterBuilder`].
///
/// # Example
///
/// ```
/// use marq_core::{
///     ConfigurationError, ConverterBuilder, Extension, Placement, Postprocessor, Context,
/// };
///
/// struct Shout;
///
/// impl Postprocessor for Shout {
///     fn run(&self, text: &str, _cx: &mut Context<'_>) -> String {
///         text.to_uppercase()
///     }
/// }
///
/// struct ShoutExtension;
///
/// impl Extension for ShoutExtension {
///     fn name(&self) -> &str {
///         "shout"
///     }
///
///     fn extend(&self, builder: &mut ConverterBuilder) -> Result<(), ConfigurationError> {
///         builder.register_postprocessor("shout", Box::new(Shout), Placement::before("unstash"))?;
///         Ok(())
///     }
/// }
///
/// let converter = ConverterBuilder::new().with_extension(&ShoutExtension)?.build()?;
/// assert_eq!(converter.convert("hi")?, "<P>HI</P>");
/// # Ok::<(), marq_core::ConvertError>(())
/// ```
pub trait Extension: Send + Sync {
    /// Name used in logs and configuration.
    fn name(&self) -> &str;

    /// Register this extension's stages.
    fn extend(&self, builder: &mut ConverterBuilder) -> Result<(), ConfigurationError>;
}

/// Builds an extension from its optional configuration table.
pub type ExtensionFactory =
    Box<dyn Fn(Option<&toml::Table>) -> Result<Box<dyn Extension>, ConfigurationError> + Send + Sync>;

/// Extension factories keyed by the name configuration refers to them by.
#[derive(Default)]
pub struct ExtensionCatalog {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl ExtensionCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<&toml::Table>) -> Result<Box<dyn Extension>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Add a factory for `name`, builder style.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Option<&toml::Table>) -> Result<Box<dyn Extension>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Whether a factory is registered for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Known extension names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the extension `name` with `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownExtension`] for an unregistered name,
    /// or whatever the factory returns for invalid options.
    pub fn instantiate(
        &self,
        name: &str,
        options: Option<&toml::Table>,
    ) -> Result<Box<dyn Extension>, ConfigurationError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownExtension(name.to_owned()))?;
        factory(options)
    }
}

impl std::fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionCatalog")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Named(String);

    impl Extension for Named {
        fn name(&self) -> &str {
            &self.0
        }

        fn extend(&self, _builder: &mut ConverterBuilder) -> Result<(), ConfigurationError> {
            Ok(())
        }
    }

    fn catalog() -> ExtensionCatalog {
        ExtensionCatalog::new().with("named", |options| {
            let label = match options.and_then(|o| o.get("label")) {
                None => "default".to_owned(),
                Some(toml::Value::String(label)) => label.clone(),
                Some(_) => {
                    return Err(ConfigurationError::InvalidOption {
                        extension: "named".to_owned(),
                        message: "label must be a string".to_owned(),
                    });
                }
            };
            Ok(Box::new(Named(label)) as Box<dyn Extension>)
        })
    }

    #[test]
    fn test_instantiate_with_and_without_options() {
        let catalog = catalog();
        assert_eq!(catalog.instantiate("named", None).unwrap().name(), "default");

        let options: toml::Table = toml::from_str("label = \"custom\"").unwrap();
        assert_eq!(
            catalog.instantiate("named", Some(&options)).unwrap().name(),
            "custom"
        );
    }

    #[test]
    fn test_unknown_extension() {
        let err = catalog().instantiate("missing", None).err().unwrap();
        assert!(matches!(err, ConfigurationError::UnknownExtension(name) if name == "missing"));
    }

    #[test]
    fn test_invalid_option() {
        let options: toml::Table = toml::from_str("label = 3").unwrap();
        let err = catalog().instantiate("named", Some(&options)).err().unwrap();
        assert_eq!(
            err.to_string(),
            "invalid options for extension named: label must be a string"
        );
    }

    #[test]
    fn test_names_sorted() {
        let catalog = catalog().with("alpha", |_| Ok(Box::new(Named("a".to_owned())) as Box<dyn Extension>));
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["alpha", "named"]);
        assert!(catalog.contains("alpha"));
    }
}

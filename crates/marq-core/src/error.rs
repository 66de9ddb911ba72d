//! Error types for converter setup and conversion.
//!
//! Only configuration mistakes and broken rules are errors. Irregular source
//! text never is: it degrades to literal text or a plain paragraph.

use marq_config::ConfigError;

/// Error from a [`Registry`](crate::Registry) operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// Lookup of a name that is not registered.
    #[error("no entry named {0}")]
    NotFound(String),

    /// Removal of a name that is not registered.
    #[error("cannot deregister unknown entry {0}")]
    UnknownName(String),

    /// Priority collision in a registry that requires unique priorities.
    #[error("priority {priority} of {name} is already used by {existing}")]
    DuplicatePriority {
        /// Entry being registered.
        name: String,
        /// Colliding priority.
        priority: f64,
        /// Entry already holding the priority.
        existing: String,
    },

    /// Positional hint naming an entry that is not registered.
    #[error("cannot place entry relative to unknown entry {0}")]
    UnknownAnchor(String),
}

/// Error detected while setting up a converter.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A registry rejected a registration.
    #[error("{registry} registry: {source}")]
    Registry {
        /// Which registry (e.g. `"block"`, `"inline"`).
        registry: &'static str,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// Configuration names an extension the catalog does not know.
    #[error("unknown extension {0}")]
    UnknownExtension(String),

    /// An extension rejected its options.
    #[error("invalid options for extension {extension}: {message}")]
    InvalidOption {
        /// Extension name.
        extension: String,
        /// What was wrong.
        message: String,
    },

    /// Loading or validating the configuration file failed.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl ConfigurationError {
    /// Wrap a registry error with the name of the registry it came from.
    #[must_use]
    pub fn registry(registry: &'static str, source: RegistryError) -> Self {
        Self::Registry { registry, source }
    }
}

/// Error from building a converter or running a conversion.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// Setup failed.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A required stage is missing or a stage broke the tree.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::DuplicatePriority {
            name: "b".to_owned(),
            priority: 5.0,
            existing: "a".to_owned(),
        };
        assert_eq!(err.to_string(), "priority 5 of b is already used by a");
    }

    #[test]
    fn test_configuration_error_names_registry() {
        let err =
            ConfigurationError::registry("block", RegistryError::UnknownAnchor("x".to_owned()));
        assert_eq!(
            err.to_string(),
            "block registry: cannot place entry relative to unknown entry x"
        );
    }

    #[test]
    fn test_convert_error_from_configuration() {
        let err: ConvertError = ConfigurationError::UnknownExtension("toc".to_owned()).into();
        assert!(matches!(err, ConvertError::Configuration(_)));
        assert_eq!(err.to_string(), "configuration error: unknown extension toc");
    }

    #[test]
    fn test_convert_error_from_config_error() {
        let err: ConvertError =
            ConfigurationError::from(ConfigError::Validation("bad".to_owned())).into();
        let message = match &err {
            ConvertError::Configuration(ConfigurationError::Config(
                ConfigError::Validation(message),
            )) => message.as_str(),
            _ => "",
        };
        assert_eq!(message, "bad");
        assert_eq!(
            err.to_string(),
            "configuration error: Configuration error: bad"
        );
    }
}

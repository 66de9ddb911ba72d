//! Pluggable markup-to-HTML conversion engine.
//!
//! Source text flows through five ordered stages, each a [`Registry`] of
//! named, prioritized implementations:
//!
//! 1. [`Preprocessor`]s rewrite the source lines.
//! 2. [`BlockRule`]s build the block tree ([`blocks`]).
//! 3. [`TreeProcessor`]s rewrite the tree; [`InlinePattern`]s run inside the
//!    `inline` tree processor.
//! 4. The [`serializer`] renders the tree.
//! 5. [`Postprocessor`]s rewrite the output, restoring [`Stash`]ed raw content.
//!
//! Extensions add, replace or remove stages on a [`ConverterBuilder`], either
//! with an explicit priority or relative to an existing entry ([`Placement`]).
//!
//! # Quick Start
//!
//! ```
//! use marq_core::Converter;
//!
//! let converter = Converter::new();
//! let html = converter.convert("# Hello\n\n**Bold** text")?;
//! assert_eq!(html, "<h1>Hello</h1>\n<p><strong>Bold</strong> text</p>");
//! # Ok::<(), marq_core::ConvertError>(())
//! ```

pub mod blocks;
mod context;
mod converter;
mod error;
mod extension;
pub mod inline;
mod postprocessors;
mod preprocessors;
mod registry;
pub mod serializer;
mod stash;
mod tree;
mod treeprocessors;
mod util;

pub use blocks::{BlockParser, BlockRule, BlockState, Blocks};
pub use context::{Context, LinkReference, Settings};
pub use converter::{Conversion, Converter, ConverterBuilder, convert};
pub use error::{ConfigurationError, ConvertError, RegistryError};
pub use extension::{Extension, ExtensionCatalog, ExtensionFactory};
pub use inline::{Fragment, InlineContext, InlineMatch, InlineNode, InlinePattern};
pub use postprocessors::{AmpSubstitutePostprocessor, Postprocessor, UnstashPostprocessor};
pub use preprocessors::{HtmlBlockPreprocessor, NormalizeWhitespace, Preprocessor};
pub use registry::{Placement, Registry};
pub use stash::{Stash, StashStats};
pub use tree::{Attributes, Element};
pub use treeprocessors::{InlineProcessor, PrettifyProcessor, TreeProcessor, validate_tree};
pub use util::{escape_html, is_block_level};

// Re-export configuration types for convenience
pub use marq_config::{Config, OutputFormat};

//! Relink Core Library
//!
//! Pure link rewriting logic: link text generation, offset patching,
//! style inference and settings. No IO dependencies.
//!

pub mod filter;
pub mod generate;
pub mod model;
pub mod occurrence;
pub mod patch;
pub mod settings;
pub mod style;
pub mod vpath;

pub use filter::PathFilter;
pub use generate::{generate, GenerateError, LinkPathLookup, NoShortestLookup};
pub use model::{GenerateOptions, HostStyleDefaults, LinkOccurrence, ReplacementSpan};
pub use patch::{apply_replacements, PatchError};
pub use settings::PluginSettings;

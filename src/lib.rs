//! Layered build configuration resolver.
//!
//! Resolves an immutable build configuration (output mode, experimental flags,
//! paths) from schema defaults plus environment, file and command-line layers.

pub mod config;
pub mod observability;

pub use config::{
    resolve, BuildSettings, ConfigError, ConfigSources, Layer, LayerOrigin, OptionSchema,
    OptionSpec, OutputMode, ResolveError, ResolvedConfig, Resolver, SharedConfig,
};

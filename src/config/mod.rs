//! Configuration resolution subsystem.
//!
//! # Data Flow
//! ```text
//! sources (env vars, bundle.config.{toml,json}, --set assignments)
//!     → loader.rs (parse into Layers, lowest → highest precedence)
//!     → resolver.rs
//!         → validation.rs (shapes, rules, unknown keys)
//!         → merge.rs (schema defaults ← layers, per-key for groups)
//!     → ResolvedConfig (validated, immutable)
//!     → shared via SharedConfig to all consumers
//!
//! On file change (watch mode):
//!     watcher.rs detects change
//!     → loader.rs reloads the files
//!     → resolver.rs re-resolves
//!     → atomic swap inside SharedConfig
//!     → consumers observe the new config on their next load()
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; changes require full re-resolution
//! - Every top-level option has a default so an empty set of layers is valid
//! - Later layers win; only layers marked as peers must agree
//! - Resolution is pure; all I/O lives in the loader and the watcher

pub mod bundler;
pub mod error;
pub mod layer;
pub mod loader;
pub mod merge;
pub mod resolved;
pub mod resolver;
pub mod schema;
pub mod shared;
pub mod validation;
pub mod watcher;

pub use bundler::{BuildSettings, OutputMode};
pub use error::{ConfigError, LoadError, ResolveError, SchemaError};
pub use layer::{Layer, LayerOrigin, PeerTier};
pub use loader::ConfigSources;
pub use resolved::ResolvedConfig;
pub use resolver::{resolve, ResolveOptions, Resolver, UnknownKeyPolicy};
pub use schema::{OptionSchema, OptionSpec, SchemaBuilder, Shape};
pub use shared::SharedConfig;

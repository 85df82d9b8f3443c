//! Partial configurations ("layers") and their precedence.
//!
//! A layer's position in the sequence handed to the resolver decides its
//! precedence: later layers win. Layers marked with the same [`PeerTier`] are
//! peers instead, and must agree wherever they overlap.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::error::LoadError;

/// Where a layer (or a resolved value) came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum LayerOrigin {
    /// Schema defaults, or a layer supplied by the host tool as its own defaults.
    Default,
    /// Environment-derived overrides.
    Env,
    /// A configuration file.
    File(PathBuf),
    /// Command-line assignments.
    Cli,
    /// An in-memory layer supplied by an embedding program.
    Inline(String),
}

impl LayerOrigin {
    pub fn inline(name: impl Into<String>) -> Self {
        LayerOrigin::Inline(name.into())
    }

}

impl fmt::Display for LayerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerOrigin::Default => write!(f, "defaults"),
            LayerOrigin::Env => write!(f, "environment"),
            LayerOrigin::File(path) => write!(f, "file {}", path.display()),
            LayerOrigin::Cli => write!(f, "command line"),
            LayerOrigin::Inline(name) => write!(f, "layer `{}`", name),
        }
    }
}

/// Marks layers that share one precedence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerTier(pub u16);

impl PeerTier {
    /// Configuration files discovered side by side in a project directory.
    pub const PROJECT_FILES: Self = Self(200);
}

/// A sparse, read-only set of option overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    origin: LayerOrigin,
    peer_tier: Option<PeerTier>,
    values: Map<String, Value>,
}

impl Layer {
    pub fn new(origin: LayerOrigin, values: Map<String, Value>) -> Self {
        Self {
            origin,
            peer_tier: None,
            values,
        }
    }

    /// Create a layer from a JSON value, which must be an object.
    pub fn from_value(origin: LayerOrigin, value: Value) -> Result<Self, LoadError> {
        match value {
            Value::Object(values) => Ok(Self::new(origin, values)),
            _ => Err(LoadError::NotATable(origin)),
        }
    }

    /// Make the layer a peer of every other layer in `tier`.
    pub fn with_peer_tier(mut self, tier: PeerTier) -> Self {
        self.peer_tier = Some(tier);
        self
    }

    pub fn origin(&self) -> &LayerOrigin {
        &self.origin
    }

    pub fn peer_tier(&self) -> Option<PeerTier> {
        self.peer_tier
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

//! The resolved configuration.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::layer::{Layer, LayerOrigin};

/// Complete, validated configuration. Immutable: every accessor is read-only,
/// and a change means resolving a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    values: Map<String, Value>,
    provenance: BTreeMap<String, LayerOrigin>,
    sources: Vec<LayerOrigin>,
}

impl ResolvedConfig {
    pub(crate) fn new(
        values: Map<String, Value>,
        provenance: BTreeMap<String, LayerOrigin>,
        sources: Vec<LayerOrigin>,
    ) -> Self {
        Self {
            values,
            provenance,
            sources,
        }
    }

    /// Every resolved option, keyed by top-level name.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Get a value by dotted path, e.g. `experimental.turbo`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    /// Origin of the value at `path`. Paths inside a free-form table report
    /// the origin recorded for the table.
    pub fn origin_of(&self, path: &str) -> Option<&LayerOrigin> {
        let mut candidate = path;
        loop {
            if let Some(origin) = self.provenance.get(candidate) {
                return Some(origin);
            }
            candidate = &candidate[..candidate.rfind('.')?];
        }
    }

    /// Origin of every resolved leaf.
    pub fn provenance(&self) -> &BTreeMap<String, LayerOrigin> {
        &self.provenance
    }

    /// Origins of the layers that contributed, in the order applied.
    pub fn sources(&self) -> &[LayerOrigin] {
        &self.sources
    }

    /// Re-express this configuration as a layer, e.g. to feed it back to a resolver.
    pub fn to_layer(&self, origin: LayerOrigin) -> Layer {
        Layer::new(origin, self.values.clone())
    }

    /// Deserialize into a typed view such as
    /// [`BuildSettings`](crate::config::bundler::BuildSettings).
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.values.clone()))
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.values)
    }
}

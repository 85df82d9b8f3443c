//! Configuration resolution.
//!
//! # Data Flow
//! ```text
//! layers (lowest → highest precedence, by position)
//!     → validation.rs (per layer: shapes, rules, unknown keys)
//!     → layers sharing a PeerTier checked for conflicts
//!     → merge.rs overlays each layer, in order, onto the schema defaults
//!     → ResolvedConfig (immutable)
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::config::error::ResolveError;
use crate::config::layer::{Layer, LayerOrigin, PeerTier};
use crate::config::merge::{find_conflict, overlay_options, record_origin};
use crate::config::resolved::ResolvedConfig;
use crate::config::schema::OptionSchema;
use crate::config::validation::validate_layer;

/// What to do with keys the schema does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Fail with [`ResolveError::UnknownOption`].
    #[default]
    Reject,
    /// Drop the key and log a warning.
    Drop,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub unknown_keys: UnknownKeyPolicy,
}

/// Resolves layered partial configurations against a schema.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    schema: &'a OptionSchema,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    /// Strict resolver: unknown keys are rejected.
    pub fn new(schema: &'a OptionSchema) -> Self {
        Self {
            schema,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Drop unknown keys with a warning instead of failing.
    pub fn permissive(mut self) -> Self {
        self.options.unknown_keys = UnknownKeyPolicy::Drop;
        self
    }

    pub fn schema(&self) -> &'a OptionSchema {
        self.schema
    }

    /// Resolve `layers`, given lowest to highest precedence. A later layer wins
    /// over an earlier one unless both are marked as peers.
    pub fn resolve(&self, layers: &[Layer]) -> Result<ResolvedConfig, ResolveError> {
        let mut validated = Vec::with_capacity(layers.len());
        for layer in layers {
            let values = validate_layer(self.schema, layer, self.options.unknown_keys)?;
            validated.push((layer.peer_tier(), layer.origin(), values));
        }

        check_peers(self.schema, &validated)?;

        let mut values = self.schema.defaults();
        let mut provenance = BTreeMap::new();
        record_origin(self.schema, &values, "", &LayerOrigin::Default, &mut provenance);

        let mut sources = Vec::with_capacity(validated.len());
        for (_, origin, layer_values) in validated {
            overlay_options(self.schema, &mut values, layer_values, "", origin, &mut provenance);
            sources.push(origin.clone());
        }

        tracing::debug!(
            layers = sources.len(),
            options = values.len(),
            "Configuration resolved"
        );

        Ok(ResolvedConfig::new(values, provenance, sources))
    }
}

/// Resolve with the default (strict) options.
pub fn resolve(schema: &OptionSchema, layers: &[Layer]) -> Result<ResolvedConfig, ResolveError> {
    Resolver::new(schema).resolve(layers)
}

fn check_peers(
    schema: &OptionSchema,
    validated: &[(Option<PeerTier>, &LayerOrigin, Map<String, Value>)],
) -> Result<(), ResolveError> {
    for (i, (tier, first_origin, first)) in validated.iter().enumerate() {
        let Some(tier) = tier else {
            continue;
        };
        let peers = validated[i + 1..]
            .iter()
            .filter(|(other_tier, _, _)| *other_tier == Some(*tier));
        for (_, second_origin, second) in peers {
            if let Some(key) = find_conflict(schema, first, second, "") {
                return Err(ResolveError::Conflict {
                    key,
                    first: (*first_origin).clone(),
                    second: (*second_origin).clone(),
                });
            }
        }
    }
    Ok(())
}

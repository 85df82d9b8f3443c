//! Shared fixtures for integration tests.

use bundle_config::config::{Layer, LayerOrigin, OptionSchema, OptionSpec, PeerTier};
use serde_json::{Map, Value};

/// `outputMode` (default "default") plus an `experimental` group whose `turbo`
/// flag defaults to false and whose `a`/`b` flags are unset by default.
pub fn build_schema() -> OptionSchema {
    OptionSchema::builder()
        .option(
            "outputMode",
            OptionSpec::one_of(["default", "standalone", "export"]).default("default"),
        )
        .group(
            "experimental",
            "experimental flags",
            OptionSchema::builder()
                .option("turbo", OptionSpec::boolean().default(false))
                .option("a", OptionSpec::boolean())
                .option("b", OptionSpec::boolean()),
        )
        .build()
        .unwrap()
}

/// Inline layer; its precedence is its position in the resolved sequence.
pub fn layer(name: &str, value: Value) -> Layer {
    Layer::from_value(LayerOrigin::inline(name), value).unwrap()
}

/// Inline layer marked as a peer of every other layer in `tier`.
#[allow(dead_code)]
pub fn peer(name: &str, tier: u16, value: Value) -> Layer {
    layer(name, value).with_peer_tier(PeerTier(tier))
}

#[allow(dead_code)]
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

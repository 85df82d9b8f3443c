//! Loading partial configurations from disk, the environment and the command line.
//!
//! Nothing here resolves or validates; every source becomes a [`Layer`] and the
//! resolver decides what to do with it.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::error::{ConfigError, LoadError};
use crate::config::layer::{Layer, LayerOrigin, PeerTier};
use crate::config::merge::{deep_merge, find_conflict};
use crate::config::resolved::ResolvedConfig;
use crate::config::resolver::Resolver;
use crate::config::schema::{join_path, OptionSchema, Shape};

/// File names looked up in a project directory, in discovery order.
pub const CONFIG_FILE_NAMES: &[&str] = &["bundle.config.toml", "bundle.config.json"];

/// Default prefix of environment overrides.
pub const ENV_PREFIX: &str = "BUNDLE_";

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Format::Toml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

/// Every configuration file present in `dir`.
pub fn discover_config_files(dir: &Path) -> Vec<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

/// Load a configuration file as a layer.
pub fn load_file(path: &Path) -> Result<Layer, LoadError> {
    let format = Format::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let layer = parse_layer(&content, format, path)?;
    tracing::debug!(path = %path.display(), options = layer.values().len(), "Loaded config file");
    Ok(layer)
}

/// Parse file contents; `path` is only used for the origin and error messages.
pub fn parse_layer(content: &str, format: Format, path: &Path) -> Result<Layer, LoadError> {
    let value = match format {
        Format::Toml => {
            let table: toml::Table = toml::from_str(content).map_err(|source| LoadError::Toml {
                path: path.to_path_buf(),
                source,
            })?;
            toml_to_json(toml::Value::Table(table), "").map_err(|key| LoadError::NonFiniteFloat {
                path: path.to_path_buf(),
                key,
            })?
        }
        Format::Json => serde_json::from_str(content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?,
    };
    Layer::from_value(LayerOrigin::File(path.to_path_buf()), value)
}

/// Convert TOML to JSON. `nan` and `inf` have no JSON form; the error carries the
/// dotted key holding one.
fn toml_to_json(value: toml::Value, key: &str) -> Result<Value, String> {
    Ok(match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| key.to_string())?,
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| toml_to_json(item, key))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| {
                    let path = join_path(key, &k);
                    toml_to_json(v, &path).map(|v| (k, v))
                })
                .collect::<Result<_, _>>()?,
        ),
    })
}

/// Build the environment layer from `vars`.
///
/// `BUNDLE_OUTPUT_MODE=export` sets `outputMode`; `__` descends into a group, so
/// `BUNDLE_EXPERIMENTAL__TURBO=true` sets `experimental.turbo`. Names match schema
/// keys ignoring case and underscores. Unmatched names are kept (lowercased) so the
/// resolver's unknown-key policy applies to them. Returns `None` when no variable
/// carries the prefix.
///
/// Two variables naming the same option (`BUNDLE_OUTPUT_MODE` and
/// `BUNDLE_OUTPUTMODE`), or a group and one of its members, must agree; the
/// environment has no order to settle it.
pub fn env_layer<I, K, V>(schema: &OptionSchema, prefix: &str, vars: I) -> Result<Option<Layer>, LoadError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut values = Map::new();
    let mut seen: Vec<(String, Map<String, Value>)> = Vec::new();

    for (name, raw) in vars {
        let name = name.as_ref();
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let mut current = Some(schema);
        let mut keys = Vec::new();
        let mut shape = None;
        for segment in rest.split("__") {
            let matched = current.and_then(|members| {
                members
                    .options()
                    .find(|(key, _)| normalize(key) == normalize(segment))
            });
            match matched {
                Some((key, spec)) => {
                    keys.push(key.to_string());
                    shape = Some(spec.shape());
                    current = match spec.shape() {
                        Shape::Group(members) => Some(members),
                        _ => None,
                    };
                }
                None => {
                    keys.push(segment.to_ascii_lowercase());
                    shape = None;
                    current = None;
                }
            }
        }

        let mut entry = Map::new();
        insert_path(&mut entry, &keys, coerce_env_value(shape, raw.as_ref()));

        for (other, other_entry) in &seen {
            if let Some(key) = find_conflict(schema, other_entry, &entry, "") {
                let (first, second) = if other.as_str() < name {
                    (other.clone(), name.to_string())
                } else {
                    (name.to_string(), other.clone())
                };
                return Err(LoadError::EnvConflict { key, first, second });
            }
        }
        for (key, value) in entry.clone() {
            let merged = match values.remove(&key) {
                Some(existing) => deep_merge(existing, value),
                None => value,
            };
            values.insert(key, merged);
        }
        seen.push((name.to_string(), entry));
    }

    if values.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Layer::new(LayerOrigin::Env, values)))
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn coerce_env_value(shape: Option<&Shape>, raw: &str) -> Value {
    match shape {
        Some(Shape::Bool) => parse_bool(raw).map(Value::Bool).unwrap_or_else(|| raw.into()),
        Some(Shape::Integer { .. }) => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| raw.into()),
        Some(Shape::List(_)) => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Value::from)
                .collect(),
        ),
        Some(Shape::String) | Some(Shape::Enum(_)) => Value::String(raw.to_string()),
        Some(Shape::AnyOf(_)) | Some(Shape::Table) | Some(Shape::Group(_)) | None => {
            parse_bool(raw)
                .map(Value::Bool)
                .or_else(|| serde_json::from_str(raw).ok())
                .unwrap_or_else(|| raw.into())
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Build the command-line layer from `key.path=value` assignments. Values are
/// parsed as JSON when possible, otherwise taken as strings.
pub fn cli_layer<S: AsRef<str>>(assignments: &[S]) -> Result<Option<Layer>, LoadError> {
    let mut values = Map::new();

    for assignment in assignments {
        let assignment = assignment.as_ref();
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| LoadError::InvalidAssignment(assignment.to_string()))?;
        let keys: Vec<String> = key.trim().split('.').map(str::to_string).collect();
        if keys.iter().any(String::is_empty) {
            return Err(LoadError::InvalidAssignment(assignment.to_string()));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        insert_path(&mut values, &keys, value);
    }

    Ok((!values.is_empty()).then(|| Layer::new(LayerOrigin::Cli, values)))
}

fn insert_path(values: &mut Map<String, Value>, keys: &[String], value: Value) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };
    let mut current = values;
    for key in parents {
        let slot = current
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.clone(), value);
}

#[derive(Debug, Clone)]
struct ConfigFile {
    path: PathBuf,
    peer_tier: Option<PeerTier>,
}

/// Ordered collection of configuration sources for one resolution.
///
/// Layers come out lowest precedence first: environment, then files in the
/// order they were added, then the command line. Discovered project files are
/// peers of each other and must agree.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    files: Vec<ConfigFile>,
    env: Option<Layer>,
    cli: Option<Layer>,
}

impl ConfigSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration file. Files are read on every [`load`](Self::load).
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(ConfigFile {
            path: path.into(),
            peer_tier: None,
        });
        self
    }

    /// Add every configuration file discovered in `dir`.
    pub fn with_discovered(mut self, dir: &Path) -> Self {
        self.files
            .extend(discover_config_files(dir).into_iter().map(|path| ConfigFile {
                path,
                peer_tier: Some(PeerTier::PROJECT_FILES),
            }));
        self
    }

    pub fn with_env(mut self, layer: Option<Layer>) -> Self {
        self.env = layer;
        self
    }

    pub fn with_cli(mut self, layer: Option<Layer>) -> Self {
        self.cli = layer;
        self
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files.iter().map(|file| file.path.as_path())
    }

    /// Read the files and return every layer, lowest precedence first.
    pub fn load(&self) -> Result<Vec<Layer>, LoadError> {
        let mut layers = Vec::with_capacity(self.files.len() + 2);
        layers.extend(self.env.clone());
        for file in &self.files {
            let layer = load_file(&file.path)?;
            layers.push(match file.peer_tier {
                Some(tier) => layer.with_peer_tier(tier),
                None => layer,
            });
        }
        layers.extend(self.cli.clone());
        Ok(layers)
    }

    /// Load every source and resolve.
    pub fn resolve(&self, resolver: &Resolver<'_>) -> Result<ResolvedConfig, ConfigError> {
        let layers = self.load()?;
        Ok(resolver.resolve(&layers)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bundler;
    use crate::config::error::ResolveError;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_file() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("bundle.config.toml");
        fs::write(&path, "outputMode = \"standalone\"\n\n[experimental]\nturbo = {}\n").expect("write");

        let layer = load_file(&path).expect("layer");
        assert_eq!(layer.origin(), &LayerOrigin::File(path.clone()));
        assert_eq!(
            Value::Object(layer.values().clone()),
            json!({"outputMode": "standalone", "experimental": {"turbo": {}}})
        );
    }

    #[test]
    fn test_load_json_file() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("bundle.config.json");
        fs::write(&path, r#"{"compress": false, "experimental": {"cpus": 2}}"#).expect("write");

        let layer = load_file(&path).expect("layer");
        assert_eq!(layer.values()["experimental"]["cpus"], 2);
    }

    #[test]
    fn test_invalid_files_are_errors() {
        let tmp = TempDir::new().expect("tmp");

        let toml_path = tmp.path().join("bundle.config.toml");
        fs::write(&toml_path, "outputMode = ").expect("write");
        assert!(matches!(load_file(&toml_path), Err(LoadError::Toml { .. })));

        let json_path = tmp.path().join("bundle.config.json");
        fs::write(&json_path, "[1, 2]").expect("write");
        assert!(matches!(load_file(&json_path), Err(LoadError::NotATable(_))));

        let yaml_path = tmp.path().join("bundle.config.yaml");
        assert!(matches!(load_file(&yaml_path), Err(LoadError::UnsupportedFormat(_))));

        let missing = tmp.path().join("missing.toml");
        assert!(matches!(load_file(&missing), Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_discovery_finds_both_formats() {
        let tmp = TempDir::new().expect("tmp");
        assert!(discover_config_files(tmp.path()).is_empty());

        fs::write(tmp.path().join("bundle.config.json"), "{}").expect("write");
        fs::write(tmp.path().join("bundle.config.toml"), "").expect("write");
        let found = discover_config_files(tmp.path());
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("bundle.config.toml"));
    }

    #[test]
    fn test_env_layer_maps_names_and_coerces_values() {
        let vars = vec![
            ("BUNDLE_OUTPUT_MODE", "export"),
            ("BUNDLE_COMPRESS", "false"),
            ("BUNDLE_EXPERIMENTAL__TURBO", "true"),
            ("BUNDLE_EXPERIMENTAL__CPUS", "4"),
            ("BUNDLE_EXPERIMENTAL__OPTIMIZE_PACKAGE_IMPORTS", "lodash, date-fns"),
            ("PATH", "/usr/bin"),
        ];
        let layer = env_layer(bundler::schema().unwrap(), ENV_PREFIX, vars)
            .expect("env")
            .expect("layer");
        assert_eq!(layer.origin(), &LayerOrigin::Env);
        assert_eq!(
            Value::Object(layer.values().clone()),
            json!({
                "outputMode": "export",
                "compress": false,
                "experimental": {
                    "turbo": true,
                    "cpus": 4,
                    "optimizePackageImports": ["lodash", "date-fns"]
                }
            })
        );
    }

    #[test]
    fn test_env_layer_keeps_unknown_names_and_skips_unprefixed() {
        let schema = bundler::schema().unwrap();
        let layer = env_layer(schema, ENV_PREFIX, [("BUNDLE_TYPO", "1")])
            .expect("env")
            .expect("layer");
        assert_eq!(layer.values()["typo"], true);

        assert!(env_layer(schema, ENV_PREFIX, [("HOME", "/root")]).expect("env").is_none());
    }

    #[test]
    fn test_cli_layer_parses_assignments() {
        let layer = cli_layer(&["outputMode=standalone", "experimental.turbo={}", "compress=false"])
            .expect("parse")
            .expect("layer");
        assert_eq!(
            Value::Object(layer.values().clone()),
            json!({"outputMode": "standalone", "compress": false, "experimental": {"turbo": {}}})
        );

        assert!(cli_layer::<&str>(&[]).expect("parse").is_none());
        assert!(matches!(cli_layer(&["outputMode"]), Err(LoadError::InvalidAssignment(_))));
        assert!(matches!(cli_layer(&["a..b=1"]), Err(LoadError::InvalidAssignment(_))));
    }

    #[test]
    fn test_sources_resolve_env_files_then_cli() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("bundle.config.toml"), "outputMode = \"standalone\"\ndistDir = \"out\"\n")
            .expect("write");

        let env = env_layer(bundler::schema().unwrap(), ENV_PREFIX, [("BUNDLE_DIST_DIR", "build")]).expect("env");
        let cli = cli_layer(&["outputMode=export"]).expect("parse");
        let sources = ConfigSources::new()
            .with_discovered(tmp.path())
            .with_env(env)
            .with_cli(cli);

        let resolved = sources.resolve(&Resolver::new(bundler::schema().unwrap())).expect("resolve");
        assert_eq!(resolved.get_str("outputMode"), Some("export"));
        assert_eq!(resolved.get_str("distDir"), Some("out"));
        assert_eq!(resolved.sources().len(), 3);
    }

    #[test]
    fn test_env_names_for_one_option_must_agree() {
        let schema = bundler::schema().unwrap();
        let vars = [("BUNDLE_OUTPUT_MODE", "export"), ("BUNDLE_OUTPUTMODE", "standalone")];

        for ordered in [vars, [vars[1], vars[0]]] {
            let err = env_layer(schema, ENV_PREFIX, ordered).unwrap_err();
            match err {
                LoadError::EnvConflict { key, first, second } => {
                    assert_eq!(key, "outputMode");
                    assert_eq!(first, "BUNDLE_OUTPUTMODE");
                    assert_eq!(second, "BUNDLE_OUTPUT_MODE");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        let agreeing = [("BUNDLE_OUTPUT_MODE", "export"), ("BUNDLE_OUTPUTMODE", "export")];
        let layer = env_layer(schema, ENV_PREFIX, agreeing).expect("env").expect("layer");
        assert_eq!(layer.values()["outputMode"], "export");
    }

    #[test]
    fn test_env_group_and_member_combine_in_any_order() {
        let schema = bundler::schema().unwrap();
        let vars = [("BUNDLE_EXPERIMENTAL__TURBO", "true"), ("BUNDLE_EXPERIMENTAL", "{}")];

        for ordered in [vars, [vars[1], vars[0]]] {
            let layer = env_layer(schema, ENV_PREFIX, ordered).expect("env").expect("layer");
            assert_eq!(Value::Object(layer.values().clone()), json!({"experimental": {"turbo": true}}));
        }

        let clashing = [
            ("BUNDLE_EXPERIMENTAL__TURBO", "true"),
            ("BUNDLE_EXPERIMENTAL", r#"{"turbo": false}"#),
        ];
        let err = env_layer(schema, ENV_PREFIX, clashing).unwrap_err();
        assert!(matches!(err, LoadError::EnvConflict { ref key, .. } if key == "experimental.turbo"));

        let unknown = [("BUNDLE_FOO__BAR", "x"), ("BUNDLE_FOO__BAZ", "y")];
        let layer = env_layer(schema, ENV_PREFIX, unknown).expect("env").expect("layer");
        assert_eq!(Value::Object(layer.values().clone()), json!({"foo": {"bar": "x", "baz": "y"}}));
    }

    #[test]
    fn test_non_finite_toml_float_is_an_error() {
        let path = Path::new("bundle.config.toml");
        let err = parse_layer("[experimental]\ncpus = nan\n", Format::Toml, path).unwrap_err();
        match err {
            LoadError::NonFiniteFloat { key, .. } => assert_eq!(key, "experimental.cpus"),
            other => panic!("unexpected error: {other}"),
        }

        let layer = parse_layer("ratio = 0.5\n", Format::Toml, path).expect("layer");
        assert_eq!(layer.values()["ratio"], 0.5);
    }

    #[test]
    fn test_discovered_files_are_peers_explicit_files_are_ordered() {
        let tmp = TempDir::new().expect("tmp");
        let toml_path = tmp.path().join("bundle.config.toml");
        let json_path = tmp.path().join("bundle.config.json");
        fs::write(&toml_path, "distDir = \"a\"\n").expect("write");
        fs::write(&json_path, r#"{"distDir": "b"}"#).expect("write");
        let resolver = Resolver::new(bundler::schema().unwrap());

        let discovered = ConfigSources::new().with_discovered(tmp.path());
        let layers = discovered.load().expect("load");
        assert!(layers.iter().all(|l| l.peer_tier() == Some(PeerTier::PROJECT_FILES)));
        assert!(matches!(
            discovered.resolve(&resolver),
            Err(ConfigError::Resolve(ResolveError::Conflict { .. }))
        ));

        let explicit = ConfigSources::new().with_file(&toml_path).with_file(&json_path);
        let resolved = explicit.resolve(&resolver).expect("resolve");
        assert_eq!(resolved.get_str("distDir"), Some("b"));
        assert_eq!(explicit.files().collect::<Vec<_>>(), vec![toml_path.as_path(), json_path.as_path()]);
    }
}

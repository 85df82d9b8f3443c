//! Built-in option catalog for the bundler, and its typed view.
//!
//! The catalog is built once per process and shared by reference.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::error::SchemaError;
use crate::config::schema::{OptionSchema, OptionSpec, Shape};

/// How the build output is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Regular build output run by the framework's own server.
    #[default]
    Default,
    /// Self-contained server bundle with traced dependencies.
    Standalone,
    /// Static export, no server.
    Export,
}

impl OutputMode {
    pub const ALL: [OutputMode; 3] = [OutputMode::Default, OutputMode::Standalone, OutputMode::Export];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Default => "default",
            OutputMode::Standalone => "standalone",
            OutputMode::Export => "export",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown output mode `{}`", s))
    }
}

/// Typed view of a configuration resolved against [`schema()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSettings {
    pub output_mode: OutputMode,
    pub dist_dir: String,
    pub base_path: String,
    pub trailing_slash: bool,
    pub compress: bool,
    pub production_source_maps: bool,
    #[serde(default)]
    pub experimental: BTreeMap<String, Value>,
}

impl BuildSettings {
    /// Whether an experimental flag is switched on. A table counts as on
    /// (`turbo = {}` enables turbo with default options).
    pub fn is_enabled(&self, flag: &str) -> bool {
        match self.experimental.get(flag) {
            Some(Value::Bool(enabled)) => *enabled,
            Some(Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// The bundler's option catalog.
pub fn schema() -> Result<&'static OptionSchema, SchemaError> {
    static SCHEMA: OnceLock<Result<OptionSchema, SchemaError>> = OnceLock::new();
    SCHEMA.get_or_init(build_schema).as_ref().map_err(Clone::clone)
}

pub(crate) fn build_schema() -> Result<OptionSchema, SchemaError> {
    OptionSchema::builder()
        .option(
            "outputMode",
            OptionSpec::one_of(OutputMode::ALL.map(|m| m.as_str()))
                .default(OutputMode::Default.as_str())
                .describe("How the build output is packaged"),
        )
        .option(
            "distDir",
            OptionSpec::string()
                .default("dist")
                .rule(check_dist_dir)
                .describe("Build output directory, relative to the project root"),
        )
        .option(
            "basePath",
            OptionSpec::string()
                .default("")
                .rule(check_base_path)
                .describe("URL prefix the application is served under"),
        )
        .option(
            "trailingSlash",
            OptionSpec::boolean()
                .default(false)
                .describe("Emit routes with a trailing slash"),
        )
        .option(
            "compress",
            OptionSpec::boolean()
                .default(true)
                .describe("Compress served responses"),
        )
        .option(
            "productionSourceMaps",
            OptionSpec::boolean()
                .default(false)
                .describe("Emit browser source maps in production builds"),
        )
        .group(
            "experimental",
            "Experimental build features",
            OptionSchema::builder()
                .option(
                    "turbo",
                    OptionSpec::any_of(vec![Shape::Bool, Shape::Table])
                        .describe("Incremental bundler; a table passes bundler options"),
                )
                .option("typedRoutes", OptionSpec::boolean().describe("Statically typed links"))
                .option("optimizeCss", OptionSpec::boolean().describe("Inline critical CSS"))
                .option(
                    "serverMinification",
                    OptionSpec::boolean().describe("Minify server bundles"),
                )
                .option(
                    "cpus",
                    OptionSpec::integer_in(1, 256).describe("Worker count for the build"),
                )
                .option(
                    "optimizePackageImports",
                    OptionSpec::list(Shape::String)
                        .describe("Packages whose barrel imports are rewritten"),
                ),
        )
        .build()
}

fn check_dist_dir(value: &Value) -> Result<(), String> {
    let dir = value.as_str().unwrap_or_default();
    if dir.is_empty() {
        return Err("a non-empty directory name".to_string());
    }
    if dir.split(['/', '\\']).any(|segment| segment == "..") {
        return Err("a directory without `..` segments".to_string());
    }
    Ok(())
}

fn check_base_path(value: &Value) -> Result<(), String> {
    let path = value.as_str().unwrap_or_default();
    if path.is_empty() || (path.starts_with('/') && !path.ends_with('/')) {
        Ok(())
    } else {
        Err("an empty string or a path starting with `/` without a trailing `/`".to_string())
    }
}

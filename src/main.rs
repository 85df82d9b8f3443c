//! bundle-config: resolve and inspect layered build configuration.
//!
//! # Architecture Overview
//!
//! ```text
//!   BUNDLE_* env vars ──┐
//!   bundle.config.toml ─┼─▶ loader ─▶ layers ─▶ resolver ─▶ ResolvedConfig ─▶ stdout
//!   bundle.config.json ─┤                          ▲
//!   --set key=value ────┘                          │
//!                                            option schema
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use bundle_config::config::loader::{self, ConfigSources};
use bundle_config::config::watcher::{ConfigWatcher, Reloader};
use bundle_config::config::{
    bundler, BuildSettings, ConfigError, OptionSchema, ResolveOptions, ResolvedConfig, Resolver,
    Shape, SharedConfig, UnknownKeyPolicy,
};
use bundle_config::observability::logging;

#[derive(Parser)]
#[command(name = "bundle-config")]
#[command(about = "Resolve and inspect layered build configuration", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration as JSON
    Resolve {
        #[command(flatten)]
        sources: SourceArgs,

        /// Include the origin of every value
        #[arg(long)]
        provenance: bool,
    },
    /// Validate the configuration and exit non-zero on error
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// List recognized options
    Schema,
    /// Re-resolve whenever a config file changes
    Watch {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Project directory searched for bundle.config.{toml,json}
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Explicit config file; disables discovery
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override an option, e.g. --set experimental.turbo=true
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Drop unknown options with a warning instead of failing
    #[arg(long)]
    permissive: bool,

    /// Prefix of environment overrides
    #[arg(long, default_value = loader::ENV_PREFIX)]
    env_prefix: String,

    /// Ignore environment overrides
    #[arg(long)]
    no_env: bool,
}

impl SourceArgs {
    fn options(&self) -> ResolveOptions {
        ResolveOptions {
            unknown_keys: if self.permissive {
                UnknownKeyPolicy::Drop
            } else {
                UnknownKeyPolicy::Reject
            },
        }
    }

    fn sources(&self, schema: &OptionSchema) -> Result<ConfigSources, ConfigError> {
        let mut sources = match &self.config {
            Some(path) => ConfigSources::new().with_file(path),
            None => ConfigSources::new().with_discovered(&self.dir),
        };
        if !self.no_env {
            sources = sources.with_env(loader::env_layer(schema, &self.env_prefix, process_env())?);
        }
        Ok(sources.with_cli(loader::cli_layer(self.set.as_slice())?))
    }

    fn resolve(&self, schema: &OptionSchema) -> Result<(ConfigSources, ResolvedConfig), ConfigError> {
        let sources = self.sources(schema)?;
        let resolver = Resolver::new(schema).with_options(self.options());
        let config = sources.resolve(&resolver)?;
        Ok((sources, config))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let schema = bundler::schema()?;

    match cli.command {
        Commands::Resolve { sources, provenance } => {
            let (_, config) = sources.resolve(schema).unwrap_or_else(|e| fail(&e));
            if provenance {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("{}", config.to_json_pretty()?);
            }
        }
        Commands::Check { sources } => {
            let (_, config) = sources.resolve(schema).unwrap_or_else(|e| fail(&e));
            let settings: BuildSettings = config.settings()?;
            println!(
                "ok: output mode {}, {} experimental flag(s) set",
                settings.output_mode,
                settings.experimental.len()
            );
        }
        Commands::Schema => print_schema(schema, ""),
        Commands::Watch { sources: args } => {
            let (sources, config) = args.resolve(schema).unwrap_or_else(|e| fail(&e));
            let files = sources.files().count();
            if files == 0 {
                tracing::warn!("No config files found, nothing to watch");
                return Ok(());
            }
            tracing::info!(
                output_mode = config.get_str("outputMode").unwrap_or_default(),
                files,
                "Configuration resolved"
            );

            let reloader = Reloader::new(
                Arc::new(schema.clone()),
                args.options(),
                sources,
                SharedConfig::new(config),
            );
            let _watcher = ConfigWatcher::new(reloader).run()?;
            loop {
                std::thread::park();
            }
        }
    }

    Ok(())
}

/// Process environment, skipping variables that are not valid UTF-8.
fn process_env() -> impl Iterator<Item = (String, String)> {
    utf8_vars(std::env::vars_os())
}

fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

fn fail(err: &ConfigError) -> ! {
    eprintln!("error: {}", err);
    std::process::exit(1);
}

fn print_schema(schema: &OptionSchema, prefix: &str) {
    for (name, spec) in schema.options() {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };
        let default = spec
            .default_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "(unset)".to_string());
        println!("{:<40} {:<50} {:<10} {}", path, spec.shape().describe(), default, spec.description());
        if let Shape::Group(members) = spec.shape() {
            print_schema(members, &path);
        }
    }
}

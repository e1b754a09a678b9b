use crate::config::Config;
use crate::globals::Globals;
use crate::http::Request;
use crate::logging::{init_logging_with_config, LogConfig};
use crate::names::{title_case, title_case_segments};
use crate::router::{route_from_config, Router};
use crate::runtime_config::RuntimeConfig;
use anyhow::Context;
use clap::{Parser, Subcommand};
use http::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Command-line interface for yaf applications
#[derive(Parser)]
#[command(name = "yaf")]
#[command(about = "Inspect yaf application configuration and routing", long_about = None)]
pub struct Cli {
    /// Pretty debug logging instead of the `YAF_LOG_*` settings
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve URIs to module/controller/action with the configured routes
    Route {
        /// Application config file (TOML, YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Config section (default: `YAF_ENVIRON`)
        #[arg(short, long)]
        section: Option<String>,

        /// Request URIs to resolve
        #[arg(required = true)]
        uris: Vec<String>,
    },
    /// Print the parsed application settings
    Config {
        /// Application config file (TOML, YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Config section (default: `YAF_ENVIRON`)
        #[arg(short, long)]
        section: Option<String>,
    },
}

/// Where a URI lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub uri: String,
    /// Name of the accepting route, `None` when routing failed.
    pub route: Option<String>,
    pub module: String,
    pub controller: String,
    pub action: String,
    pub params: Vec<(String, String)>,
}

pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let log_config = if cli.verbose {
        LogConfig::default_dev()
    } else {
        LogConfig::from_env()
    };
    init_logging_with_config(&log_config)?;

    match &cli.command {
        Commands::Route {
            config,
            section,
            uris,
        } => {
            for resolved in resolve_uris(config, section.as_deref(), uris)? {
                match &resolved.route {
                    Some(route) => println!(
                        "{} -> {}/{}/{} via {route} params={}",
                        resolved.uri,
                        resolved.module,
                        resolved.controller,
                        resolved.action,
                        json!(resolved.params),
                    ),
                    None => println!("{} -> no route", resolved.uri),
                }
            }
            Ok(())
        }
        Commands::Config { config, section } => {
            let (_, globals) = load(config, section.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&describe_globals(&globals))?);
            Ok(())
        }
    }
}

fn load(path: &Path, section: Option<&str>) -> anyhow::Result<(Config, Globals)> {
    let runtime = RuntimeConfig::from_env();
    let section = section.unwrap_or(&runtime.environ);
    let config = Config::from_file(path, section)
        .with_context(|| format!("Failed to load section '{section}' of {}", path.display()))?;
    let globals = Globals::parse_option(&config, &runtime)?;
    Ok((config, globals))
}

/// Route every URI with the router the configuration describes.
///
/// Names are shown normalized, with the defaults filled in, the way the
/// dispatcher sees them after routing.
pub fn resolve_uris(
    path: &Path,
    section: Option<&str>,
    uris: &[String],
) -> anyhow::Result<Vec<Resolution>> {
    let (config, globals) = load(path, section)?;
    let mut router = Router::new(globals.modules.clone());
    if let Some(default_route) = &globals.default_route {
        router.set_default_route(route_from_config(default_route, &globals.modules)?);
    }
    if let Some(routes) = config.get("routes") {
        router.add_config(routes)?;
    }

    let resolved = uris
        .iter()
        .map(|uri| {
            let mut request = Request::http(Method::GET, uri);
            request.set_base_uri(globals.base_uri.as_deref());
            let routed = router.route(&mut request);
            let or_default = |name: &str, default: &str, normalize: fn(&str) -> String| {
                if name.is_empty() {
                    default.to_string()
                } else {
                    normalize(name)
                }
            };
            Resolution {
                uri: uri.clone(),
                route: routed
                    .then(|| router.current_route().map(str::to_string))
                    .flatten(),
                module: or_default(request.module(), &globals.default_module, title_case),
                controller: or_default(
                    request.controller(),
                    &globals.default_controller,
                    title_case_segments,
                ),
                action: or_default(request.action(), &globals.default_action, str::to_lowercase),
                params: request
                    .params()
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.to_string(), v.to_string())))
                    .collect(),
            }
        })
        .collect();
    Ok(resolved)
}

/// JSON view of the parsed settings.
#[must_use]
pub fn describe_globals(globals: &Globals) -> Value {
    json!({
        "directory": globals.directory,
        "ext": globals.ext,
        "view_ext": globals.view_ext,
        "bootstrap": globals.bootstrap,
        "local_library": globals.local_library_dir(),
        "global_library": globals.global_library,
        "library_namespaces": globals.library_namespaces,
        "base_uri": globals.base_uri,
        "modules": globals.modules,
        "default_module": globals.default_module,
        "default_controller": globals.default_controller,
        "default_action": globals.default_action,
        "default_route": globals.default_route,
        "throw_exception": globals.throw_exception,
        "catch_exception": globals.catch_exception,
        "environ": globals.environ,
        "forward_limit": globals.forward_limit,
        "name_suffix": globals.name_suffix,
        "name_separator": globals.name_separator,
        "lowercase_path": globals.lowercase_path,
        "system": globals
            .system
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<serde_json::Map<String, Value>>(),
    })
}

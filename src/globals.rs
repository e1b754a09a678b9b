//! # Globals
//!
//! The application-wide settings cell built once by
//! [`Globals::parse_option`] from the `application` (or legacy `yaf`) section
//! of the config, layered over the process defaults of [`RuntimeConfig`].
//! It is read-only after construction; the per-dispatch state (`in_exception`,
//! the current view directory) lives in the dispatcher instead.
//!
//! ## Recognized keys
//!
//! | Key | Effect |
//! |---|---|
//! | `directory` | Application root (required, trailing `/` stripped) |
//! | `ext` | Script extension (default `php`) |
//! | `bootstrap` | Explicit bootstrap script |
//! | `library` | Local library path, or `{directory, namespace}` |
//! | `view.ext` | Template extension (default `phtml`) |
//! | `baseUri` | Prefix stripped before routing |
//! | `dispatcher.*` | Defaults, throw/catch flags, default route |
//! | `modules` | Comma separated module list, or an array of names |
//! | `system.*` | Stored as `yaf.<key>`, overrides runtime defaults |

use crate::config::Config;
use crate::error::{Error, Result};
use crate::loader::{LoaderOptions, LIBRARY_DIRECTORY};
use crate::names::{title_case, title_case_segments};
use crate::runtime_config::{parse_flag, RuntimeConfig};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const DEFAULT_MODULE: &str = "Index";
pub const DEFAULT_CONTROLLER: &str = "Index";
pub const DEFAULT_ACTION: &str = "index";
pub const DEFAULT_EXT: &str = "php";
pub const DEFAULT_VIEW_EXT: &str = "phtml";

/// Longest stored `yaf.<key>` name.
const MAX_SYSTEM_KEY: usize = 127;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Globals {
    pub directory: PathBuf,
    pub ext: String,
    pub bootstrap: Option<PathBuf>,
    pub local_library: Option<PathBuf>,
    /// Namespaces listed under `library.namespace`.
    pub library_namespaces: Vec<String>,
    pub view_ext: String,
    pub base_uri: Option<String>,
    pub default_module: String,
    pub default_controller: String,
    pub default_action: String,
    pub throw_exception: bool,
    pub catch_exception: bool,
    /// Raw `dispatcher.defaultRoute` config, built by the router.
    pub default_route: Option<Value>,
    /// Configured modules, TitleCase.
    pub modules: Vec<String>,
    /// `system.*` entries as `(yaf.<key>, value)`.
    pub system: Vec<(String, String)>,
    pub environ: String,
    pub forward_limit: u32,
    pub name_suffix: bool,
    pub name_separator: String,
    pub global_library: Option<PathBuf>,
    pub lowercase_path: bool,
}

impl Globals {
    /// Build the settings from `config` over `runtime` defaults.
    pub fn parse_option(config: &Config, runtime: &RuntimeConfig) -> Result<Self> {
        let app = config
            .get("application")
            .or_else(|| config.get("yaf"))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                Error::type_error("Expected an array of application configure")
            })?;

        let directory = match app.get("directory") {
            Some(Value::String(dir)) if !dir.is_empty() => {
                let trimmed = dir.trim_end_matches(['/', '\\']);
                PathBuf::from(if trimmed.is_empty() { "/" } else { trimmed })
            }
            _ => {
                return Err(Error::startup(
                    "Expected a directory entry in application configures",
                ))
            }
        };

        let mut globals = Globals {
            directory,
            ext: DEFAULT_EXT.to_string(),
            bootstrap: None,
            local_library: None,
            library_namespaces: Vec::new(),
            view_ext: DEFAULT_VIEW_EXT.to_string(),
            base_uri: None,
            default_module: DEFAULT_MODULE.to_string(),
            default_controller: DEFAULT_CONTROLLER.to_string(),
            default_action: DEFAULT_ACTION.to_string(),
            throw_exception: true,
            catch_exception: false,
            default_route: None,
            modules: Vec::new(),
            system: Vec::new(),
            environ: runtime.environ.clone(),
            forward_limit: runtime.forward_limit,
            name_suffix: runtime.name_suffix,
            name_separator: runtime.name_separator.clone(),
            global_library: runtime.global_library.clone(),
            lowercase_path: runtime.lowercase_path,
        };

        if let Some(ext) = app.get("ext").and_then(Value::as_str) {
            globals.ext = ext.trim_start_matches('.').to_string();
        }
        if let Some(bootstrap) = app.get("bootstrap").and_then(Value::as_str) {
            globals.bootstrap = Some(PathBuf::from(bootstrap));
        }

        match app.get("library") {
            Some(Value::String(path)) => globals.local_library = Some(PathBuf::from(path)),
            Some(Value::Object(library)) => {
                if let Some(dir) = library.get("directory").and_then(Value::as_str) {
                    globals.local_library = Some(PathBuf::from(dir));
                }
                if let Some(namespaces) = library.get("namespace").and_then(Value::as_str) {
                    globals.library_namespaces = split_list(namespaces);
                }
            }
            _ => {}
        }

        if let Some(ext) = app.get("view").and_then(|v| v.get("ext")).and_then(Value::as_str) {
            globals.view_ext = ext.trim_start_matches('.').to_string();
        }
        if let Some(base_uri) = app.get("baseUri").and_then(Value::as_str) {
            if !base_uri.is_empty() {
                globals.base_uri = Some(base_uri.to_string());
            }
        }

        if let Some(dispatcher) = app.get("dispatcher").and_then(Value::as_object) {
            if let Some(m) = dispatcher.get("defaultModule").and_then(Value::as_str) {
                globals.default_module = title_case(m);
            }
            if let Some(c) = dispatcher.get("defaultController").and_then(Value::as_str) {
                globals.default_controller = title_case_segments(c);
            }
            if let Some(a) = dispatcher.get("defaultAction").and_then(Value::as_str) {
                globals.default_action = a.to_lowercase();
            }
            if let Some(flag) = dispatcher.get("throwException") {
                globals.throw_exception = value_flag(flag, "dispatcher.throwException")?;
            }
            if let Some(flag) = dispatcher.get("catchException") {
                globals.catch_exception = value_flag(flag, "dispatcher.catchException")?;
            }
            if let Some(route) = dispatcher.get("defaultRoute") {
                if route.is_object() {
                    globals.default_route = Some(route.clone());
                }
            }
        }

        globals.modules = match app.get("modules") {
            Some(Value::String(list)) => split_list(list).iter().map(|m| title_case(m)).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(title_case).ok_or_else(|| {
                        Error::type_error(format!("application.modules entries must be strings, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(Error::type_error(format!(
                    "application.modules must be a string or a list, got {other}"
                )))
            }
        };
        if globals.modules.is_empty() {
            globals.modules.push(globals.default_module.clone());
        }

        if let Some(system) = config.get("application.system").or_else(|| config.get("yaf.system")) {
            globals.apply_system(system)?;
        }

        debug!(
            directory = %globals.directory.display(),
            modules = ?globals.modules,
            default_module = %globals.default_module,
            environ = %globals.environ,
            "Application options parsed"
        );
        Ok(globals)
    }

    fn apply_system(&mut self, system: &Value) -> Result<()> {
        let Some(entries) = system.as_object() else {
            return Err(Error::type_error("application.system must be a map"));
        };
        for (key, value) in entries {
            let text = scalar_text(value);
            let mut name = format!("yaf.{key}");
            if name.len() > MAX_SYSTEM_KEY {
                warn!(key = %key, "System setting name truncated");
                let mut cut = MAX_SYSTEM_KEY;
                while !name.is_char_boundary(cut) {
                    cut -= 1;
                }
                name.truncate(cut);
            }
            match key.as_str() {
                "environ" => self.environ = text.clone(),
                "forward_limit" => {
                    self.forward_limit = text
                        .trim()
                        .parse()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| Error::type_error(format!("Invalid forward_limit '{text}'")))?;
                }
                "name_suffix" => self.name_suffix = value_flag(value, "system.name_suffix")?,
                "name_separator" => self.name_separator = text.clone(),
                "lowercase_path" => self.lowercase_path = value_flag(value, "system.lowercase_path")?,
                "library" if !text.is_empty() => self.global_library = Some(PathBuf::from(&text)),
                _ => {}
            }
            self.system.retain(|(k, _)| k != &name);
            self.system.push((name, text));
        }
        Ok(())
    }

    /// Case-sensitive membership test against the module list.
    #[must_use]
    pub fn is_module_name(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }

    /// A stored `system.*` value by its `yaf.<key>` name.
    #[must_use]
    pub fn system_value(&self, name: &str) -> Option<&str> {
        self.system
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Naming settings for a [`Loader`](crate::loader::Loader) rooted here.
    #[must_use]
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            app_directory: self.directory.clone(),
            local_library: self.local_library_dir(),
            global_library: self.global_library.clone(),
            ext: self.ext.clone(),
            default_module: self.default_module.clone(),
            bootstrap: self.bootstrap.clone(),
            name_suffix: self.name_suffix,
            name_separator: self.name_separator.clone(),
            lowercase_path: self.lowercase_path,
        }
    }

    /// Local library: configured, or `<directory>/library`.
    #[must_use]
    pub fn local_library_dir(&self) -> PathBuf {
        self.local_library
            .clone()
            .unwrap_or_else(|| self.directory.join(LIBRARY_DIRECTORY))
    }
}

/// Split a comma and/or space separated list.
fn split_list(list: &str) -> Vec<String> {
    list.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_flag(value: &Value, key: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => {
            parse_flag(s).ok_or_else(|| Error::type_error(format!("{key}: '{s}' is not a boolean")))
        }
        Value::Null => Ok(false),
        _ => Err(Error::type_error(format!("{key} must be a boolean"))),
    }
}

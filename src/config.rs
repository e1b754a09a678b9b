//! # Config Module
//!
//! A read-only configuration tree handed to [`Application::new`]. Parsing the
//! file formats is delegated to `toml`, `serde_yaml` and `serde_json`; this
//! module only selects the section and offers dotted-path access.
//!
//! ## Sections
//!
//! Config files are organised in top-level sections, one per environment:
//!
//! ```toml
//! [common.application]
//! directory = "/srv/app"
//!
//! [product]
//! extends = "common"
//! application.dispatcher.catchException = true
//! ```
//!
//! A section naming another one through `extends` is deep-merged on top of it.
//!
//! [`Application::new`]: crate::Application::new

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Where the configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A `.toml`, `.yaml`/`.yml` or `.json` file.
    File(PathBuf),
    /// A structured literal.
    Value(Value),
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::File(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        ConfigSource::File(path.to_path_buf())
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        ConfigSource::Value(value)
    }
}

/// Key that makes a section inherit another one.
const EXTENDS_KEY: &str = "extends";

/// Read-only configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
    section: Option<String>,
}

impl Config {
    /// Load a config from `source`.
    ///
    /// For files the section is mandatory and must exist. For literals the
    /// section is applied only when present in the value.
    pub fn load(source: ConfigSource, section: &str) -> Result<Self> {
        match source {
            ConfigSource::File(path) => Self::from_file(&path, section),
            ConfigSource::Value(value) => Ok(Self::from_value(value, Some(section))),
        }
    }

    /// Parse a file and select `section`.
    pub fn from_file(path: &Path, section: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::startup(format!("Unable to read config file {}", path.display())).with_source(e)
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let root: Value = match ext.as_str() {
            "toml" => toml::from_str(&text).map_err(|e| parse_error(path, e))?,
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| parse_error(path, e))?,
            "json" => serde_json::from_str(&text).map_err(|e| parse_error(path, e))?,
            other => {
                return Err(Error::startup(format!(
                    "Unsupported config format '{other}' for {}",
                    path.display()
                )))
            }
        };
        let selected = select_section(&root, section, &mut Vec::new())?;
        Ok(Self {
            root: selected,
            section: Some(section.to_string()),
        })
    }

    /// Wrap a structured literal, selecting `section` when the value has it.
    pub fn from_value(value: Value, section: Option<&str>) -> Self {
        if let Some(name) = section.filter(|s| !s.is_empty()) {
            if value.get(name).is_some_and(Value::is_object) {
                if let Ok(selected) = select_section(&value, name, &mut Vec::new()) {
                    return Self {
                        root: selected,
                        section: Some(name.to_string()),
                    };
                }
            }
        }
        Self {
            root: value,
            section: None,
        }
    }

    /// Section this config was read from, if any.
    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// Dotted-path lookup: `get("application.dispatcher.defaultModule")`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|k| !k.is_empty())
            .try_fold(&self.root, |node, key| node.get(key))
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// The whole selected tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

fn parse_error(path: &Path, err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::startup(format!("Initialization of application config failed: {}", path.display()))
        .with_source(err)
}

/// Resolve `name` in `root`, following `extends` chains.
fn select_section(root: &Value, name: &str, seen: &mut Vec<String>) -> Result<Value> {
    if seen.iter().any(|s| s == name) {
        return Err(Error::startup(format!(
            "Config section '{name}' extends itself"
        )));
    }
    seen.push(name.to_string());

    let section = root
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::startup(format!("There is no section '{name}' in config")))?;

    let mut own = section.clone();
    let parent = match own.remove(EXTENDS_KEY) {
        Some(Value::String(parent)) => Some(parent),
        Some(_) => {
            return Err(Error::type_error(format!(
                "Config section '{name}': '{EXTENDS_KEY}' must be a string"
            )))
        }
        None => None,
    };

    match parent {
        Some(parent) => {
            let mut base = select_section(root, &parent, seen)?;
            merge(&mut base, Value::Object(own));
            Ok(base)
        }
        None => Ok(Value::Object(own)),
    }
}

/// Deep merge `overlay` into `base`; objects merge, everything else replaces.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Empty object helper used by callers building configs programmatically.
pub fn empty() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_dotted_get() {
        let config = Config::from_value(
            json!({"application": {"dispatcher": {"defaultModule": "Index"}}}),
            None,
        );
        assert_eq!(config.get_str("application.dispatcher.defaultModule"), Some("Index"));
        assert!(config.get("application.missing").is_none());
    }

    #[test]
    fn test_literal_section_selected_only_when_present() {
        let value = json!({"product": {"application": {"directory": "/a"}}});
        let config = Config::from_value(value.clone(), Some("product"));
        assert_eq!(config.get_str("application.directory"), Some("/a"));
        assert_eq!(config.section(), Some("product"));

        let config = Config::from_value(value, Some("develop"));
        assert!(config.get("product").is_some());
        assert_eq!(config.section(), None);
    }

    #[test]
    fn test_extends_merges_parent() {
        let root = json!({
            "common": {"application": {"directory": "/srv", "ext": "php"}},
            "product": {"extends": "common", "application": {"ext": "inc"}}
        });
        let selected = select_section(&root, "product", &mut Vec::new()).unwrap();
        assert_eq!(selected["application"]["directory"], "/srv");
        assert_eq!(selected["application"]["ext"], "inc");
        assert!(selected.get("extends").is_none());
    }

    #[test]
    fn test_extends_cycle_is_rejected() {
        let root = json!({"a": {"extends": "b"}, "b": {"extends": "a"}});
        let err = select_section(&root, "a", &mut Vec::new()).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::StartupFailed);
    }

    #[test]
    fn test_toml_file_section() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[product.application]\ndirectory = \"/srv/app\"\n\n[develop]\nextends = \"product\"\n"
        )
        .unwrap();
        let config = Config::from_file(file.path(), "develop").unwrap();
        assert_eq!(config.get_str("application.directory"), Some("/srv/app"));
    }

    #[test]
    fn test_missing_file_section_fails() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "product:\n  application:\n    directory: /srv").unwrap();
        let err = Config::from_file(file.path(), "testing").unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::StartupFailed);
    }
}

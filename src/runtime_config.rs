//! # Runtime Configuration Module
//!
//! Process-level defaults loaded from environment variables. They apply to
//! every application in the process unless the `system` section of the
//! application config overrides them.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `YAF_ENVIRON` | `product` | Config section used when none is given |
//! | `YAF_FORWARD_LIMIT` | `5` | Maximum `_handle` iterations per dispatch |
//! | `YAF_NAME_SUFFIX` | `true` | `IndexController` style vs `ControllerIndex` |
//! | `YAF_NAME_SEPARATOR` | `_` | Separator between name and kind |
//! | `YAF_LIBRARY` | unset | Global library directory |
//! | `YAF_LOWERCASE_PATH` | `false` | Lowercase directories when mapping classes |
//!
//! ## Usage
//!
//! ```rust
//! use yaf::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.forward_limit > 0);
//! ```

use std::env;
use std::path::PathBuf;

/// Default forward limit.
pub const DEFAULT_FORWARD_LIMIT: u32 = 5;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Environment name; selects the config section
    pub environ: String,
    /// Maximum number of dispatch iterations
    pub forward_limit: u32,
    /// Controller class names end with the kind (`Index_Controller`)
    pub name_suffix: bool,
    /// Separator between name and kind in class names
    pub name_separator: String,
    /// Global library directory for registered namespaces
    pub global_library: Option<PathBuf>,
    /// Lowercase directory components when mapping class names to paths
    pub lowercase_path: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environ: "product".to_string(),
            forward_limit: DEFAULT_FORWARD_LIMIT,
            name_suffix: true,
            name_separator: "_".to_string(),
            global_library: None,
            lowercase_path: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            environ: env::var("YAF_ENVIRON")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.environ),
            forward_limit: env::var("YAF_FORWARD_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.forward_limit),
            name_suffix: env::var("YAF_NAME_SUFFIX")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.name_suffix),
            name_separator: env::var("YAF_NAME_SEPARATOR").unwrap_or(defaults.name_separator),
            global_library: env::var("YAF_LIBRARY")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            lowercase_path: env::var("YAF_LOWERCASE_PATH")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.lowercase_path),
        }
    }
}

/// Parse an ini-style boolean (`1`, `on`, `yes`, `true` and their negatives).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" | "true" => Some(true),
        "0" | "off" | "no" | "false" | "" => Some(false),
        _ => None,
    }
}

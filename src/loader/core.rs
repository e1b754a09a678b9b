use crate::bootstrap::BootstrapClass;
use crate::controller::{ActionClass, ControllerClass};
use crate::error::{Error, ErrorCode, Result};
use crate::names::{class_name, title_case, title_case_segments, ClassKind};
use crate::plugin::{Plugin, PluginClass};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const CONTROLLER_DIRECTORY: &str = "controllers";
pub const MODULE_DIRECTORY: &str = "modules";
pub const VIEW_DIRECTORY: &str = "views";
pub const PLUGIN_DIRECTORY: &str = "plugins";
pub const LIBRARY_DIRECTORY: &str = "library";

/// Class name of the application bootstrap.
pub const BOOTSTRAP_CLASS: &str = "Bootstrap";

/// A class the loader can hand out once its script is loaded.
#[derive(Debug, Clone)]
pub enum ClassDef {
    Controller(ControllerClass),
    Action(ActionClass),
    Bootstrap(BootstrapClass),
    Plugin(PluginClass),
}

impl ClassDef {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClassDef::Controller(_) => "controller",
            ClassDef::Action(_) => "action",
            ClassDef::Bootstrap(_) => "bootstrap",
            ClassDef::Plugin(_) => "plugin",
        }
    }
}

#[derive(Debug, Clone)]
struct Declared {
    script: PathBuf,
    def: ClassDef,
}

/// Naming settings the loader needs from the application.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub app_directory: PathBuf,
    pub local_library: PathBuf,
    pub global_library: Option<PathBuf>,
    pub ext: String,
    pub default_module: String,
    pub bootstrap: Option<PathBuf>,
    pub name_suffix: bool,
    pub name_separator: String,
    pub lowercase_path: bool,
}

/// Class table plus the set of scripts loaded so far.
///
/// A declared class only becomes visible once the script it lives in has
/// been imported, and a script can only be imported if it exists on disk.
/// The same class name may be declared in several scripts (an `Index`
/// controller per module); each declaration is told apart by its script.
pub struct Loader {
    options: LoaderOptions,
    namespaces: Vec<String>,
    declared: HashMap<String, Vec<Declared>>,
    imported: HashSet<PathBuf>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("local_library", &self.options.local_library)
            .field("global_library", &self.options.global_library)
            .field("namespaces", &self.namespaces)
            .field("declared", &self.declared.len())
            .field("imported", &self.imported.len())
            .finish()
    }
}

impl Loader {
    #[must_use]
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            namespaces: Vec::new(),
            declared: HashMap::new(),
            imported: HashSet::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub(crate) fn set_app_directory(&mut self, directory: PathBuf) {
        self.options.app_directory = directory;
    }

    pub(crate) fn set_default_module(&mut self, module: &str) {
        self.options.default_module = module.to_string();
    }

    /// Replace the local (or, with `global`, the global) library path.
    pub fn set_library_path(&mut self, path: impl Into<PathBuf>, global: bool) {
        let path = path.into();
        if global {
            self.options.global_library = Some(path);
        } else {
            self.options.local_library = path;
        }
    }

    #[must_use]
    pub fn library_path(&self, global: bool) -> Option<&Path> {
        if global {
            self.options.global_library.as_deref()
        } else {
            Some(&self.options.local_library)
        }
    }

    /// Register namespaces resolved against the global library. Accepts a
    /// comma and/or space separated list.
    pub fn register_namespace(&mut self, names: &str) -> &mut Self {
        for name in names.split([',', ' ']).map(str::trim).filter(|s| !s.is_empty()) {
            let name = name.trim_end_matches(['_', '\\']).to_string();
            if !self.namespaces.contains(&name) {
                debug!(namespace = %name, "Namespace registered");
                self.namespaces.push(name);
            }
        }
        self
    }

    #[must_use]
    pub fn registered_namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn clear_namespaces(&mut self) {
        self.namespaces.clear();
    }

    /// `true` unless the class starts with a registered namespace.
    #[must_use]
    pub fn is_local_name(&self, class: &str) -> bool {
        let normalized = normalize_class(class);
        !self.namespaces.iter().any(|ns| {
            let ns = normalize_class(ns);
            normalized == ns
                || normalized
                    .strip_prefix(ns.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
        })
    }

    /// Map a class name to its script.
    ///
    /// `_`, `\` and `::` separate directories. Plugin classes live in
    /// `<app>/plugins`; classes of registered namespaces in the global
    /// library (falling back to the local one); everything else in the
    /// local library.
    #[must_use]
    pub fn class_path(&self, class: &str) -> PathBuf {
        if let Some(name) = self.strip_kind(class, ClassKind::Plugin) {
            return self.script_in(&self.options.app_directory.join(PLUGIN_DIRECTORY), &name);
        }
        let base = if self.is_local_name(class) {
            &self.options.local_library
        } else {
            self.options
                .global_library
                .as_ref()
                .unwrap_or(&self.options.local_library)
        };
        self.script_in(base, &normalize_class(class))
    }

    /// `Foo_Plugin` → `Foo` (or `Plugin_Foo` in prefix style).
    fn strip_kind(&self, class: &str, kind: ClassKind) -> Option<String> {
        let normalized = normalize_class(class);
        let sep = &self.options.name_separator;
        let marker = kind.as_str();
        let rest = if self.options.name_suffix {
            normalized.strip_suffix(&format!("{sep}{marker}"))
        } else {
            normalized.strip_prefix(&format!("{marker}{sep}"))
        }?;
        (!rest.is_empty()).then(|| rest.to_string())
    }

    /// `<dir>/<A>/<B>.<ext>` for name `A_B`, or `A<sep>B` with the
    /// configured name separator.
    fn script_in(&self, dir: &Path, name: &str) -> PathBuf {
        let sep = self.options.name_separator.as_str();
        let name = if sep.is_empty() || sep == "_" {
            name.to_string()
        } else {
            name.replace(sep, "_")
        };
        let segments: Vec<&str> = name.split('_').filter(|s| !s.is_empty()).collect();
        let mut path = dir.to_path_buf();
        if let Some((file, dirs)) = segments.split_last() {
            for d in dirs {
                if self.options.lowercase_path {
                    path.push(d.to_lowercase());
                } else {
                    path.push(d);
                }
            }
            path.push(format!("{file}.{}", self.options.ext));
        }
        path
    }

    fn resolve(&self, script: &Path) -> PathBuf {
        if script.is_absolute() {
            script.to_path_buf()
        } else {
            self.options.app_directory.join(script)
        }
    }

    /// Load a script once. Relative paths are taken from the local library.
    ///
    /// Returns `false` when the file does not exist.
    pub fn import(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.options.local_library.join(path)
        };
        if self.imported.contains(&path) {
            return true;
        }
        if !path.is_file() {
            debug!(script = %path.display(), "Script not found");
            return false;
        }
        debug!(script = %path.display(), "Script imported");
        self.imported.insert(path);
        true
    }

    #[must_use]
    pub fn is_imported(&self, path: &Path) -> bool {
        self.imported.contains(path)
    }

    /// Load `<dir>/<name>.<ext>` (with `_` as directory separator).
    pub fn internal_autoload(&mut self, name: &str, directory: &Path) -> bool {
        let path = self.script_in(directory, name);
        self.import(path)
    }

    /// Load the script of `class` by convention; `true` if the class is now
    /// available.
    pub fn autoload(&mut self, class: &str) -> bool {
        if self.is_loaded(class) {
            return true;
        }
        let path = self.class_path(class);
        if !self.import(&path) {
            return false;
        }
        let loaded = self.is_loaded(class);
        if !loaded {
            warn!(class = %class, script = %path.display(), "Script does not define the class");
        }
        loaded
    }

    /// Declare `class` as living in `script` (relative to the application
    /// directory, or absolute). Declaring it again in the same script
    /// replaces the earlier definition.
    pub fn declare(&mut self, class: &str, script: impl AsRef<Path>, def: ClassDef) -> &mut Self {
        let script = self.resolve(script.as_ref());
        debug!(class = %class, kind = def.kind(), script = %script.display(), "Class declared");
        let entries = self.declared.entry(class_key(class)).or_default();
        match entries.iter_mut().find(|d| d.script == script) {
            Some(existing) => existing.def = def,
            None => entries.push(Declared { script, def }),
        }
        self
    }

    /// Declare a controller at its conventional place.
    pub fn declare_controller(&mut self, module: &str, name: &str, class: ControllerClass) -> &mut Self {
        let name = title_case_segments(name);
        let script = self.controller_script(&title_case(module), &name);
        let class_name = self.class_name(ClassKind::Controller, &name);
        self.declare(&class_name, script, ClassDef::Controller(class))
    }

    /// Declare an action class at `<controllers>/<Controller>/<action>.<ext>`.
    pub fn declare_action(
        &mut self,
        module: &str,
        controller: &str,
        action: &str,
        class: ActionClass,
    ) -> &mut Self {
        let script = self.action_script(&title_case(module), &title_case_segments(controller), action);
        let class_name = self.class_name(ClassKind::Action, &title_case(action));
        self.declare(&class_name, script, ClassDef::Action(class))
    }

    /// Declare the application bootstrap at its configured place.
    pub fn declare_bootstrap(&mut self, class: BootstrapClass) -> &mut Self {
        let script = self.bootstrap_script();
        self.declare(BOOTSTRAP_CLASS, script, ClassDef::Bootstrap(class))
    }

    /// Declare a plugin at `<app>/plugins/<Name>.<ext>`.
    pub fn declare_plugin(&mut self, name: &str, class: PluginClass) -> &mut Self {
        let class_name = self.class_name(ClassKind::Plugin, name);
        let script = self.class_path(&class_name);
        self.declare(&class_name, script, ClassDef::Plugin(class))
    }

    /// Autoload and instantiate the plugin `name` (`Auth` → `Auth_Plugin`).
    pub fn plugin(&mut self, name: &str) -> Result<Arc<dyn Plugin>> {
        let class = self.class_name(ClassKind::Plugin, name);
        if !self.autoload(&class) {
            return Err(Error::new(
                ErrorCode::AutoloadFailed,
                format!("Could not load plugin class {class}"),
            ));
        }
        match self.lookup(&class) {
            Some(ClassDef::Plugin(plugin)) => Ok(plugin.instantiate()),
            _ => Err(Error::type_error(format!("Class {class} is not a plugin"))),
        }
    }

    /// The class, if one of its scripts has been loaded. With several
    /// loaded declarations the latest one wins.
    #[must_use]
    pub fn lookup(&self, class: &str) -> Option<&ClassDef> {
        self.declared
            .get(&class_key(class))?
            .iter()
            .rev()
            .find(|d| self.imported.contains(&d.script))
            .map(|d| &d.def)
    }

    /// The class declared in `script`, if that script has been loaded.
    #[must_use]
    pub fn lookup_at(&self, class: &str, script: &Path) -> Option<&ClassDef> {
        let script = self.resolve(script);
        if !self.imported.contains(&script) {
            return None;
        }
        self.declared
            .get(&class_key(class))?
            .iter()
            .find(|d| d.script == script)
            .map(|d| &d.def)
    }

    #[must_use]
    pub fn is_loaded(&self, class: &str) -> bool {
        self.lookup(class).is_some()
    }

    #[must_use]
    pub fn is_loaded_at(&self, class: &str, script: &Path) -> bool {
        self.lookup_at(class, script).is_some()
    }

    /// Script a class was last declared in.
    #[must_use]
    pub fn declared_script(&self, class: &str) -> Option<&Path> {
        self.declared
            .get(&class_key(class))?
            .last()
            .map(|d| d.script.as_path())
    }

    /// `Index_Controller` or `Controller_Index`, per the naming settings.
    #[must_use]
    pub fn class_name(&self, kind: ClassKind, name: &str) -> String {
        class_name(kind, name, self.options.name_suffix, &self.options.name_separator)
    }

    #[must_use]
    pub fn is_default_module(&self, module: &str) -> bool {
        self.options.default_module == module
    }

    /// `<app>/controllers` or `<app>/modules/<Module>/controllers`.
    #[must_use]
    pub fn controller_directory(&self, module: &str) -> PathBuf {
        self.module_directory(module).join(CONTROLLER_DIRECTORY)
    }

    /// `<app>/views` or `<app>/modules/<Module>/views`.
    #[must_use]
    pub fn view_directory(&self, module: &str) -> PathBuf {
        self.module_directory(module).join(VIEW_DIRECTORY)
    }

    fn module_directory(&self, module: &str) -> PathBuf {
        if self.is_default_module(module) {
            self.options.app_directory.clone()
        } else {
            self.options.app_directory.join(MODULE_DIRECTORY).join(module)
        }
    }

    /// `<controllers>/<A>/<B>.<ext>` for controller `A_B` of `module`.
    #[must_use]
    pub fn controller_script(&self, module: &str, controller: &str) -> PathBuf {
        self.script_in(&self.controller_directory(module), controller)
    }

    /// `<controllers>/<Controller>/<action lowercased>.<ext>`.
    #[must_use]
    pub fn action_script(&self, module: &str, controller: &str, action: &str) -> PathBuf {
        self.controller_directory(module)
            .join(controller)
            .join(format!("{}.{}", action.to_lowercase(), self.options.ext))
    }

    /// Configured bootstrap script, or `<app>/Bootstrap.<ext>`.
    #[must_use]
    pub fn bootstrap_script(&self) -> PathBuf {
        match &self.options.bootstrap {
            Some(path) => self.resolve(path),
            None => self
                .options
                .app_directory
                .join(format!("{BOOTSTRAP_CLASS}.{}", self.options.ext)),
        }
    }
}

fn class_key(class: &str) -> String {
    normalize_class(class).to_lowercase()
}

/// `Foo\Bar` and `Foo::Bar` → `Foo_Bar`.
fn normalize_class(class: &str) -> String {
    class
        .trim_start_matches('\\')
        .replace("::", "_")
        .replace('\\', "_")
}

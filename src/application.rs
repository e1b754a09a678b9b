//! # Application Module
//!
//! The [`Application`] ties configuration, settings, loader and dispatcher
//! together. Only one application may exist per process at a time; a second
//! [`Application::new`] fails with `STARTUP_FAILED` until the first one is
//! dropped.
//!
//! ## Lifecycle
//!
//! ```rust,ignore
//! use yaf::{Application, ControllerClass, BootstrapClass};
//!
//! let mut app = Application::new(PathBuf::from("conf/app.toml"), None)?;
//! app.loader_mut()
//!     .declare_bootstrap(BootstrapClass::of::<Bootstrap>())
//!     .declare_controller("Index", "Index", ControllerClass::of::<IndexController>());
//! app.bootstrap()?;
//! app.run()?;
//! ```
//!
//! `run` dispatches the request bound at construction (a `GET /` unless the
//! host replaced it through `dispatcher_mut().set_request(...)`) and may only
//! be called once. Hosts serving many requests call
//! `dispatcher_mut().dispatch(request)` for each of them instead.

use crate::bootstrap::BootstrapClass;
use crate::config::{Config, ConfigSource};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{Error, ErrorCode, Result};
use crate::globals::Globals;
use crate::http::Request;
use crate::loader::{ClassDef, Loader, BOOTSTRAP_CLASS};
use crate::runtime_config::RuntimeConfig;
use http::Method;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Set while an application exists.
static INSTANCE: AtomicBool = AtomicBool::new(false);

/// The application: one per process.
#[derive(Debug)]
pub struct Application {
    config: Config,
    dispatcher: Dispatcher,
    environ: String,
    running: bool,
    last_error: Option<(ErrorCode, String)>,
}

impl Application {
    /// Build the application from `source`.
    ///
    /// `section` selects the config section; when `None` or empty, the
    /// environ name (`YAF_ENVIRON`, default `product`) is used.
    pub fn new(source: impl Into<ConfigSource>, section: Option<&str>) -> Result<Self> {
        if INSTANCE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            error!("Application already exists");
            return Err(Error::startup("Only one application can be initialized"));
        }
        Self::build(source.into(), section).map_err(|e| {
            INSTANCE.store(false, Ordering::Release);
            error!(code = %e.code(), error = %e, "Application initialization failed");
            e
        })
    }

    fn build(source: ConfigSource, section: Option<&str>) -> Result<Self> {
        let runtime = RuntimeConfig::from_env();
        let section = match section {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => runtime.environ.clone(),
        };
        let config = Config::load(source, &section)?;
        let globals = Globals::parse_option(&config, &runtime)?;

        let mut request = Request::http(Method::GET, "/");
        request.set_base_uri(globals.base_uri.as_deref());

        let mut loader = Loader::new(globals.loader_options());
        for namespace in &globals.library_namespaces {
            loader.register_namespace(namespace);
        }

        let environ = globals.environ.clone();
        info!(
            environ = %environ,
            section = %section,
            directory = %globals.directory.display(),
            modules = ?globals.modules,
            "Application initialized"
        );
        let mut dispatcher = Dispatcher::new(globals, loader)?;
        dispatcher.set_request(request);

        Ok(Self {
            config,
            dispatcher,
            environ,
            running: false,
            last_error: None,
        })
    }

    /// Dispatch the bound request. Only once per application.
    pub fn run(&mut self) -> Result<DispatchOutcome> {
        if self.running {
            let err = Error::startup("An application instance already run");
            self.record(&err);
            return Err(err);
        }
        self.running = true;
        let result = self.dispatcher.dispatch_bound();
        if let Err(e) = &result {
            self.record(e);
        }
        result
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Load the `Bootstrap` class and run its `_init*` methods in
    /// declaration order.
    pub fn bootstrap(&mut self) -> Result<&mut Self> {
        let class = match self.bootstrap_class() {
            Ok(class) => class,
            Err(e) => {
                self.record(&e);
                return Err(e);
            }
        };
        match class.run(&mut self.dispatcher) {
            Ok(invoked) => {
                info!(methods = ?invoked, "Bootstrap complete");
                Ok(self)
            }
            Err(e) => {
                self.record(&e);
                Err(e)
            }
        }
    }

    fn bootstrap_class(&mut self) -> Result<BootstrapClass> {
        let loader = self.dispatcher.loader_mut();
        let script = loader.bootstrap_script();
        if !loader.import(&script) {
            return Err(Error::startup(format!(
                "Couldn't find bootstrap file {}",
                script.display()
            )));
        }
        match loader.lookup(BOOTSTRAP_CLASS) {
            Some(ClassDef::Bootstrap(class)) => Ok(class.clone()),
            Some(other) => Err(Error::type_error(format!(
                "Expect a Bootstrap instance, {} given",
                other.kind()
            ))),
            None => Err(Error::startup(format!(
                "Couldn't find class {BOOTSTRAP_CLASS} in {}",
                script.display()
            ))),
        }
    }

    /// Call `f`, turning errors and panics into `None`.
    pub fn execute<T>(&mut self, f: impl FnOnce() -> Result<T>) -> Option<T> {
        let outcome = catch_unwind(AssertUnwindSafe(f))
            .unwrap_or_else(|panic| Err(Error::from_panic("Executed callable", panic)));
        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(code = %e.code(), error = %e, "Executed callable failed");
                self.record(&e);
                None
            }
        }
    }

    #[must_use]
    pub fn environ(&self) -> &str {
        &self.environ
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn loader_mut(&mut self) -> &mut Loader {
        self.dispatcher.loader_mut()
    }

    #[must_use]
    pub fn modules(&self) -> &[String] {
        &self.dispatcher.globals().modules
    }

    /// Case-sensitive test against the TitleCase module list.
    #[must_use]
    pub fn is_module_name(&self, name: &str) -> bool {
        self.dispatcher.globals().is_module_name(name)
    }

    #[must_use]
    pub fn app_directory(&self) -> &Path {
        self.dispatcher.app_directory()
    }

    /// Move the application root; `directory` must be an existing absolute
    /// directory.
    pub fn set_app_directory(&mut self, directory: impl Into<PathBuf>) -> Result<&mut Self> {
        let directory = directory.into();
        if !directory.is_absolute() || !directory.is_dir() {
            return Err(Error::type_error(format!(
                "Expects a valid absolute directory, '{}' given",
                directory.display()
            )));
        }
        self.dispatcher.set_app_directory(directory);
        Ok(self)
    }

    /// Numeric code of the last recorded error, `0` when there is none.
    #[must_use]
    pub fn last_error_no(&self) -> i32 {
        self.last_error.as_ref().map_or(0, |(code, _)| code.code())
    }

    #[must_use]
    pub fn last_error_msg(&self) -> &str {
        self.last_error.as_ref().map_or("", |(_, msg)| msg.as_str())
    }

    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    fn record(&mut self, err: &Error) {
        self.last_error = Some((err.code(), err.message().to_string()));
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        INSTANCE.store(false, Ordering::Release);
    }
}

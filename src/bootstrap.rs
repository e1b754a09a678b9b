//! # Bootstrap Module
//!
//! The application's `Bootstrap` class configures the dispatcher before the
//! first request: registering plugins, routes, views. Every method whose name
//! starts with `_init` (case-insensitive) is run in declaration order with the
//! dispatcher; other methods are left alone.
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Bootstrap;
//!
//! #[yaf::bootstrap]
//! impl Bootstrap {
//!     fn _init_routes(&mut self, dispatcher: &mut Dispatcher) -> yaf::Result<()> {
//!         dispatcher.router_mut().add_config(&routes())?;
//!         Ok(())
//!     }
//!
//!     fn _init_plugins(&mut self, dispatcher: &mut Dispatcher) -> yaf::Result<()> {
//!         dispatcher.register_plugin(Arc::new(Auth));
//!         Ok(())
//!     }
//! }
//! ```

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Prefix selecting the methods the runner invokes.
pub const INIT_PREFIX: &str = "_init";

/// A bootstrap method.
pub type InitMethod<B> = fn(&mut B, &mut Dispatcher) -> Result<()>;

/// A user bootstrap class.
pub trait Bootstrap: Send + 'static {
    /// All methods in declaration order, init or not.
    fn methods() -> Vec<(&'static str, InitMethod<Self>)>
    where
        Self: Sized;
}

/// Type-erased bootstrap instance.
pub(crate) trait BootstrapObject: Send {
    fn method_names(&self) -> Vec<&'static str>;
    fn call(&mut self, index: usize, dispatcher: &mut Dispatcher) -> Result<()>;
}

struct Instance<B: Bootstrap> {
    inner: B,
    methods: Vec<(&'static str, InitMethod<B>)>,
}

impl<B: Bootstrap> BootstrapObject for Instance<B> {
    fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|(name, _)| *name).collect()
    }

    fn call(&mut self, index: usize, dispatcher: &mut Dispatcher) -> Result<()> {
        match self.methods.get(index) {
            Some((_, method)) => method(&mut self.inner, dispatcher),
            None => Err(Error::call_failed(format!("No bootstrap method #{index}"))),
        }
    }
}

type BootstrapFactory = dyn Fn() -> Box<dyn BootstrapObject> + Send + Sync;

/// Constructor of a bootstrap class, registered with the loader.
#[derive(Clone)]
pub struct BootstrapClass {
    factory: Arc<BootstrapFactory>,
    type_name: &'static str,
}

impl BootstrapClass {
    #[must_use]
    pub fn of<B: Bootstrap + Default>() -> Self {
        Self::new(B::default)
    }

    #[must_use]
    pub fn new<B: Bootstrap>(factory: impl Fn() -> B + Send + Sync + 'static) -> Self {
        Self {
            factory: Arc::new(move || {
                Box::new(Instance {
                    inner: factory(),
                    methods: B::methods(),
                }) as Box<dyn BootstrapObject>
            }),
            type_name: std::any::type_name::<B>(),
        }
    }

    /// Instantiate and run every `_init*` method against `dispatcher`.
    ///
    /// Returns the names of the methods run. The first failing (or
    /// panicking) method aborts the run.
    pub fn run(&self, dispatcher: &mut Dispatcher) -> Result<Vec<&'static str>> {
        let mut instance = (self.factory)();
        let mut invoked = Vec::new();
        for (index, name) in instance.method_names().into_iter().enumerate() {
            if !is_init_method(name) {
                debug!(method = name, "Skipping non-init bootstrap method");
                continue;
            }
            info!(bootstrap = self.type_name, method = name, "Running bootstrap method");
            let outcome = catch_unwind(AssertUnwindSafe(|| instance.call(index, dispatcher)))
                .unwrap_or_else(|panic| Err(Error::from_panic(&format!("Bootstrap method {name}"), panic)));
            if let Err(e) = outcome {
                error!(method = name, error = %e, code = %e.code(), "Bootstrap method failed");
                return Err(e);
            }
            invoked.push(name);
        }
        Ok(invoked)
    }
}

impl fmt::Debug for BootstrapClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BootstrapClass").field(&self.type_name).finish()
    }
}

/// `_init` prefix, compared case-insensitively.
#[must_use]
pub fn is_init_method(name: &str) -> bool {
    name.len() >= INIT_PREFIX.len()
        && name.is_char_boundary(INIT_PREFIX.len())
        && name[..INIT_PREFIX.len()].eq_ignore_ascii_case(INIT_PREFIX)
}

//! # Plugin Module
//!
//! Plugins observe and steer a dispatch through seven hooks, fired on every
//! registered plugin in registration order:
//!
//! 1. `router_startup` - before routing
//! 2. `router_shutdown` - after routing
//! 3. `dispatch_loop_startup` - before the forward loop
//! 4. `pre_dispatch` - before each action
//! 5. `post_dispatch` - after each action
//! 6. `dispatch_loop_shutdown` - after the forward loop
//! 7. `pre_response` - before the response is returned or flushed
//!
//! Every hook defaults to a no-op, so a plugin implements only what it needs.
//! The first hook returning an error stops its batch; the error then goes
//! through the dispatcher's exception handling.

use crate::error::Result;
use crate::http::{Request, Response};
use std::fmt;
use std::sync::Arc;

/// A dispatch observer.
pub trait Plugin: Send + Sync {
    fn router_startup(&self, _request: &mut Request, _response: &mut Response) -> Result<()> {
        Ok(())
    }
    fn router_shutdown(&self, _request: &mut Request, _response: &mut Response) -> Result<()> {
        Ok(())
    }
    fn dispatch_loop_startup(&self, _request: &mut Request, _response: &mut Response) -> Result<()> {
        Ok(())
    }
    fn pre_dispatch(&self, _request: &mut Request, _response: &mut Response) -> Result<()> {
        Ok(())
    }
    fn post_dispatch(&self, _request: &mut Request, _response: &mut Response) -> Result<()> {
        Ok(())
    }
    fn dispatch_loop_shutdown(&self, _request: &mut Request, _response: &mut Response) -> Result<()> {
        Ok(())
    }
    fn pre_response(&self, _request: &mut Request, _response: &mut Response) -> Result<()> {
        Ok(())
    }
}

/// The seven hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    RouterStartup,
    RouterShutdown,
    DispatchLoopStartup,
    PreDispatch,
    PostDispatch,
    DispatchLoopShutdown,
    PreResponse,
}

impl Hook {
    pub const ALL: [Hook; 7] = [
        Hook::RouterStartup,
        Hook::RouterShutdown,
        Hook::DispatchLoopStartup,
        Hook::PreDispatch,
        Hook::PostDispatch,
        Hook::DispatchLoopShutdown,
        Hook::PreResponse,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Hook::RouterStartup => "routerStartup",
            Hook::RouterShutdown => "routerShutdown",
            Hook::DispatchLoopStartup => "dispatchLoopStartup",
            Hook::PreDispatch => "preDispatch",
            Hook::PostDispatch => "postDispatch",
            Hook::DispatchLoopShutdown => "dispatchLoopShutdown",
            Hook::PreResponse => "preResponse",
        }
    }

    /// Call this hook on `plugin`.
    pub fn fire(self, plugin: &dyn Plugin, request: &mut Request, response: &mut Response) -> Result<()> {
        match self {
            Hook::RouterStartup => plugin.router_startup(request, response),
            Hook::RouterShutdown => plugin.router_shutdown(request, response),
            Hook::DispatchLoopStartup => plugin.dispatch_loop_startup(request, response),
            Hook::PreDispatch => plugin.pre_dispatch(request, response),
            Hook::PostDispatch => plugin.post_dispatch(request, response),
            Hook::DispatchLoopShutdown => plugin.dispatch_loop_shutdown(request, response),
            Hook::PreResponse => plugin.pre_response(request, response),
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type PluginFactory = dyn Fn() -> Arc<dyn Plugin> + Send + Sync;

/// Constructor of a plugin class, registered with the loader so plugins can
/// be autoloaded from `<app>/plugins/<Name>.<ext>`.
#[derive(Clone)]
pub struct PluginClass {
    factory: Arc<PluginFactory>,
    type_name: &'static str,
}

impl PluginClass {
    #[must_use]
    pub fn of<P: Plugin + Default + 'static>() -> Self {
        Self::new(P::default)
    }

    #[must_use]
    pub fn new<P: Plugin + 'static>(factory: impl Fn() -> P + Send + Sync + 'static) -> Self {
        Self {
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Plugin>),
            type_name: std::any::type_name::<P>(),
        }
    }

    #[must_use]
    pub fn instantiate(&self) -> Arc<dyn Plugin> {
        (self.factory)()
    }
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginClass").field(&self.type_name).finish()
    }
}

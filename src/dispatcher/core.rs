use crate::error::{Error, ErrorCode, ErrorMask, Result};
use crate::globals::Globals;
use crate::http::{Emitter, Request, Response, StdoutEmitter};
use crate::loader::Loader;
use crate::names::{title_case, title_case_segments};
use crate::plugin::Plugin;
use crate::router::{route_from_config, RequestRouter, Router};
use crate::view::{SimpleView, View};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Callback notified of uncaught dispatch errors when exceptions are not
/// thrown.
pub type ErrorHandler = Box<dyn Fn(&Error) + Send + Sync>;

/// What a successful dispatch produced.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// `return_response` was on: the response is handed back unflushed.
    Returned(Response),
    /// The response was written to the emitter.
    Flushed,
}

impl DispatchOutcome {
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            DispatchOutcome::Returned(response) => Some(response),
            DispatchOutcome::Flushed => None,
        }
    }
}

/// The request dispatcher.
///
/// Owns the router, the view, the plugin list and the loader, and runs the
/// dispatch pipeline for one request at a time.
pub struct Dispatcher {
    pub(super) globals: Globals,
    pub(super) router: Router,
    pub(super) custom_router: Option<Box<dyn RequestRouter>>,
    pub(super) view: Option<Box<dyn View>>,
    pub(super) request: Option<Request>,
    pub(super) plugins: Vec<Arc<dyn Plugin>>,
    pub(super) loader: Loader,
    pub(super) default_module: String,
    pub(super) default_controller: String,
    pub(super) default_action: String,
    pub(super) auto_render: bool,
    pub(super) return_response: bool,
    pub(super) instantly_flush: bool,
    pub(super) throw_exception: bool,
    pub(super) catch_exception: bool,
    pub(super) error_handler: Option<(ErrorHandler, ErrorMask)>,
    pub(super) emitter: Box<dyn Emitter>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("custom_router", &self.custom_router.is_some())
            .field("plugins", &self.plugins.len())
            .field("default_module", &self.default_module)
            .field("default_controller", &self.default_controller)
            .field("default_action", &self.default_action)
            .field("auto_render", &self.auto_render)
            .field("return_response", &self.return_response)
            .field("instantly_flush", &self.instantly_flush)
            .field("throw_exception", &self.throw_exception)
            .field("catch_exception", &self.catch_exception)
            .finish()
    }
}

impl Dispatcher {
    /// Build a dispatcher from parsed settings.
    ///
    /// Fails when `dispatcher.defaultRoute` is present but invalid.
    pub fn new(globals: Globals, loader: Loader) -> Result<Self> {
        let mut router = Router::new(globals.modules.clone());
        if let Some(config) = &globals.default_route {
            let route = route_from_config(config, &globals.modules)?;
            router.set_default_route(route);
        }
        debug!(
            default_module = %globals.default_module,
            default_controller = %globals.default_controller,
            default_action = %globals.default_action,
            modules = ?globals.modules,
            "Dispatcher created"
        );
        Ok(Self {
            default_module: globals.default_module.clone(),
            default_controller: globals.default_controller.clone(),
            default_action: globals.default_action.clone(),
            throw_exception: globals.throw_exception,
            catch_exception: globals.catch_exception,
            globals,
            router,
            custom_router: None,
            view: None,
            request: None,
            plugins: Vec::new(),
            loader,
            auto_render: true,
            return_response: false,
            instantly_flush: false,
            error_handler: None,
            emitter: Box::new(StdoutEmitter),
        })
    }

    #[must_use]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub(crate) fn set_app_directory(&mut self, directory: PathBuf) {
        self.loader.set_app_directory(directory.clone());
        self.globals.directory = directory;
    }

    #[must_use]
    pub fn app_directory(&self) -> &Path {
        &self.globals.directory
    }

    #[must_use]
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut Loader {
        &mut self.loader
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Install a router used instead of the built-in one.
    pub fn set_router(&mut self, router: Box<dyn RequestRouter>) -> &mut Self {
        self.custom_router = Some(router);
        self
    }

    /// Bind the request the next [`Dispatcher::dispatch_bound`] runs.
    pub fn set_request(&mut self, request: Request) -> &mut Self {
        self.request = Some(request);
        self
    }

    /// The bound request; after a dispatch, the request as it left the
    /// pipeline.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    pub fn set_view(&mut self, view: Box<dyn View>) -> &mut Self {
        self.view = Some(view);
        self
    }

    #[must_use]
    pub fn view(&self) -> Option<&dyn View> {
        self.view.as_deref()
    }

    /// The view, creating a [`SimpleView`] over `script_path` if none is set.
    pub fn init_view(&mut self, script_path: Option<&Path>) -> &mut dyn View {
        &mut **self.view.get_or_insert_with(|| {
            debug!(script_path = ?script_path, "Initializing default view");
            Box::new(SimpleView::new(script_path.map(Path::to_path_buf))) as Box<dyn View>
        })
    }

    /// Where flushed responses go. Defaults to stdout.
    pub fn set_emitter(&mut self, emitter: Box<dyn Emitter>) -> &mut Self {
        self.emitter = emitter;
        self
    }

    /// Set the default module; it must be a configured module.
    pub fn set_default_module(&mut self, module: &str) -> Result<&mut Self> {
        let module = title_case(module);
        if !self.globals.is_module_name(&module) {
            return Err(Error::new(
                ErrorCode::ModuleNotFound,
                format!("There is no module {module}"),
            ));
        }
        self.loader.set_default_module(&module);
        self.default_module = module;
        Ok(self)
    }

    pub fn set_default_controller(&mut self, controller: &str) -> &mut Self {
        self.default_controller = title_case_segments(controller);
        self
    }

    pub fn set_default_action(&mut self, action: &str) -> &mut Self {
        self.default_action = action.to_lowercase();
        self
    }

    #[must_use]
    pub fn default_module(&self) -> &str {
        &self.default_module
    }

    #[must_use]
    pub fn default_controller(&self) -> &str {
        &self.default_controller
    }

    #[must_use]
    pub fn default_action(&self) -> &str {
        &self.default_action
    }

    pub fn return_response(&mut self, flag: bool) -> &mut Self {
        self.return_response = flag;
        self
    }

    pub fn flush_instantly(&mut self, flag: bool) -> &mut Self {
        self.instantly_flush = flag;
        self
    }

    pub fn auto_render(&mut self, flag: bool) -> &mut Self {
        self.auto_render = flag;
        self
    }

    pub fn enable_view(&mut self) -> &mut Self {
        self.auto_render(true)
    }

    pub fn disable_view(&mut self) -> &mut Self {
        self.auto_render(false)
    }

    pub fn throw_exception(&mut self, flag: bool) -> &mut Self {
        self.throw_exception = flag;
        self
    }

    pub fn catch_exception(&mut self, flag: bool) -> &mut Self {
        self.catch_exception = flag;
        self
    }

    #[must_use]
    pub fn is_auto_render(&self) -> bool {
        self.auto_render
    }

    #[must_use]
    pub fn is_return_response(&self) -> bool {
        self.return_response
    }

    #[must_use]
    pub fn is_flush_instantly(&self) -> bool {
        self.instantly_flush
    }

    #[must_use]
    pub fn is_throw_exception(&self) -> bool {
        self.throw_exception
    }

    #[must_use]
    pub fn is_catch_exception(&self) -> bool {
        self.catch_exception
    }

    /// Report uncaught errors whose code is in `mask` to `handler`. Only used
    /// while `throw_exception` is off.
    pub fn set_error_handler(
        &mut self,
        handler: impl Fn(&Error) + Send + Sync + 'static,
        mask: ErrorMask,
    ) -> &mut Self {
        self.error_handler = Some((Box::new(handler), mask));
        self
    }

    /// Append a plugin; hooks fire in registration order.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.plugins.push(plugin);
        info!(plugins = self.plugins.len(), "Plugin registered");
        self
    }

    /// Autoload `<app>/plugins/<name>.<ext>` and register the plugin it holds.
    pub fn register_plugin_class(&mut self, name: &str) -> Result<&mut Self> {
        let plugin = self.loader.plugin(name)?;
        Ok(self.register_plugin(plugin))
    }

    #[must_use]
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Canonical case for the routed names, defaults for the missing ones.
    pub(super) fn fix_default(&self, request: &mut Request) {
        let module = match request.module() {
            "" => self.default_module.clone(),
            m => title_case(m),
        };
        let controller = match request.controller() {
            "" => self.default_controller.clone(),
            c => title_case_segments(c),
        };
        let action = match request.action() {
            "" => title_case(&self.default_action),
            a => title_case(a),
        };
        request.set_module(module);
        request.set_controller(controller);
        request.set_action(action);
    }
}

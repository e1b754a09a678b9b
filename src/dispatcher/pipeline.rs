//! The dispatch state machine.
//!
//! ```text
//! routerStartup -> route -> fix names -> routerShutdown      (unless routed)
//! dispatchLoopStartup
//! loop (forward_limit): preDispatch -> handle -> postDispatch
//! dispatchLoopShutdown
//! auto render -> preResponse -> return or flush
//! ```
//!
//! Every step returns `Result`. The first failing step is either turned into
//! an `Error/error` dispatch that re-enters the forward loop with a fresh
//! budget (catch mode), or returned. A second failure is always returned.

use super::core::{DispatchOutcome, Dispatcher};
use crate::controller::{Action, ActionContext, Args, ControllerClass, ParamSpec};
use crate::error::{Error, ErrorCode, Result};
use crate::http::{Request, Response, EXCEPTION_PARAM};
use crate::loader::ClassDef;
use crate::names::{default_template, title_case, title_case_segments, ClassKind};
use crate::plugin::Hook;
use crate::view::join_template;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

/// Controller caught errors are dispatched to.
pub const ERROR_CONTROLLER: &str = "Error";

/// Action of [`ERROR_CONTROLLER`] caught errors are dispatched to.
pub const ERROR_ACTION: &str = "error";

#[derive(Debug, Default)]
struct DispatchState {
    /// Set once a caught error has been turned into an error dispatch.
    in_exception: bool,
    rendered: bool,
    /// View directory of the module handled last.
    view_directory: PathBuf,
    handled: u32,
}

enum Handler {
    Method(Vec<ParamSpec>),
    Class(Box<dyn Action>),
}

impl Dispatcher {
    /// Dispatch the request bound with [`Dispatcher::set_request`].
    pub fn dispatch_bound(&mut self) -> Result<DispatchOutcome> {
        let request = self
            .request
            .take()
            .ok_or_else(|| Error::dispatch("No request bound to the dispatcher"))?;
        self.dispatch(request)
    }

    /// Run the whole pipeline for `request`.
    ///
    /// The request is kept afterwards and can be inspected through
    /// [`Dispatcher::request`].
    pub fn dispatch(&mut self, mut request: Request) -> Result<DispatchOutcome> {
        let span = info_span!("dispatch", request_id = %request.request_id(), uri = %request.uri());
        let _enter = span.enter();
        let started = Instant::now();

        let mut response = Response::new(request.kind());
        let mut state = DispatchState::default();
        let result = self
            .run(&mut request, &mut response, &mut state)
            .and_then(|()| self.respond(response));

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(
                module = %request.module(),
                controller = %request.controller(),
                action = %request.action(),
                iterations = state.handled,
                caught = state.in_exception,
                duration_ms = duration_ms,
                "Dispatch complete"
            ),
            Err(e) => {
                error!(
                    code = %e.code(),
                    error = %e,
                    module = %request.module(),
                    controller = %request.controller(),
                    action = %request.action(),
                    duration_ms = duration_ms,
                    "Dispatch failed"
                );
                self.notify_error_handler(e);
            }
        }
        self.request = Some(request);
        result
    }

    fn run(&mut self, request: &mut Request, response: &mut Response, state: &mut DispatchState) -> Result<()> {
        let startup = self.start(request, response);
        self.latch(startup, request, response, state)?;
        self.init_view(None);

        loop {
            self.forward_loop(request, response, state)?;
            let finished = self
                .fire(Hook::DispatchLoopShutdown, request, response)
                .and_then(|()| self.render_default(request, response, state));
            if !self.latch(finished, request, response, state)? {
                break;
            }
        }
        self.fire(Hook::PreResponse, request, response)
    }

    /// Routing (unless already routed) and `dispatchLoopStartup`.
    fn start(&mut self, request: &mut Request, response: &mut Response) -> Result<()> {
        if request.is_routed() {
            self.fix_default(request);
        } else {
            self.fire(Hook::RouterStartup, request, response)?;
            self.route(request)?;
            self.fix_default(request);
            self.fire(Hook::RouterShutdown, request, response)?;
            request.set_routed(true);
        }
        self.fire(Hook::DispatchLoopStartup, request, response)
    }

    /// Run `preDispatch`, the action and `postDispatch` until the request
    /// stays dispatched. A caught error restarts the count.
    fn forward_loop(&mut self, request: &mut Request, response: &mut Response, state: &mut DispatchState) -> Result<()> {
        let limit = self.globals.forward_limit;
        'budget: loop {
            for iteration in 1..=limit {
                let pre = self.fire(Hook::PreDispatch, request, response);
                if self.latch(pre, request, response, state)? {
                    continue 'budget;
                }
                let handled = self
                    .handle(request, response, state)
                    .and_then(|()| self.flush_instant(response));
                let caught = self.latch(handled, request, response, state)?;
                let post = self.fire(Hook::PostDispatch, request, response);
                if self.latch(post, request, response, state)? || caught {
                    continue 'budget;
                }
                if request.is_dispatched() {
                    return Ok(());
                }
                debug!(
                    iteration = iteration,
                    module = %request.module(),
                    controller = %request.controller(),
                    action = %request.action(),
                    "Forwarding"
                );
            }
            if !self.latch(Err(forward_overflow(limit)), request, response, state)? {
                return Ok(());
            }
        }
    }

    /// Turn a failed step into a dispatch of `Error/error`, once.
    ///
    /// Returns `Ok(true)` when the request was rewritten and the forward loop
    /// must run again, `Ok(false)` when `outcome` succeeded, and the error
    /// itself when it is not caught.
    fn latch(
        &mut self,
        outcome: Result<()>,
        request: &mut Request,
        response: &mut Response,
        state: &mut DispatchState,
    ) -> Result<bool> {
        let err = match outcome {
            Ok(()) => return Ok(false),
            Err(err) => err,
        };
        if !self.catch_exception || state.in_exception {
            return Err(err);
        }
        state.in_exception = true;
        let err = Arc::new(err);
        warn!(
            code = %err.code(),
            error = %err,
            module = %request.module(),
            controller = %request.controller(),
            action = %request.action(),
            "Dispatching caught error to the error controller"
        );

        let module = title_case(request.module());
        if self.globals.is_module_name(&module) {
            request.set_module(module);
        } else {
            request.set_module(self.default_module.clone());
        }
        request.set_controller(ERROR_CONTROLLER);
        request.set_action(ERROR_ACTION);
        request.set_param(EXCEPTION_PARAM, Arc::clone(&err));
        request.set_dispatched(false);
        response.clear_body(None);
        state.rendered = false;
        Ok(true)
    }

    /// Resolve and run the current action once.
    fn handle(&mut self, request: &mut Request, response: &mut Response, state: &mut DispatchState) -> Result<()> {
        request.set_dispatched(true);
        state.handled += 1;

        if self.globals.directory.as_os_str().is_empty() {
            return Err(Error::dispatch("Application directory is not set"));
        }
        // forwards may name targets in any case
        let mut module = title_case(request.module());
        let controller = title_case_segments(request.controller());
        request.set_module(module.clone());
        request.set_controller(controller.clone());
        if module.is_empty() {
            return Err(Error::dispatch("Unexpected an empty module name"));
        }
        if !self.globals.is_module_name(&module) {
            return Err(Error::new(
                ErrorCode::ModuleNotFound,
                format!("There is no module {module}"),
            ));
        }
        if controller.is_empty() {
            return Err(Error::dispatch("Unexpected an empty controller name"));
        }

        let class = match self.get_controller(&module, &controller) {
            Err(e)
                if state.in_exception
                    && e.code() == ErrorCode::ControllerNotFound
                    && controller == ERROR_CONTROLLER
                    && module != self.default_module =>
            {
                debug!(
                    module = %module,
                    error = %e,
                    "No error controller in module, using the default module"
                );
                module.clone_from(&self.default_module);
                request.set_module(module.clone());
                self.get_controller(&module, &controller)?
            }
            other => other?,
        };
        let view_directory = self.loader.view_directory(&module);
        state.view_directory.clone_from(&view_directory);
        let view_ext = self.globals.view_ext.clone();
        let mut instance = class.instantiate();

        // C1: controller init, may forward
        {
            let view = self.init_view(None);
            let mut cx = ActionContext::new(request, response, view, &controller, &view_directory, &view_ext);
            let outcome = catch_unwind(AssertUnwindSafe(|| instance.init(&mut cx)))
                .unwrap_or_else(|panic| Err(Error::from_panic(&format!("{controller}::init"), panic)));
            state.rendered |= cx.is_rendered();
            outcome?;
        }
        if !request.is_dispatched() {
            debug!(controller = %controller, "Controller init forwarded");
            return Ok(());
        }

        // C2: action method, else action class
        let action = request.action().to_lowercase();
        let mut handler = match instance.action_params(&action) {
            Some(params) => Handler::Method(params),
            None => Handler::Class(self.get_action(&module, &controller, &action)?),
        };
        let args = match &handler {
            Handler::Method(params) => Args::bind(params, request),
            Handler::Class(action_class) => Args::bind(&action_class.params(), request),
        };

        info!(
            request_id = %request.request_id(),
            module = %module,
            controller = %controller,
            action = %action,
            controller_class = class.type_name(),
            args = args.len(),
            "Action execution start"
        );
        let started = Instant::now();
        let outcome = {
            let view = self.init_view(None);
            let mut cx = ActionContext::new(request, response, view, &controller, &view_directory, &view_ext);
            let outcome = catch_unwind(AssertUnwindSafe(|| match &mut handler {
                Handler::Method(_) => instance.invoke(&action, &mut cx, &args),
                Handler::Class(action_class) => action_class.execute(&mut cx, &args),
            }))
            .unwrap_or_else(|panic| Err(Error::from_panic(&format!("{controller}::{action}Action"), panic)));
            state.rendered |= cx.is_rendered();
            outcome
        };

        // C3: action complete
        let execution_time_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(()) => info!(
                request_id = %request.request_id(),
                controller = %controller,
                action = %action,
                execution_time_ms = execution_time_ms,
                dispatched = request.is_dispatched(),
                "Action execution complete"
            ),
            Err(e) => warn!(
                request_id = %request.request_id(),
                controller = %controller,
                action = %action,
                code = %e.code(),
                error = %e,
                "Action failed"
            ),
        }
        outcome
    }

    /// Load the controller class of `controller` in `module`.
    fn get_controller(&mut self, module: &str, controller: &str) -> Result<ControllerClass> {
        let directory = self.loader.controller_directory(module);
        let class = self.loader.class_name(ClassKind::Controller, controller);
        let script = self.loader.controller_script(module, controller);
        if !self.loader.is_loaded_at(&class, &script) {
            if !self.loader.internal_autoload(controller, &directory) {
                return Err(Error::new(
                    ErrorCode::ControllerNotFound,
                    format!(
                        "Failed opening controller script for {controller} in {}",
                        directory.display()
                    ),
                ));
            }
            if !self.loader.is_loaded_at(&class, &script) {
                return Err(Error::new(
                    ErrorCode::AutoloadFailed,
                    format!("Could not find class {class} in {}", script.display()),
                ));
            }
        }
        match self.loader.lookup_at(&class, &script) {
            Some(ClassDef::Controller(c)) => Ok(c.clone()),
            Some(other) => Err(Error::type_error(format!(
                "Controller must be an instance of Controller, {class} is a {}",
                other.kind()
            ))),
            None => Err(Error::new(
                ErrorCode::AutoloadFailed,
                format!("Could not find class {class}"),
            )),
        }
    }

    /// Load the action class for `action` of `controller`.
    fn get_action(&mut self, module: &str, controller: &str, action: &str) -> Result<Box<dyn Action>> {
        let class = self.loader.class_name(ClassKind::Action, &title_case(action));
        let script = self.loader.action_script(module, controller, action);
        if !self.loader.is_loaded_at(&class, &script) && !self.loader.import(&script) {
            return Err(Error::new(
                ErrorCode::ActionNotFound,
                format!("There is no method {action}Action in {controller} controller"),
            ));
        }
        match self.loader.lookup_at(&class, &script) {
            Some(ClassDef::Action(a)) => Ok(a.instantiate()),
            Some(other) => Err(Error::type_error(format!(
                "Action must be an instance of Action, {class} is a {}",
                other.kind()
            ))),
            None => Err(Error::new(
                ErrorCode::AutoloadFailed,
                format!("Could not find action {class} in {}", script.display()),
            )),
        }
    }

    fn route(&mut self, request: &mut Request) -> Result<()> {
        let routed = match self.custom_router.as_mut() {
            Some(router) => router.route(request),
            None => self.router.route(request),
        };
        if routed {
            Ok(())
        } else {
            Err(Error::new(ErrorCode::RouteFailed, "Routing request failed"))
        }
    }

    /// Fire `hook` on every plugin, in registration order.
    fn fire(&self, hook: Hook, request: &mut Request, response: &mut Response) -> Result<()> {
        if self.plugins.is_empty() {
            return Ok(());
        }
        let plugins = self.plugins.clone();
        for (index, plugin) in plugins.iter().enumerate() {
            debug!(hook = %hook, plugin = index, "Firing plugin hook");
            catch_unwind(AssertUnwindSafe(|| hook.fire(&**plugin, request, response)))
                .unwrap_or_else(|panic| Err(Error::from_panic(&format!("Plugin hook {hook}"), panic)))
                .map_err(|e| {
                    warn!(hook = %hook, plugin = index, code = %e.code(), error = %e, "Plugin hook failed");
                    e
                })?;
        }
        Ok(())
    }

    /// Render `<controller>/<action>.<view_ext>` unless something rendered
    /// already or auto render is off.
    fn render_default(&mut self, request: &Request, response: &mut Response, state: &mut DispatchState) -> Result<()> {
        if !self.auto_render || state.rendered {
            return Ok(());
        }
        let template = default_template(request.controller(), request.action(), &self.globals.view_ext);
        let view = self.init_view(None);
        let base = view
            .script_path()
            .map_or_else(|| state.view_directory.clone(), Path::to_path_buf);
        let path = join_template(&base, Path::new(&template))?;
        let output = view.render(&path, None)?;
        response.append_body(&output);
        state.rendered = true;
        debug!(template = %path.display(), "Auto rendered");
        Ok(())
    }

    fn flush_instant(&mut self, response: &mut Response) -> Result<()> {
        if self.instantly_flush {
            response.response(self.emitter.as_mut())?;
        }
        Ok(())
    }

    fn respond(&mut self, mut response: Response) -> Result<DispatchOutcome> {
        if self.return_response {
            return Ok(DispatchOutcome::Returned(response));
        }
        response.response(self.emitter.as_mut())?;
        Ok(DispatchOutcome::Flushed)
    }

    fn notify_error_handler(&self, err: &Error) {
        if self.throw_exception {
            return;
        }
        if let Some((handler, mask)) = &self.error_handler {
            if mask.contains(err.code().mask()) {
                handler(err);
            }
        }
    }
}

fn forward_overflow(limit: u32) -> Error {
    Error::new(
        ErrorCode::ForwardOverflow,
        format!("The maximum dispatching count {limit} is reached"),
    )
}

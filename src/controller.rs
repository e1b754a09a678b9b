//! # Controller Module
//!
//! User controllers and action classes, and the runtime action map the
//! dispatcher invokes them through.
//!
//! ## Action tables
//!
//! Every [`Controller`] exposes an [`ActionTable`]: action name → method plus
//! the names (and defaults) of the method's extra parameters. The table is
//! usually generated by `#[yaf::actions]` from the `*_action` methods of an
//! impl block:
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct UserController;
//!
//! #[yaf::actions]
//! impl UserController {
//!     fn list_action(&mut self, cx: &mut ActionContext<'_>, page: Option<u32>) -> yaf::Result<()> {
//!         cx.response_mut().append_body(&format!("page {}", page.unwrap_or(1)));
//!         Ok(())
//!     }
//! }
//!
//! impl Controller for UserController {
//!     fn actions() -> ActionTable<Self> {
//!         Self::action_table()
//!     }
//! }
//! ```
//!
//! ## Parameter binding
//!
//! Each declared parameter takes the request param of the same name, else its
//! declared default, else a typed null (`None`, `""`, `0`, `false`). See
//! [`FromParam`].

use crate::error::{Error, ErrorCode, Result};
use crate::http::{ParamValue, Request, Response};
use crate::names::default_template;
use crate::runtime_config::parse_flag;
use crate::view::View;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A formal parameter of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<&'static str>,
}

impl ParamSpec {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, default: None }
    }

    #[must_use]
    pub const fn with_default(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            default: Some(default),
        }
    }
}

/// Bound action arguments, positional in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(&'static str, Option<ParamValue>)>,
}

impl Args {
    /// Bind `specs` against the request params.
    #[must_use]
    pub fn bind(specs: &[ParamSpec], request: &Request) -> Self {
        let values = specs
            .iter()
            .map(|spec| {
                let value = request
                    .get_param(spec.name)
                    .cloned()
                    .or_else(|| spec.default.map(ParamValue::from));
                (spec.name, value)
            })
            .collect();
        Self { values }
    }

    /// Convert argument `index` to `T`.
    pub fn get<T: FromParam>(&self, index: usize) -> Result<T> {
        match self.values.get(index) {
            Some((name, value)) => T::from_param(value.as_ref(), name),
            None => T::from_param(None, "?"),
        }
    }

    #[must_use]
    pub fn raw(&self, index: usize) -> Option<&ParamValue> {
        self.values.get(index).and_then(|(_, v)| v.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Conversion from a bound request param.
///
/// `value` is `None` when the request has no such param and no default was
/// declared; implementations return their typed null then.
pub trait FromParam: Sized {
    fn from_param(value: Option<&ParamValue>, name: &str) -> Result<Self>;
}

impl FromParam for ParamValue {
    fn from_param(value: Option<&ParamValue>, _name: &str) -> Result<Self> {
        Ok(value.cloned().unwrap_or_else(|| ParamValue::Text(String::new())))
    }
}

impl FromParam for String {
    fn from_param(value: Option<&ParamValue>, _name: &str) -> Result<Self> {
        Ok(value.map(ToString::to_string).unwrap_or_default())
    }
}

impl<T: FromParam> FromParam for Option<T> {
    fn from_param(value: Option<&ParamValue>, name: &str) -> Result<Self> {
        value.map(|v| T::from_param(Some(v), name)).transpose()
    }
}

impl FromParam for Arc<Error> {
    fn from_param(value: Option<&ParamValue>, name: &str) -> Result<Self> {
        match value {
            Some(ParamValue::Exception(e)) => Ok(Arc::clone(e)),
            _ => Err(Error::type_error(format!("Parameter '{name}' is not an exception"))),
        }
    }
}

impl FromParam for bool {
    fn from_param(value: Option<&ParamValue>, name: &str) -> Result<Self> {
        match value {
            None => Ok(false),
            Some(v) => v
                .as_str()
                .and_then(parse_flag)
                .ok_or_else(|| Error::type_error(format!("Parameter '{name}' expects a boolean"))),
        }
    }
}

macro_rules! from_param_parse {
    ($($t:ty),*) => {
        $(
            impl FromParam for $t {
                fn from_param(value: Option<&ParamValue>, name: &str) -> Result<Self> {
                    match value {
                        None => Ok(<$t>::default()),
                        Some(v) => v
                            .as_str()
                            .and_then(|s| s.trim().parse::<$t>().ok())
                            .ok_or_else(|| Error::type_error(format!(
                                "Parameter '{name}' expects {}, got '{v}'",
                                stringify!($t)
                            ))),
                    }
                }
            }
        )*
    };
}

from_param_parse!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

/// What an action can see and do while it runs.
pub struct ActionContext<'a> {
    request: &'a mut Request,
    response: &'a mut Response,
    view: &'a mut dyn View,
    name: &'a str,
    view_directory: &'a Path,
    view_ext: &'a str,
    rendered: bool,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        request: &'a mut Request,
        response: &'a mut Response,
        view: &'a mut dyn View,
        name: &'a str,
        view_directory: &'a Path,
        view_ext: &'a str,
    ) -> Self {
        Self {
            request,
            response,
            view,
            name,
            view_directory,
            view_ext,
            rendered: false,
        }
    }

    /// Name of the controller being run.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    #[must_use]
    pub fn module_name(&self) -> &str {
        self.request.module()
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        self.request
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        self.response
    }

    #[must_use]
    pub fn view(&self) -> &dyn View {
        self.view
    }

    pub fn view_mut(&mut self) -> &mut dyn View {
        self.view
    }

    /// Directory templates are resolved in.
    #[must_use]
    pub fn view_path(&self) -> PathBuf {
        self.view
            .script_path()
            .map_or_else(|| self.view_directory.to_path_buf(), Path::to_path_buf)
    }

    pub fn set_view_path(&mut self, path: impl Into<PathBuf>) {
        self.view.set_script_path(Some(path.into()));
    }

    /// Forward to another action of this controller.
    pub fn forward(&mut self, action: &str) {
        self.request.set_action(action);
        self.request.set_dispatched(false);
    }

    pub fn forward_to(&mut self, controller: &str, action: &str) {
        self.request.set_controller(controller);
        self.forward(action);
    }

    pub fn forward_full(
        &mut self,
        module: &str,
        controller: &str,
        action: &str,
        params: &[(&str, &str)],
    ) {
        self.request.set_module(module);
        self.request.set_params(params.iter().copied());
        self.forward_to(controller, action);
    }

    /// 302 to `url`.
    pub fn redirect(&mut self, url: &str) {
        self.response.set_redirect(url);
    }

    /// Render `<controller>/<tpl>.<ext>` and return the output.
    pub fn render(&mut self, tpl: &str, vars: Option<&Value>) -> Result<String> {
        let relative = default_template(self.name, tpl, self.view_ext);
        let path = crate::view::join_template(&self.view_path(), Path::new(&relative))?;
        self.view.render(&path, vars)
    }

    /// Render and append to the response body; suppresses auto render.
    pub fn display(&mut self, tpl: &str, vars: Option<&Value>) -> Result<()> {
        let out = self.render(tpl, vars)?;
        self.response.append_body(&out);
        self.rendered = true;
        Ok(())
    }

    /// Mark the response as rendered so the dispatcher skips auto render.
    pub fn set_rendered(&mut self) {
        self.rendered = true;
    }

    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("controller", &self.name)
            .field("module", &self.request.module())
            .field("action", &self.request.action())
            .field("rendered", &self.rendered)
            .finish()
    }
}

/// An action method: the controller, the context and the bound args.
pub type ActionMethod<C> = fn(&mut C, &mut ActionContext<'_>, &Args) -> Result<()>;

/// One entry of an [`ActionTable`].
pub struct ActionEntry<C> {
    name: String,
    params: Vec<ParamSpec>,
    method: ActionMethod<C>,
}

impl<C> ActionEntry<C> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

/// Runtime action map of a controller. Names match case-insensitively.
pub struct ActionTable<C> {
    entries: Vec<ActionEntry<C>>,
}

impl<C> Default for ActionTable<C> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<C> fmt::Debug for ActionTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.name))
            .finish()
    }
}

impl<C> ActionTable<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` (without the `Action` suffix).
    #[must_use]
    pub fn action(mut self, name: &str, params: &[ParamSpec], method: ActionMethod<C>) -> Self {
        let name = name.to_lowercase();
        self.entries.retain(|e| e.name != name);
        self.entries.push(ActionEntry {
            name,
            params: params.to_vec(),
            method,
        });
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActionEntry<C>> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A user controller.
pub trait Controller: Send + 'static {
    /// Runs right after construction, before the action. Clearing the
    /// dispatched flag here forwards without running the action.
    fn init(&mut self, _cx: &mut ActionContext<'_>) -> Result<()> {
        Ok(())
    }

    /// The action map, built once per controller class.
    fn actions() -> ActionTable<Self>
    where
        Self: Sized;
}

/// A standalone action class, used when the controller has no matching
/// action method.
pub trait Action: Send + 'static {
    /// Formal parameters of `execute`.
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn execute(&mut self, cx: &mut ActionContext<'_>, args: &Args) -> Result<()>;
}

/// Type-erased controller instance.
pub(crate) trait ControllerObject: Send {
    fn init(&mut self, cx: &mut ActionContext<'_>) -> Result<()>;
    fn action_params(&self, action: &str) -> Option<Vec<ParamSpec>>;
    fn invoke(&mut self, action: &str, cx: &mut ActionContext<'_>, args: &Args) -> Result<()>;
}

struct Instance<C: Controller> {
    inner: C,
    table: Arc<ActionTable<C>>,
}

impl<C: Controller> ControllerObject for Instance<C> {
    fn init(&mut self, cx: &mut ActionContext<'_>) -> Result<()> {
        self.inner.init(cx)
    }

    fn action_params(&self, action: &str) -> Option<Vec<ParamSpec>> {
        self.table.get(action).map(|e| e.params.clone())
    }

    fn invoke(&mut self, action: &str, cx: &mut ActionContext<'_>, args: &Args) -> Result<()> {
        let entry = self.table.get(action).ok_or_else(|| {
            Error::new(ErrorCode::ActionNotFound, format!("There is no method {action}Action"))
        })?;
        (entry.method)(&mut self.inner, cx, args)
    }
}

type ControllerFactory = dyn Fn() -> Box<dyn ControllerObject> + Send + Sync;

/// Constructor of a controller class, registered with the loader.
#[derive(Clone)]
pub struct ControllerClass {
    factory: Arc<ControllerFactory>,
    type_name: &'static str,
}

impl ControllerClass {
    /// Class built with `C::default()`.
    #[must_use]
    pub fn of<C: Controller + Default>() -> Self {
        Self::new(C::default)
    }

    /// Class built by `factory`. The action table is computed once here.
    #[must_use]
    pub fn new<C: Controller>(factory: impl Fn() -> C + Send + Sync + 'static) -> Self {
        let table = Arc::new(C::actions());
        Self {
            factory: Arc::new(move || {
                Box::new(Instance {
                    inner: factory(),
                    table: Arc::clone(&table),
                }) as Box<dyn ControllerObject>
            }),
            type_name: std::any::type_name::<C>(),
        }
    }

    pub(crate) fn instantiate(&self) -> Box<dyn ControllerObject> {
        (self.factory)()
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ControllerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ControllerClass").field(&self.type_name).finish()
    }
}

type ActionFactory = dyn Fn() -> Box<dyn Action> + Send + Sync;

/// Constructor of an action class.
#[derive(Clone)]
pub struct ActionClass {
    factory: Arc<ActionFactory>,
    type_name: &'static str,
}

impl ActionClass {
    #[must_use]
    pub fn of<A: Action + Default>() -> Self {
        Self::new(A::default)
    }

    #[must_use]
    pub fn new<A: Action>(factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
        Self {
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Action>),
            type_name: std::any::type_name::<A>(),
        }
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Action> {
        (self.factory)()
    }
}

impl fmt::Debug for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionClass").field(&self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestKind;
    use crate::view::SimpleView;
    use http::Method;

    #[derive(Default)]
    struct Echo {
        calls: u32,
    }

    impl Echo {
        fn say_action(&mut self, cx: &mut ActionContext<'_>, args: &Args) -> Result<()> {
            self.calls += 1;
            let word: String = args.get(0)?;
            let times: u32 = args.get(1)?;
            cx.response_mut().append_body(&word.repeat(times as usize));
            Ok(())
        }
    }

    impl Controller for Echo {
        fn actions() -> ActionTable<Self> {
            ActionTable::new().action(
                "say",
                &[ParamSpec::new("word"), ParamSpec::with_default("times", "2")],
                Echo::say_action,
            )
        }
    }

    fn run(request: &mut Request, action: &str) -> Result<Response> {
        let class = ControllerClass::of::<Echo>();
        let mut controller = class.instantiate();
        let mut response = Response::new(RequestKind::Http);
        let mut view = SimpleView::default();
        let params = controller.action_params(action).unwrap_or_default();
        let args = Args::bind(&params, request);
        let mut cx = ActionContext::new(
            request,
            &mut response,
            &mut view,
            "Echo",
            Path::new("/views"),
            "phtml",
        );
        controller.invoke(action, &mut cx, &args)?;
        Ok(response)
    }

    #[test]
    fn test_bind_uses_param_then_default() {
        let mut req = Request::http(Method::GET, "/");
        req.set_param("word", "ab");
        let res = run(&mut req, "SAY").unwrap();
        assert_eq!(res.body(None), "abab");

        req.set_param("times", "3");
        let res = run(&mut req, "say").unwrap();
        assert_eq!(res.body(None), "ababab");
    }

    #[test]
    fn test_missing_param_is_typed_null() {
        let mut req = Request::http(Method::GET, "/");
        let res = run(&mut req, "say").unwrap();
        assert_eq!(res.body(None), "");
    }

    #[test]
    fn test_unparsable_param_is_type_error() {
        let mut req = Request::http(Method::GET, "/");
        req.set_param("times", "many");
        let err = run(&mut req, "say").unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeError);
    }

    #[test]
    fn test_unknown_action() {
        let mut req = Request::http(Method::GET, "/");
        let err = run(&mut req, "shout").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ActionNotFound);
    }

    #[test]
    fn test_option_and_exception_params() {
        let mut req = Request::http(Method::GET, "/");
        let err = Arc::new(Error::dispatch("boom"));
        req.set_param("exception", Arc::clone(&err));
        let args = Args::bind(&[ParamSpec::new("exception"), ParamSpec::new("page")], &req);
        let bound: Arc<Error> = args.get(0).unwrap();
        assert!(Arc::ptr_eq(&bound, &err));
        let page: Option<u32> = args.get(1).unwrap();
        assert_eq!(page, None);
    }

    #[test]
    fn test_forward_helpers_clear_dispatched() {
        let mut req = Request::http(Method::GET, "/");
        req.set_dispatched(true);
        let mut res = Response::new(RequestKind::Http);
        let mut view = SimpleView::default();
        let mut cx = ActionContext::new(&mut req, &mut res, &mut view, "Index", Path::new("/v"), "phtml");
        cx.forward_full("Admin", "User", "list", &[("id", "7")]);
        assert!(!cx.request().is_dispatched());
        assert_eq!(cx.request().module(), "Admin");
        assert_eq!(cx.request().controller(), "User");
        assert_eq!(cx.request().action(), "list");
        assert_eq!(cx.request().get_param_str("id"), Some("7"));
    }

    #[test]
    fn test_view_path_prefers_script_path() {
        let mut req = Request::http(Method::GET, "/");
        let mut res = Response::new(RequestKind::Http);
        let mut view = SimpleView::default();
        let mut cx = ActionContext::new(&mut req, &mut res, &mut view, "Index", Path::new("/app/views"), "phtml");
        assert_eq!(cx.view_path(), PathBuf::from("/app/views"));
        cx.set_view_path("/tpl");
        assert_eq!(cx.view_path(), PathBuf::from("/tpl"));
    }
}

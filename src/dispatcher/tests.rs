use super::*;
use crate::config::Config;
use crate::controller::{Action, ActionClass, ActionContext, ActionTable, Args, Controller, ControllerClass, ParamSpec};
use crate::error::{Error, ErrorCode, ErrorMask, Result};
use crate::globals::Globals;
use crate::http::{BufferEmitter, Request, Response};
use crate::loader::Loader;
use crate::plugin::{Hook, Plugin};
use crate::router::RequestRouter;
use crate::runtime_config::RuntimeConfig;
use crate::view::View;
use http::Method;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

fn dispatcher(dir: &Path, options: Value) -> Dispatcher {
    let mut app = json!({ "directory": dir.to_string_lossy() });
    if let (Some(app), Value::Object(extra)) = (app.as_object_mut(), options) {
        app.extend(extra);
    }
    let config = Config::from_value(json!({ "application": app }), None);
    let globals = Globals::parse_option(&config, &RuntimeConfig::default()).unwrap();
    let loader = Loader::new(globals.loader_options());
    let mut d = Dispatcher::new(globals, loader).unwrap();
    d.return_response(true).disable_view();
    d
}

#[derive(Default)]
struct Index;

impl Index {
    fn index_action(&mut self, cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        cx.response_mut().append_body("hello");
        Ok(())
    }

    fn hop_action(&mut self, cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        cx.forward_to("other", "index");
        Ok(())
    }

    fn spin_action(&mut self, cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        cx.forward("spin");
        Ok(())
    }

    fn fail_action(&mut self, _cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        Err(Error::call_failed("boom"))
    }

    fn panic_action(&mut self, _cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        panic!("kaboom")
    }

    fn greet_action(&mut self, cx: &mut ActionContext<'_>, args: &Args) -> Result<()> {
        let name: String = args.get(0)?;
        cx.response_mut().append_body(&format!("hi {name}"));
        Ok(())
    }
}

impl Controller for Index {
    fn actions() -> ActionTable<Self> {
        ActionTable::new()
            .action("index", &[], Index::index_action)
            .action("hop", &[], Index::hop_action)
            .action("spin", &[], Index::spin_action)
            .action("fail", &[], Index::fail_action)
            .action("panic", &[], Index::panic_action)
            .action("greet", &[ParamSpec::with_default("name", "world")], Index::greet_action)
    }
}

#[derive(Default)]
struct Other;

impl Other {
    fn index_action(&mut self, cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        cx.response_mut().append_body("ok");
        Ok(())
    }
}

impl Controller for Other {
    fn actions() -> ActionTable<Self> {
        ActionTable::new().action("index", &[], Other::index_action)
    }
}

#[derive(Default)]
struct ErrorPage;

impl ErrorPage {
    fn error_action(&mut self, cx: &mut ActionContext<'_>, args: &Args) -> Result<()> {
        let exception: Arc<Error> = args.get(0)?;
        cx.response_mut().append_body(&format!("caught {}", exception.code()));
        Ok(())
    }
}

impl Controller for ErrorPage {
    fn actions() -> ActionTable<Self> {
        ActionTable::new().action("error", &[ParamSpec::new("exception")], ErrorPage::error_action)
    }
}

/// Forwards from `init` unless the `allow` param is set.
#[derive(Default)]
struct Guarded;

impl Guarded {
    fn index_action(&mut self, cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        cx.response_mut().append_body("inside");
        Ok(())
    }
}

impl Controller for Guarded {
    fn init(&mut self, cx: &mut ActionContext<'_>) -> Result<()> {
        if cx.request().get_param("allow").is_none() {
            cx.forward_to("other", "index");
        }
        Ok(())
    }

    fn actions() -> ActionTable<Self> {
        ActionTable::new().action("index", &[], Guarded::index_action)
    }
}

#[derive(Default)]
struct Dummy;

impl Action for Dummy {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::with_default("size", "3")]
    }

    fn execute(&mut self, cx: &mut ActionContext<'_>, args: &Args) -> Result<()> {
        let size: usize = args.get(0)?;
        cx.response_mut().append_body(&"x".repeat(size));
        Ok(())
    }
}

#[derive(Default, Clone)]
struct Recorder(Arc<Mutex<Vec<&'static str>>>);

impl Recorder {
    fn push(&self, hook: Hook) -> Result<()> {
        self.0.lock().push(hook.name());
        Ok(())
    }

    fn events(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }

    fn count(&self, hook: Hook) -> usize {
        self.events().iter().filter(|e| **e == hook.name()).count()
    }
}

impl Plugin for Recorder {
    fn router_startup(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        self.push(Hook::RouterStartup)
    }
    fn router_shutdown(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        self.push(Hook::RouterShutdown)
    }
    fn dispatch_loop_startup(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        self.push(Hook::DispatchLoopStartup)
    }
    fn pre_dispatch(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        self.push(Hook::PreDispatch)
    }
    fn post_dispatch(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        self.push(Hook::PostDispatch)
    }
    fn dispatch_loop_shutdown(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        self.push(Hook::DispatchLoopShutdown)
    }
    fn pre_response(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        self.push(Hook::PreResponse)
    }
}

struct App {
    _dir: tempfile::TempDir,
    dispatcher: Dispatcher,
    recorder: Recorder,
}

fn app_with(options: Value, with_error_controller: bool) -> App {
    let dir = tempfile::tempdir().unwrap();
    let controllers = dir.path().join("controllers");
    for name in ["Index", "Other", "Guarded"] {
        touch(&controllers.join(format!("{name}.php")));
    }
    if with_error_controller {
        touch(&controllers.join("Error.php"));
    }
    let mut dispatcher = dispatcher(dir.path(), options);
    dispatcher
        .loader_mut()
        .declare_controller("Index", "Index", ControllerClass::of::<Index>())
        .declare_controller("Index", "Other", ControllerClass::of::<Other>())
        .declare_controller("Index", "Guarded", ControllerClass::of::<Guarded>())
        .declare_controller("Index", "Error", ControllerClass::of::<ErrorPage>());
    let recorder = Recorder::default();
    dispatcher.register_plugin(Arc::new(recorder.clone()));
    App {
        _dir: dir,
        dispatcher,
        recorder,
    }
}

fn app() -> App {
    app_with(json!({}), true)
}

fn get(uri: &str) -> Request {
    Request::http(Method::GET, uri)
}

fn body(outcome: DispatchOutcome) -> String {
    outcome.into_response().map(|r| r.body(None)).unwrap_or_default()
}

#[test]
fn test_hello_world_hook_order() {
    let mut app = app();
    let outcome = app.dispatcher.dispatch(get("/")).unwrap();
    assert_eq!(body(outcome), "hello");
    let expected: Vec<_> = Hook::ALL.iter().map(|h| h.name()).collect();
    assert_eq!(app.recorder.events(), expected);
}

#[test]
fn test_forward_adds_one_hook_pair() {
    let mut app = app();
    let outcome = app.dispatcher.dispatch(get("/index/hop")).unwrap();
    assert_eq!(body(outcome), "ok");
    assert_eq!(app.recorder.count(Hook::PreDispatch), 2);
    assert_eq!(app.recorder.count(Hook::PostDispatch), 2);
    assert_eq!(
        app.recorder.events(),
        vec![
            "routerStartup",
            "routerShutdown",
            "dispatchLoopStartup",
            "preDispatch",
            "postDispatch",
            "preDispatch",
            "postDispatch",
            "dispatchLoopShutdown",
            "preResponse",
        ]
    );
    let request = app.dispatcher.request().unwrap();
    assert_eq!(request.controller(), "Other");
    assert!(request.is_dispatched());
}

#[test]
fn test_forward_overflow() {
    let mut app = app();
    let err = app.dispatcher.dispatch(get("/index/spin")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ForwardOverflow);
    assert_eq!(app.recorder.count(Hook::PreDispatch), 5);
    assert_eq!(app.recorder.count(Hook::DispatchLoopShutdown), 0);
    assert_eq!(app.recorder.count(Hook::PreResponse), 0);
}

#[test]
fn test_overflow_caught_by_error_controller() {
    let mut app = app();
    app.dispatcher.catch_exception(true);
    let outcome = app.dispatcher.dispatch(get("/index/spin")).unwrap();
    assert_eq!(body(outcome), "caught FORWARD_OVERFLOW");
    let request = app.dispatcher.request().unwrap();
    assert_eq!(request.controller(), "Error");
    assert_eq!(request.exception().map(|e| e.code()), Some(ErrorCode::ForwardOverflow));
    assert_eq!(app.recorder.count(Hook::PreResponse), 1);
}

#[test]
fn test_caught_error_keeps_hook_sequence() {
    let mut app = app();
    app.dispatcher.catch_exception(true);
    let outcome = app.dispatcher.dispatch(get("/index/fail")).unwrap();
    assert_eq!(body(outcome), "caught CALL_FAILED");
    assert_eq!(
        app.recorder.events(),
        vec![
            "routerStartup",
            "routerShutdown",
            "dispatchLoopStartup",
            "preDispatch",
            "postDispatch",
            "preDispatch",
            "postDispatch",
            "dispatchLoopShutdown",
            "preResponse",
        ]
    );
}

#[test]
fn test_caught_overflow_gets_fresh_budget() {
    let mut app = app();
    app.dispatcher.catch_exception(true);
    let outcome = app.dispatcher.dispatch(get("/index/spin")).unwrap();
    assert_eq!(body(outcome), "caught FORWARD_OVERFLOW");
    assert_eq!(app.recorder.count(Hook::PreDispatch), 6);
    assert_eq!(app.recorder.count(Hook::PostDispatch), 6);
    assert_eq!(app.recorder.count(Hook::DispatchLoopShutdown), 1);
}

#[test]
fn test_script_without_class_is_autoload_failed() {
    let mut app = app();
    touch(&app.dispatcher.app_directory().join("controllers/Ghost.php"));
    let err = app.dispatcher.dispatch(get("/ghost")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AutoloadFailed);
    assert!(err.message().contains("Ghost_Controller"));
}

#[derive(Default)]
struct AdminIndex;

impl AdminIndex {
    fn index_action(&mut self, cx: &mut ActionContext<'_>, _args: &Args) -> Result<()> {
        cx.response_mut().append_body("admin");
        Ok(())
    }
}

impl Controller for AdminIndex {
    fn actions() -> ActionTable<Self> {
        ActionTable::new().action("index", &[], AdminIndex::index_action)
    }
}

fn app_with_admin() -> App {
    let mut app = app_with(json!({ "modules": "Index,Admin" }), true);
    touch(&app.dispatcher.app_directory().join("modules/Admin/controllers/Index.php"));
    app.dispatcher
        .loader_mut()
        .declare_controller("Admin", "Index", ControllerClass::of::<AdminIndex>());
    app
}

#[test]
fn test_index_controller_per_module() {
    let mut app = app_with_admin();
    let outcome = app.dispatcher.dispatch(get("/")).unwrap();
    assert_eq!(body(outcome), "hello");
    let outcome = app.dispatcher.dispatch(get("/admin/index/index")).unwrap();
    assert_eq!(body(outcome), "admin");
    let outcome = app.dispatcher.dispatch(get("/index/index")).unwrap();
    assert_eq!(body(outcome), "hello");
}

#[test]
fn test_module_without_error_controller_uses_default() {
    let mut app = app_with_admin();
    app.dispatcher.catch_exception(true);
    let outcome = app.dispatcher.dispatch(get("/admin/missing")).unwrap();
    assert_eq!(body(outcome), "caught CONTROLLER_NOT_FOUND");
    let request = app.dispatcher.request().unwrap();
    assert_eq!(request.module(), "Index");
    assert_eq!(request.controller(), "Error");
}

#[test]
fn test_error_in_error_controller_propagates() {
    let mut app = app_with(json!({}), false);
    app.dispatcher.catch_exception(true);
    let err = app.dispatcher.dispatch(get("/index/fail")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ControllerNotFound);
}

#[test]
fn test_routed_request_skips_router() {
    let mut app = app();
    let mut request = get("/ignored/path");
    request.set_controller("other");
    request.set_routed(true);
    let outcome = app.dispatcher.dispatch(request).unwrap();
    assert_eq!(body(outcome), "ok");
    let events = app.recorder.events();
    assert!(!events.contains(&"routerStartup"));
    assert!(!events.contains(&"routerShutdown"));
    assert_eq!(events[0], "dispatchLoopStartup");
}

#[test]
fn test_names_are_normalized() {
    let mut app = app();
    let mut request = get("/");
    request.set_module("iNDEX");
    request.set_controller("OTHER");
    request.set_routed(true);
    app.dispatcher.dispatch(request).unwrap();
    let request = app.dispatcher.request().unwrap();
    assert_eq!(request.module(), "Index");
    assert_eq!(request.controller(), "Other");
    assert_eq!(request.action(), "Index");
}

#[test]
fn test_missing_controller_reaches_error_handler() {
    let mut app = app();
    let seen = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&seen);
    app.dispatcher.throw_exception(false).set_error_handler(
        move |e| {
            assert_eq!(e.code(), ErrorCode::ControllerNotFound);
            counter.fetch_add(1, Ordering::SeqCst);
        },
        ErrorMask::CONTROLLER_NOT_FOUND,
    );
    let err = app.dispatcher.dispatch(get("/missing")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ControllerNotFound);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_error_handler_respects_mask_and_throw_flag() {
    let mut app = app();
    let seen = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&seen);
    app.dispatcher.set_error_handler(
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        ErrorMask::ACTION_NOT_FOUND,
    );
    assert!(app.dispatcher.dispatch(get("/missing")).is_err());
    app.dispatcher.throw_exception(false);
    assert!(app.dispatcher.dispatch(get("/missing")).is_err());
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert!(app.dispatcher.dispatch(get("/index/nothing")).is_err());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unknown_module_is_module_not_found() {
    let mut app = app();
    let mut request = get("/");
    request.set_module("Admin");
    request.set_routed(true);
    let err = app.dispatcher.dispatch(request).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ModuleNotFound);
}

#[test]
fn test_action_not_found() {
    let mut app = app();
    let err = app.dispatcher.dispatch(get("/index/nothing")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ActionNotFound);
}

#[test]
fn test_action_class_runs_when_no_method() {
    let mut app = app();
    app.dispatcher
        .loader_mut()
        .declare_action("Index", "Index", "dummy", ActionClass::of::<Dummy>());
    let err = app.dispatcher.dispatch(get("/index/dummy")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ActionNotFound);

    let script = app.dispatcher.app_directory().join("controllers/Index/dummy.php");
    touch(&script);
    let outcome = app.dispatcher.dispatch(get("/index/dummy/size/2")).unwrap();
    assert_eq!(body(outcome), "xx");
}

#[test]
fn test_panicking_action_is_call_failed() {
    let mut app = app();
    let err = app.dispatcher.dispatch(get("/index/panic")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CallFailed);
    assert!(err.message().contains("kaboom"));
}

#[test]
fn test_param_binding_with_default() {
    let mut app = app();
    let outcome = app.dispatcher.dispatch(get("/index/greet")).unwrap();
    assert_eq!(body(outcome), "hi world");
    let outcome = app.dispatcher.dispatch(get("/index/greet/name/bob")).unwrap();
    assert_eq!(body(outcome), "hi bob");
}

#[test]
fn test_init_forward_skips_action() {
    let mut app = app();
    let outcome = app.dispatcher.dispatch(get("/guarded")).unwrap();
    assert_eq!(body(outcome), "ok");
    let outcome = app.dispatcher.dispatch(get("/guarded/index/allow/1")).unwrap();
    assert_eq!(body(outcome), "inside");
}

#[test]
fn test_set_default_module_validates() {
    let mut app = app();
    let err = app.dispatcher.set_default_module("admin").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ModuleNotFound);
    assert!(app.dispatcher.set_default_module("index").is_ok());
    assert_eq!(app.dispatcher.default_module(), "Index");
}

#[test]
fn test_default_controller_and_action() {
    let mut app = app();
    app.dispatcher.set_default_controller("other");
    let outcome = app.dispatcher.dispatch(get("/")).unwrap();
    assert_eq!(body(outcome), "ok");

    app.dispatcher.set_default_controller("index").set_default_action("GREET");
    assert_eq!(app.dispatcher.default_action(), "greet");
    let outcome = app.dispatcher.dispatch(get("/")).unwrap();
    assert_eq!(body(outcome), "hi world");
}

#[test]
fn test_flush_to_emitter() {
    let mut app = app();
    let emitter = BufferEmitter::new();
    app.dispatcher
        .return_response(false)
        .flush_instantly(true)
        .set_emitter(Box::new(emitter.clone()));
    let outcome = app.dispatcher.dispatch(get("/")).unwrap();
    assert!(matches!(outcome, DispatchOutcome::Flushed));
    assert_eq!(emitter.body(), "hello");
    assert_eq!(emitter.emitted().status, Some(200));
}

#[test]
fn test_auto_render_default_template() {
    let mut app = app();
    let views = app.dispatcher.app_directory().join("views/index");
    fs::create_dir_all(&views).unwrap();
    fs::write(views.join("index.phtml"), "+{{ who }}").unwrap();
    app.dispatcher.enable_view();
    app.dispatcher.init_view(None).assign("who", json!("world"));
    let outcome = app.dispatcher.dispatch(get("/")).unwrap();
    assert_eq!(body(outcome), "hello+world");
}

#[test]
fn test_missing_template_is_view_not_found() {
    let mut app = app();
    app.dispatcher.enable_view();
    let err = app.dispatcher.dispatch(get("/")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ViewNotFound);
}

struct Fixed(bool);

impl RequestRouter for Fixed {
    fn route(&mut self, request: &mut Request) -> bool {
        request.set_controller("other");
        self.0
    }
}

#[test]
fn test_custom_router_takes_precedence() {
    let mut app = app();
    app.dispatcher.set_router(Box::new(Fixed(true)));
    let outcome = app.dispatcher.dispatch(get("/index/greet")).unwrap();
    assert_eq!(body(outcome), "ok");
}

#[test]
fn test_route_failure() {
    let mut app = app();
    app.dispatcher.set_router(Box::new(Fixed(false)));
    let err = app.dispatcher.dispatch(get("/")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::RouteFailed);
    assert_eq!(app.recorder.events(), vec!["routerStartup"]);
}

struct Refuse;

impl Plugin for Refuse {
    fn pre_dispatch(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
        Err(Error::call_failed("refused"))
    }
}

#[test]
fn test_plugin_error_is_caught() {
    let mut app = app();
    app.dispatcher.register_plugin(Arc::new(Refuse)).catch_exception(true);
    let outcome = app.dispatcher.dispatch(get("/")).unwrap();
    assert_eq!(body(outcome), "caught CALL_FAILED");
    assert_eq!(app.dispatcher.plugins().len(), 2);
}

#[test]
fn test_dispatch_bound_requires_request() {
    let mut app = app();
    let err = app.dispatcher.dispatch_bound().unwrap_err();
    assert_eq!(err.code(), ErrorCode::DispatchFailed);
    app.dispatcher.set_request(get("/"));
    assert_eq!(body(app.dispatcher.dispatch_bound().unwrap()), "hello");
}

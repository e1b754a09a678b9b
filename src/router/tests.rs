use super::*;
use crate::http::Request;
use http::Method;
use serde_json::json;
use std::sync::Arc;

fn modules() -> Vec<String> {
    vec!["Index".to_string(), "Admin".to_string()]
}

fn get(uri: &str) -> Request {
    Request::http(Method::GET, uri)
}

#[test]
fn test_static_route_with_module_and_params() {
    let mut router = Router::new(modules());
    let mut req = get("/admin/user/list/page/2/sort");
    assert!(router.route(&mut req));
    assert_eq!(req.module(), "admin");
    assert_eq!(req.controller(), "user");
    assert_eq!(req.action(), "list");
    assert_eq!(req.get_param_str("page"), Some("2"));
    assert_eq!(req.get_param_str("sort"), Some(""));
    assert_eq!(router.current_route(), Some(DEFAULT_ROUTE));
}

#[test]
fn test_static_route_unknown_module_is_controller() {
    let mut router = Router::new(modules());
    let mut req = get("/user/list");
    assert!(router.route(&mut req));
    assert_eq!(req.module(), "");
    assert_eq!(req.controller(), "user");
    assert_eq!(req.action(), "list");
}

#[test]
fn test_static_route_lone_module_name_is_controller() {
    let mut router = Router::new(modules());
    let mut req = get("/admin");
    assert!(router.route(&mut req));
    assert_eq!(req.module(), "");
    assert_eq!(req.controller(), "admin");
}

#[test]
fn test_static_route_root_leaves_names_empty() {
    let mut router = Router::new(modules());
    let mut req = get("/");
    assert!(router.route(&mut req));
    assert_eq!(req.controller(), "");
    assert_eq!(req.action(), "");
}

#[test]
fn test_base_uri_is_stripped() {
    let mut router = Router::new(modules());
    let mut req = get("/App/user/show");
    req.set_base_uri(Some("/app"));
    assert!(router.route(&mut req));
    assert_eq!(req.controller(), "user");
    assert_eq!(req.action(), "show");
}

#[test]
fn test_last_added_route_wins() {
    let mut router = Router::new(modules());
    router.add_route(
        "first",
        Arc::new(RewriteRoute::new("/item/:id", RouteTarget::new(None, Some("first"), None)).unwrap()),
    );
    router.add_route(
        "second",
        Arc::new(RewriteRoute::new("/item/:id", RouteTarget::new(None, Some("second"), None)).unwrap()),
    );
    let mut req = get("/item/7");
    assert!(router.route(&mut req));
    assert_eq!(req.controller(), "second");
    assert_eq!(router.current_route(), Some("second"));
}

#[test]
fn test_same_name_replaces_route() {
    let mut router = Router::new(modules());
    router.add_route("r", Arc::new(SupervarRoute::new("r", modules())));
    router.add_route("r", Arc::new(SimpleRoute::new("m", "c", "a")));
    assert_eq!(router.routes().len(), 2);
    assert_eq!(router.get_route("r").map(|r| r.kind()), Some("simple"));
}

#[test]
fn test_re_added_route_moves_to_top() {
    let mut router = Router::new(modules());
    router.add_route(
        "first",
        Arc::new(RewriteRoute::new("/item/:id", RouteTarget::new(None, Some("first"), None)).unwrap()),
    );
    router.add_route(
        "second",
        Arc::new(RewriteRoute::new("/item/:id", RouteTarget::new(None, Some("second"), None)).unwrap()),
    );
    router.add_route(
        "first",
        Arc::new(RewriteRoute::new("/item/:id", RouteTarget::new(None, Some("again"), None)).unwrap()),
    );

    let names: Vec<&str> = router.routes().iter().map(|(n, _)| n.as_ref()).collect();
    assert_eq!(names, vec![DEFAULT_ROUTE, "second", "first"]);
    let mut req = get("/item/7");
    assert!(router.route(&mut req));
    assert_eq!(req.controller(), "again");
    assert_eq!(router.current_route(), Some("first"));

    // The default route keeps the bottom slot when replaced.
    router.set_default_route(Arc::new(SupervarRoute::new("r", modules())));
    assert_eq!(router.routes()[0].0.as_ref(), DEFAULT_ROUTE);
    assert_eq!(router.routes().len(), 3);
}

#[test]
fn test_simple_route() {
    let route = SimpleRoute::new("m", "c", "a");
    let mut req = get("/ignored?c=user&a=edit");
    assert!(route.route(&mut req));
    assert_eq!(req.controller(), "user");
    assert_eq!(req.action(), "edit");
    assert!(!route.route(&mut get("/user/edit")));
}

#[test]
fn test_supervar_route() {
    let route = SupervarRoute::new("r", modules());
    let mut req = get("/?r=/admin/user/list/id/3");
    assert!(route.route(&mut req));
    assert_eq!(req.module(), "admin");
    assert_eq!(req.action(), "list");
    assert_eq!(req.get_param_str("id"), Some("3"));
    assert!(!route.route(&mut get("/admin/user")));
}

#[test]
fn test_map_route() {
    let route = MapRoute::new(true, Some("#!"));
    let mut req = get("/user/list#!/id/5");
    assert!(route.route(&mut req));
    assert_eq!(req.controller(), "user_list");
    assert_eq!(req.get_param_str("id"), Some("5"));

    let route = MapRoute::new(false, None);
    let mut req = get("/user/list");
    assert!(route.route(&mut req));
    assert_eq!(req.action(), "user_list");
    assert_eq!(req.controller(), "");
}

#[test]
fn test_rewrite_route_with_rest() {
    let route = RewriteRoute::new(
        "/product/:name/*",
        RouteTarget::new(Some("index"), Some("product"), Some("info")),
    )
    .unwrap();
    let mut req = get("/product/foo/color/red");
    assert!(route.route(&mut req));
    assert_eq!(req.controller(), "product");
    assert_eq!(req.get_param_str("name"), Some("foo"));
    assert_eq!(req.get_param_str("color"), Some("red"));
    assert!(!route.route(&mut get("/catalog/foo")));
}

#[test]
fn test_regex_route_map_and_dynamic_target() {
    let mut map = std::collections::BTreeMap::new();
    map.insert(1, "kind".to_string());
    map.insert(2, "page".to_string());
    let route = RegexRoute::new(
        "#^/list/([a-z]+)/(\\d+)$#",
        RouteTarget::new(None, Some("list"), Some(":kind")),
        map,
    )
    .unwrap();
    let mut req = get("/list/books/3");
    assert!(route.route(&mut req));
    assert_eq!(req.controller(), "list");
    assert_eq!(req.action(), "books");
    assert_eq!(req.get_param_str("page"), Some("3"));
    assert!(!route.route(&mut get("/list/books/x")));
}

#[test]
fn test_add_config() {
    let mut router = Router::new(modules());
    router
        .add_config(&json!({
            "product": {
                "type": "rewrite",
                "match": "/product/:name",
                "route": {"controller": "product", "action": "info"}
            },
            "legacy": {"type": "supervar", "varname": "r"}
        }))
        .unwrap();
    assert_eq!(router.routes().len(), 3);

    let mut req = get("/product/bar");
    assert!(router.route(&mut req));
    assert_eq!(router.current_route(), Some("product"));
    assert_eq!(req.action(), "info");
}

#[test]
fn test_add_config_rejects_unknown_type() {
    let mut router = Router::new(modules());
    let err = router
        .add_config(&json!({"x": {"type": "teleport"}}))
        .unwrap_err();
    assert_eq!(err.code(), crate::ErrorCode::TypeError);
}

#[test]
fn test_failing_default_route_fails_routing() {
    let mut router = Router::new(modules());
    router.set_default_route(route_from_config(&json!({"type": "supervar", "varname": "r"}), &modules()).unwrap());
    assert!(!router.route(&mut get("/user/list")));
}

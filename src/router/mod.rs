//! # Router Module
//!
//! Resolves a [`Request`](crate::http::Request) into module, controller,
//! action and params.
//!
//! ## Overview
//!
//! The [`Router`] holds an ordered list of named [`Route`] strategies. Routing
//! tries them from the most recently added back to the oldest; the first one
//! that accepts the request wins and is remembered as the current route. The
//! bottom entry is always the default route (`_default`), a [`StaticRoute`]
//! unless the `dispatcher.defaultRoute` config replaces it.
//!
//! ## Strategies
//!
//! | Type | Matches |
//! |---|---|
//! | [`StaticRoute`] | `/module?/controller/action/k1/v1/...` |
//! | [`SimpleRoute`] | `?m=..&c=..&a=..` query keys |
//! | [`SupervarRoute`] | `?r=/module/controller/action` |
//! | [`MapRoute`] | every segment joined into one controller or action name |
//! | [`RewriteRoute`] | `/user/:id/*` patterns with a fixed target |
//! | [`RegexRoute`] | a regular expression with numbered captures |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use yaf::http::Request;
//! use yaf::router::{RewriteRoute, RouteTarget, Router};
//!
//! let mut router = Router::new(vec!["Index".to_string()]);
//! let target = RouteTarget::new(None, Some("user"), Some("show"));
//! router.add_route("user", Arc::new(RewriteRoute::new("/user/:id", target).unwrap()));
//!
//! let mut request = Request::http(http::Method::GET, "/user/42");
//! assert!(router.route(&mut request));
//! assert_eq!(request.controller(), "user");
//! assert_eq!(request.get_param_str("id"), Some("42"));
//! assert_eq!(router.current_route(), Some("user"));
//! ```

mod config;
mod core;
mod routes;
#[cfg(test)]
mod tests;

pub use config::route_from_config;
pub use core::{request_path, RequestRouter, Route, Router, DEFAULT_ROUTE};
pub use routes::{
    MapRoute, RegexRoute, RewriteRoute, RouteTarget, SimpleRoute, StaticRoute, SupervarRoute,
};

use super::routes::StaticRoute;
use crate::http::Request;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name under which the default route is registered.
pub const DEFAULT_ROUTE: &str = "_default";

/// A routing strategy.
///
/// On success the route writes module/controller/action/params into the
/// request and returns `true`; on failure it must leave the names alone.
pub trait Route: Send + Sync + fmt::Debug {
    fn route(&self, request: &mut Request) -> bool;

    /// Short strategy name (`static`, `rewrite`, ...), used in logs.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

/// A replacement for the built-in [`Router`], installed with
/// [`Dispatcher::set_router`](crate::Dispatcher::set_router).
pub trait RequestRouter: Send {
    fn route(&mut self, request: &mut Request) -> bool;
}

/// The part of the URI routes match against: the path with the base URI
/// removed (case-insensitive prefix).
#[must_use]
pub fn request_path(request: &Request) -> &str {
    let uri = request.uri();
    match request.base_uri() {
        Some(base)
            if uri.len() >= base.len()
                && uri.is_char_boundary(base.len())
                && uri[..base.len()].eq_ignore_ascii_case(base) =>
        {
            let rest = &uri[base.len()..];
            if rest.is_empty() || rest.starts_with('/') {
                rest
            } else {
                uri
            }
        }
        _ => uri,
    }
}

/// Ordered route table.
///
/// Routes are tried from the most recently added to the oldest; the default
/// route sits at the bottom and is always present.
#[derive(Clone)]
pub struct Router {
    routes: Vec<(Arc<str>, Arc<dyn Route>)>,
    current: Option<Arc<str>>,
    modules: Vec<String>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.iter().map(|(n, r)| (n.as_ref(), r.kind())).collect::<Vec<_>>())
            .field("current", &self.current)
            .finish()
    }
}

impl Router {
    /// Router with a [`StaticRoute`] default that recognizes `modules`.
    #[must_use]
    pub fn new(modules: Vec<String>) -> Self {
        let default_route: Arc<dyn Route> = Arc::new(StaticRoute::new(modules.clone()));
        Self {
            routes: vec![(Arc::from(DEFAULT_ROUTE), default_route)],
            current: None,
            modules,
        }
    }

    /// Module names handed to module-aware routes built from config.
    #[must_use]
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Add `route` with the highest priority. An existing route of the same
    /// name is dropped first, so a re-added name moves to the top.
    pub fn add_route(&mut self, name: &str, route: Arc<dyn Route>) -> &mut Self {
        if name == DEFAULT_ROUTE {
            self.set_default_route(route);
            return self;
        }
        if let Some(index) = self.routes.iter().position(|(n, _)| n.as_ref() == name) {
            warn!(route = %name, kind = route.kind(), "Replaced existing route");
            self.routes.remove(index);
        } else {
            debug!(route = %name, kind = route.kind(), "Route added");
        }
        self.routes.push((Arc::from(name), route));
        self
    }

    /// Replace the default route. It stays at the lowest priority.
    pub fn set_default_route(&mut self, route: Arc<dyn Route>) {
        debug!(kind = route.kind(), "Default route set");
        match self.routes.iter_mut().find(|(n, _)| n.as_ref() == DEFAULT_ROUTE) {
            Some(slot) => slot.1 = route,
            None => self.routes.insert(0, (Arc::from(DEFAULT_ROUTE), route)),
        }
    }

    #[must_use]
    pub fn get_route(&self, name: &str) -> Option<&Arc<dyn Route>> {
        self.routes
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, r)| r)
    }

    /// Routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[(Arc<str>, Arc<dyn Route>)] {
        &self.routes
    }

    /// Name of the route that accepted the last request.
    #[must_use]
    pub fn current_route(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Try every route, newest first. Returns `false` when none accepts.
    pub fn route(&mut self, request: &mut Request) -> bool {
        for (name, route) in self.routes.iter().rev() {
            if route.route(request) {
                info!(
                    request_id = %request.request_id(),
                    route = %name,
                    kind = route.kind(),
                    module = %request.module(),
                    controller = %request.controller(),
                    action = %request.action(),
                    "Request routed"
                );
                self.current = Some(Arc::clone(name));
                return true;
            }
        }
        warn!(
            request_id = %request.request_id(),
            uri = %request.uri(),
            "No route matched"
        );
        false
    }
}

impl RequestRouter for Router {
    fn route(&mut self, request: &mut Request) -> bool {
        Router::route(self, request)
    }
}

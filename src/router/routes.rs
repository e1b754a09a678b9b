//! Built-in route strategies.

use super::core::{request_path, Route};
use crate::error::{Error, Result};
use crate::http::Request;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

/// Split `a/b/c/d` into `(a, b), (c, d)`; a dangling key gets an empty value.
pub(crate) fn pairs_from_path(path: &str, request: &mut Request) {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    while let Some(key) = segments.next() {
        let value = segments.next().unwrap_or("");
        request.set_param(&decode(key), decode(value));
    }
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Resolve `/module?/controller/action/k/v/...` into the request.
///
/// The first segment is taken as a module only when it names a configured
/// module (case-insensitive) and more path follows it.
pub(crate) fn route_pathinfo(path: &str, modules: &[String], request: &mut Request) {
    let mut rest = path.trim_start_matches('/');

    if let Some((first, tail)) = rest.split_once('/') {
        if modules.iter().any(|m| m.eq_ignore_ascii_case(first)) {
            request.set_module(first);
            rest = tail;
        }
    }

    if let Some(controller) = next_segment(&mut rest) {
        request.set_controller(controller);
    }
    if let Some(action) = next_segment(&mut rest) {
        request.set_action(action);
    }
    pairs_from_path(rest, request);
}

fn next_segment(rest: &mut &str) -> Option<String> {
    let trimmed = rest.trim_start_matches('/');
    if trimmed.is_empty() {
        *rest = trimmed;
        return None;
    }
    let (segment, tail) = trimmed.split_once('/').unwrap_or((trimmed, ""));
    *rest = tail;
    Some(decode(segment))
}

/// The default route: `/module/controller/action/k1/v1/...`.
#[derive(Debug, Clone, Default)]
pub struct StaticRoute {
    modules: Vec<String>,
}

impl StaticRoute {
    /// `modules` are the names a leading segment may be recognized as.
    #[must_use]
    pub fn new(modules: Vec<String>) -> Self {
        Self { modules }
    }
}

impl Route for StaticRoute {
    fn route(&self, request: &mut Request) -> bool {
        let path = request_path(request).to_string();
        route_pathinfo(&path, &self.modules, request);
        true
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

/// Route from query keys: `?m=admin&c=user&a=list`.
#[derive(Debug, Clone)]
pub struct SimpleRoute {
    module_key: String,
    controller_key: String,
    action_key: String,
}

impl SimpleRoute {
    #[must_use]
    pub fn new(module_key: &str, controller_key: &str, action_key: &str) -> Self {
        Self {
            module_key: module_key.to_string(),
            controller_key: controller_key.to_string(),
            action_key: action_key.to_string(),
        }
    }
}

impl Route for SimpleRoute {
    fn route(&self, request: &mut Request) -> bool {
        let module = request.get_query(&self.module_key).map(str::to_string);
        let controller = request.get_query(&self.controller_key).map(str::to_string);
        let action = request.get_query(&self.action_key).map(str::to_string);
        if module.is_none() && controller.is_none() && action.is_none() {
            return false;
        }
        if let Some(m) = module {
            request.set_module(m);
        }
        if let Some(c) = controller {
            request.set_controller(c);
        }
        if let Some(a) = action {
            request.set_action(a);
        }
        true
    }

    fn kind(&self) -> &'static str {
        "simple"
    }
}

/// Route from one query var carrying a path: `?r=/admin/user/list`.
#[derive(Debug, Clone)]
pub struct SupervarRoute {
    var: String,
    modules: Vec<String>,
}

impl SupervarRoute {
    #[must_use]
    pub fn new(var: &str, modules: Vec<String>) -> Self {
        Self {
            var: var.to_string(),
            modules,
        }
    }
}

impl Route for SupervarRoute {
    fn route(&self, request: &mut Request) -> bool {
        let Some(path) = request.get_query(&self.var).map(str::to_string) else {
            return false;
        };
        route_pathinfo(&path, &self.modules, request);
        true
    }

    fn kind(&self) -> &'static str {
        "supervar"
    }
}

/// Joins every path segment into a controller (or action) name.
///
/// `/user/list` → controller `User_List`; with a delimiter `#!`,
/// `/user/list#!/id/5` also yields the param `id=5`.
#[derive(Debug, Clone, Default)]
pub struct MapRoute {
    controller_prefer: bool,
    delimiter: Option<String>,
}

impl MapRoute {
    #[must_use]
    pub fn new(controller_prefer: bool, delimiter: Option<&str>) -> Self {
        Self {
            controller_prefer,
            delimiter: delimiter.filter(|d| !d.is_empty()).map(str::to_string),
        }
    }
}

impl Route for MapRoute {
    fn route(&self, request: &mut Request) -> bool {
        let path = request_path(request).to_string();
        let (route_part, params_part) = match &self.delimiter {
            Some(delimiter) => match path.split_once(delimiter.as_str()) {
                Some((head, tail)) => (head.to_string(), Some(tail.to_string())),
                None => (path, None),
            },
            None => (path, None),
        };

        let name = route_part
            .split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        if !name.is_empty() {
            if self.controller_prefer {
                request.set_controller(name);
            } else {
                request.set_action(name);
            }
        }
        if let Some(params) = params_part {
            pairs_from_path(&params, request);
        }
        true
    }

    fn kind(&self) -> &'static str {
        "map"
    }
}

/// Fixed or param-driven target of a rewrite/regex route.
///
/// A value starting with `:` names a matched param (`controller = ":name"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTarget {
    pub module: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
}

impl RouteTarget {
    #[must_use]
    pub fn new(module: Option<&str>, controller: Option<&str>, action: Option<&str>) -> Self {
        Self {
            module: module.map(str::to_string),
            controller: controller.map(str::to_string),
            action: action.map(str::to_string),
        }
    }

    fn apply(&self, request: &mut Request) {
        let module = self.module.as_deref().and_then(|v| resolve_target(v, request));
        let controller = self.controller.as_deref().and_then(|v| resolve_target(v, request));
        let action = self.action.as_deref().and_then(|v| resolve_target(v, request));
        if let Some(m) = module {
            request.set_module(m);
        }
        if let Some(c) = controller {
            request.set_controller(c);
        }
        if let Some(a) = action {
            request.set_action(a);
        }
    }
}

fn resolve_target(value: &str, request: &Request) -> Option<String> {
    match value.strip_prefix(':') {
        Some(name) => request.get_param_str(name).map(str::to_string),
        None => Some(value.to_string()),
    }
}

/// Name of the capture holding the `*` tail of a rewrite pattern.
const REST_GROUP: &str = "__rest";

/// Pattern route: `/product/:name/:id/*`.
///
/// `:name` captures one segment, a trailing `*` captures the rest of the path
/// as key/value pairs. Matching is anchored at the start.
#[derive(Debug, Clone)]
pub struct RewriteRoute {
    pattern: String,
    regex: Regex,
    target: RouteTarget,
}

impl RewriteRoute {
    pub fn new(pattern: &str, target: RouteTarget) -> Result<Self> {
        let mut source = String::from("^");
        let trimmed = pattern.trim_end_matches('/');
        for (i, segment) in trimmed.split('/').enumerate() {
            if i > 0 {
                source.push('/');
            }
            if segment == "*" {
                source.pop();
                source.push_str(&format!("(?:/(?P<{REST_GROUP}>.*))?"));
                break;
            } else if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(Error::type_error(format!(
                        "Invalid param '{segment}' in rewrite pattern '{pattern}'"
                    )));
                }
                source.push_str(&format!("(?P<{name}>[^/]+)"));
            } else {
                source.push_str(&regex::escape(segment));
            }
        }
        if !source.ends_with(")?") {
            source.push_str("/?$");
        }
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::type_error(format!("Invalid rewrite pattern '{pattern}'")).with_source(e))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            target,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Route for RewriteRoute {
    fn route(&self, request: &mut Request) -> bool {
        let path = request_path(request).to_string();
        let Some(caps) = self.regex.captures(&path) else {
            return false;
        };
        for name in self.regex.capture_names().flatten() {
            let Some(value) = caps.name(name) else { continue };
            if name == REST_GROUP {
                pairs_from_path(value.as_str(), request);
            } else {
                request.set_param(name, decode(value.as_str()));
            }
        }
        self.target.apply(request);
        true
    }

    fn kind(&self) -> &'static str {
        "rewrite"
    }
}

/// Regular-expression route with numbered captures mapped to param names.
///
/// The pattern may carry delimiters and flags: `#^/list/(\d+)#i`.
#[derive(Debug, Clone)]
pub struct RegexRoute {
    regex: Regex,
    target: RouteTarget,
    map: BTreeMap<usize, String>,
}

impl RegexRoute {
    pub fn new(pattern: &str, target: RouteTarget, map: BTreeMap<usize, String>) -> Result<Self> {
        let (source, case_insensitive) = strip_delimiters(pattern);
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| Error::type_error(format!("Invalid regex route '{pattern}'")).with_source(e))?;
        Ok(Self { regex, target, map })
    }
}

/// `#body#i` → (`body`, true). Patterns without delimiters pass through.
fn strip_delimiters(pattern: &str) -> (&str, bool) {
    let mut chars = pattern.chars();
    let Some(open) = chars.next() else {
        return (pattern, false);
    };
    if open.is_alphanumeric() || open == '\\' || open == '^' || open == '(' {
        return (pattern, false);
    }
    let inner = &pattern[open.len_utf8()..];
    match inner.rfind(open) {
        Some(end) => {
            let flags = &inner[end + open.len_utf8()..];
            (&inner[..end], flags.contains('i'))
        }
        None => (pattern, false),
    }
}

impl Route for RegexRoute {
    fn route(&self, request: &mut Request) -> bool {
        let path = request_path(request).to_string();
        let Some(caps) = self.regex.captures(&path) else {
            return false;
        };
        for (index, name) in &self.map {
            if let Some(value) = caps.get(*index) {
                request.set_param(name, decode(value.as_str()));
            }
        }
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = caps.name(name) {
                request.set_param(name, decode(value.as_str()));
            }
        }
        self.target.apply(request);
        true
    }

    fn kind(&self) -> &'static str {
        "regex"
    }
}

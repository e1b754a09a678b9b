//! Building routes from structured configuration.
//!
//! ```toml
//! [product.routes.product]
//! type = "rewrite"
//! match = "/product/:name/*"
//! route = { controller = "product", action = "info" }
//!
//! [product.routes.list]
//! type = "regex"
//! match = "#^/list/([^/]+)/(\\d+)#"
//! route = { controller = "list", action = ":kind" }
//! map = { 1 = "kind", 2 = "page" }
//! ```

use super::core::{Route, Router};
use super::routes::{MapRoute, RegexRoute, RewriteRoute, RouteTarget, SimpleRoute, StaticRoute, SupervarRoute};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Build one route from its config entry.
pub fn route_from_config(config: &Value, modules: &[String]) -> Result<Arc<dyn Route>> {
    let entry = config
        .as_object()
        .ok_or_else(|| Error::type_error("Route config must be a map"))?;
    let kind = entry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::type_error("Route config requires a 'type'"))?;
    let text = |key: &str| entry.get(key).and_then(Value::as_str);

    let route: Arc<dyn Route> = match kind.to_ascii_lowercase().as_str() {
        "static" => Arc::new(StaticRoute::new(modules.to_vec())),
        "simple" => {
            let (Some(m), Some(c), Some(a)) = (text("module"), text("controller"), text("action")) else {
                return Err(Error::type_error(
                    "Simple route requires 'module', 'controller' and 'action' keys",
                ));
            };
            Arc::new(SimpleRoute::new(m, c, a))
        }
        "supervar" => {
            let var = text("varname")
                .ok_or_else(|| Error::type_error("Supervar route requires 'varname'"))?;
            Arc::new(SupervarRoute::new(var, modules.to_vec()))
        }
        "map" => {
            let prefer = entry
                .get("controllerPrefer")
                .map(|v| match v {
                    Value::Bool(b) => *b,
                    Value::String(s) => crate::runtime_config::parse_flag(s).unwrap_or(false),
                    Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
                    _ => false,
                })
                .unwrap_or(false);
            Arc::new(MapRoute::new(prefer, text("delimiter")))
        }
        "rewrite" => {
            let pattern = text("match")
                .ok_or_else(|| Error::type_error("Rewrite route requires 'match'"))?;
            Arc::new(RewriteRoute::new(pattern, target(entry.get("route"))?)?)
        }
        "regex" => {
            let pattern = text("match")
                .ok_or_else(|| Error::type_error("Regex route requires 'match'"))?;
            Arc::new(RegexRoute::new(
                pattern,
                target(entry.get("route"))?,
                capture_map(entry.get("map"))?,
            )?)
        }
        other => return Err(Error::type_error(format!("Unknown route type '{other}'"))),
    };
    Ok(route)
}

fn target(config: Option<&Value>) -> Result<RouteTarget> {
    match config {
        None | Some(Value::Null) => Ok(RouteTarget::default()),
        Some(Value::Object(map)) => {
            let get = |key: &str| map.get(key).and_then(Value::as_str);
            Ok(RouteTarget::new(get("module"), get("controller"), get("action")))
        }
        Some(_) => Err(Error::type_error("Route 'route' entry must be a map")),
    }
}

fn capture_map(config: Option<&Value>) -> Result<BTreeMap<usize, String>> {
    let mut map = BTreeMap::new();
    match config {
        None | Some(Value::Null) => {}
        Some(Value::Object(entries)) => {
            for (index, name) in entries {
                let index: usize = index
                    .parse()
                    .map_err(|_| Error::type_error(format!("Regex map key '{index}' is not an index")))?;
                let name = name
                    .as_str()
                    .ok_or_else(|| Error::type_error("Regex map values must be strings"))?;
                map.insert(index, name.to_string());
            }
        }
        // Arrays map positionally starting at capture 1.
        Some(Value::Array(names)) => {
            for (i, name) in names.iter().enumerate() {
                if let Some(name) = name.as_str() {
                    map.insert(i + 1, name.to_string());
                }
            }
        }
        Some(_) => return Err(Error::type_error("Regex route 'map' must be a map")),
    }
    Ok(map)
}

impl Router {
    /// Add every route of a `name → entry` map (or a list, named by index)
    /// in declaration order.
    pub fn add_config(&mut self, config: &Value) -> Result<&mut Self> {
        let modules = self.modules().to_vec();
        match config {
            Value::Object(entries) => {
                for (name, entry) in entries {
                    let route = route_from_config(entry, &modules)?;
                    self.add_route(name, route);
                }
            }
            Value::Array(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    let route = route_from_config(entry, &modules)?;
                    self.add_route(&i.to_string(), route);
                }
            }
            _ => return Err(Error::type_error("Routes config must be a map or a list")),
        }
        Ok(self)
    }
}

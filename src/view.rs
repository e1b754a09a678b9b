//! # View Module
//!
//! Template rendering behind the [`View`] trait. The dispatcher creates a
//! [`SimpleView`] lazily on the first dispatch unless one was installed with
//! `Dispatcher::set_view`, and reuses it across forwards.
//!
//! Templates are resolved against the view's script path when it has one,
//! otherwise against the per-iteration view directory (`<app>/views` or
//! `<app>/modules/<Module>/views`).

use crate::error::{Error, ErrorCode, Result};
use minijinja::Environment;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A template engine.
pub trait View: Send {
    /// Assign a variable visible to every subsequent render.
    fn assign(&mut self, name: &str, value: Value);

    fn get(&self, name: &str) -> Option<&Value>;

    /// Drop one variable, or all of them.
    fn clear_vars(&mut self, name: Option<&str>);

    /// Render `template` with the assigned variables overlaid by `vars`.
    fn render(&mut self, template: &Path, vars: Option<&Value>) -> Result<String>;

    /// Directory templates are looked up in; takes priority over the
    /// dispatcher's view directory.
    fn script_path(&self) -> Option<&Path>;

    fn set_script_path(&mut self, path: Option<PathBuf>);
}

/// File-based view rendering templates with minijinja.
#[derive(Debug, Default, Clone)]
pub struct SimpleView {
    script_path: Option<PathBuf>,
    vars: Map<String, Value>,
}

impl SimpleView {
    #[must_use]
    pub fn new(script_path: Option<PathBuf>) -> Self {
        Self {
            script_path,
            vars: Map::new(),
        }
    }

    /// Render a template held in memory.
    pub fn eval(&self, source: &str, vars: Option<&Value>) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("tpl", source)
            .map_err(|e| Error::call_failed(format!("Template syntax error: {e}")).with_source(e))?;
        let tmpl = env
            .get_template("tpl")
            .map_err(|e| Error::call_failed(e.to_string()).with_source(e))?;
        tmpl.render(self.context(vars))
            .map_err(|e| Error::call_failed(format!("Template render failed: {e}")).with_source(e))
    }

    fn context(&self, vars: Option<&Value>) -> Value {
        let mut ctx = self.vars.clone();
        if let Some(Value::Object(extra)) = vars {
            for (k, v) in extra {
                ctx.insert(k.clone(), v.clone());
            }
        }
        Value::Object(ctx)
    }
}

impl View for SimpleView {
    fn assign(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    fn clear_vars(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.vars.remove(name);
            }
            None => self.vars.clear(),
        }
    }

    fn render(&mut self, template: &Path, vars: Option<&Value>) -> Result<String> {
        let path = match &self.script_path {
            Some(base) if template.is_relative() => join_template(base, template)?,
            _ => template.to_path_buf(),
        };
        if !path.is_file() {
            return Err(Error::new(
                ErrorCode::ViewNotFound,
                format!("Failed opening template {}", path.display()),
            ));
        }
        let source = fs::read_to_string(&path).map_err(|e| {
            Error::new(ErrorCode::ViewNotFound, format!("Failed reading template {}", path.display()))
                .with_source(e)
        })?;
        debug!(template = %path.display(), "Rendering template");
        self.eval(&source, vars)
    }

    fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    fn set_script_path(&mut self, path: Option<PathBuf>) {
        self.script_path = path;
    }
}

/// Join a relative template path, refusing to climb out of `base`.
pub(crate) fn join_template(base: &Path, template: &Path) -> Result<PathBuf> {
    let mut path = base.to_path_buf();
    for comp in template.components() {
        match comp {
            Component::Normal(s) => path.push(s),
            Component::CurDir => {}
            _ => {
                return Err(Error::new(
                    ErrorCode::ViewNotFound,
                    format!("Invalid template path {}", template.display()),
                ))
            }
        }
    }
    Ok(path)
}

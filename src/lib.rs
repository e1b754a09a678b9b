//! # yaf
//!
//! **yaf** is a convention-over-configuration MVC dispatch core. It takes an
//! abstracted request from a host server, routes it to a module, controller
//! and action, runs the action with plugin hooks around it, renders the
//! default view and hands back (or flushes) the response.
//!
//! ## Architecture
//!
//! - **[`config`]**, **[`runtime_config`]**, **[`globals`]** - Application
//!   settings: the config tree, process defaults and the parsed globals
//! - **[`http`]** - The request/response pair and the output emitter
//! - **[`router`]** - Ordered route strategies (static, simple, supervar,
//!   map, rewrite, regex)
//! - **[`loader`]** - Class name to script mapping and on-demand loading
//! - **[`controller`]** - Controllers, action classes and parameter binding
//! - **[`view`]** - The view trait and the `minijinja`-backed default view
//! - **[`plugin`]** - The seven dispatch hooks
//! - **[`bootstrap`]** - `_init*` methods run once before dispatching
//! - **[`dispatcher`]** - The dispatch state machine
//! - **[`application`]** - Top-level lifecycle and the single-instance latch
//! - **[`logging`]** - Stock `tracing` subscriber setup
//! - **[`cli`]** - The `yaf` binary: route resolution and settings dumps
//!
//! ## Application tree
//!
//! ```text
//! app/
//! ├── Bootstrap.php
//! ├── controllers/
//! │   ├── Index.php
//! │   └── Error.php
//! ├── views/
//! │   └── index/index.phtml
//! ├── plugins/
//! ├── library/
//! └── modules/
//!     └── Admin/
//!         ├── controllers/
//!         └── views/
//! ```
//!
//! Scripts mark where a class lives; the classes themselves are Rust types
//! declared with the [`loader::Loader`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use serde_json::json;
//! use yaf::{ActionContext, ActionTable, Application, Controller, ControllerClass};
//!
//! #[derive(Default)]
//! struct IndexController;
//!
//! #[yaf::actions]
//! impl IndexController {
//!     fn index_action(&mut self, cx: &mut ActionContext<'_>, name: Option<String>) -> yaf::Result<()> {
//!         cx.response_mut().append_body(&format!("hello {}", name.unwrap_or_default()));
//!         Ok(())
//!     }
//! }
//!
//! impl Controller for IndexController {
//!     fn actions() -> ActionTable<Self> {
//!         Self::action_table()
//!     }
//! }
//!
//! let mut app = Application::new(json!({"application": {"directory": "/srv/app"}}), None)?;
//! app.loader_mut()
//!     .declare_controller("Index", "Index", ControllerClass::of::<IndexController>());
//! app.run()?;
//! ```

extern crate self as yaf;

pub mod application;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod globals;
pub mod http;
pub mod ids;
pub mod loader;
pub mod logging;
pub mod names;
pub mod plugin;
pub mod router;
pub mod runtime_config;
pub mod view;

pub use application::Application;
pub use bootstrap::{Bootstrap, BootstrapClass};
pub use config::{Config, ConfigSource};
pub use controller::{Action, ActionClass, ActionContext, ActionTable, Args, Controller, ControllerClass, ParamSpec};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{Error, ErrorCode, ErrorMask, Result};
pub use http::{Request, Response};
pub use plugin::{Plugin, PluginClass};
pub use router::Router;
pub use view::{SimpleView, View};
pub use yaf_macros::{actions, bootstrap};

//! # CLI Module
//!
//! The `yaf` binary: offline inspection of an application's configuration.
//!
//! ## Commands
//!
//! ### `route`
//!
//! Resolve URIs the way the dispatcher's router would:
//!
//! ```bash
//! yaf route --config conf/app.toml /admin/user/list/page/2 /product/phone/x
//! ```
//!
//! Routes come from `application.dispatcher.defaultRoute` and the `routes`
//! table of the selected section.
//!
//! ### `config`
//!
//! Print the parsed application settings as JSON:
//!
//! ```bash
//! yaf config --config conf/app.toml --section develop
//! ```
//!
//! The section defaults to `YAF_ENVIRON` (`product`).

mod commands;


pub use commands::{describe_globals, resolve_uris, run_cli, Cli, Commands, Resolution};

//! # Dispatcher Module
//!
//! The dispatcher turns a [`Request`](crate::http::Request) into a
//! [`Response`](crate::http::Response): it routes the request, resolves the
//! module, controller and action, runs the action, renders the default
//! template and hands the response back or flushes it.
//!
//! ## Pipeline
//!
//! 1. `routerStartup` hooks, routing, name normalization, `routerShutdown`
//!    hooks (skipped for a request that is already routed)
//! 2. `dispatchLoopStartup` hooks
//! 3. The forward loop, at most `forward_limit` times: `preDispatch`, the
//!    action, `postDispatch`. An action forwards by changing the target and
//!    clearing the request's dispatched flag.
//! 4. `dispatchLoopShutdown` hooks
//! 5. Auto render of `<controller>/<action>.<view_ext>` unless the action
//!    rendered itself or auto render is off
//! 6. `preResponse` hooks, then return or flush
//!
//! A loop that still forwards after `forward_limit` iterations fails with
//! `FORWARD_OVERFLOW`.
//!
//! ## Errors
//!
//! With `catch_exception` on, the first error is turned into a dispatch of
//! `Error/error` in the current module (or the default module), with the
//! error in the `exception` request param. The error dispatch runs through
//! the forward loop again with a fresh budget, so `preDispatch`,
//! `postDispatch` and `dispatchLoopShutdown` see it like any other request:
//!
//! ```rust,ignore
//! #[yaf::actions]
//! impl ErrorController {
//!     fn error_action(&mut self, cx: &mut ActionContext<'_>, exception: Arc<yaf::Error>) -> yaf::Result<()> {
//!         cx.response_mut().set_status(500);
//!         cx.response_mut().append_body(exception.message());
//!         cx.set_rendered();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! An error raised by the error controller itself is returned as is.
//! Otherwise errors are returned to the caller; with `throw_exception` off the
//! handler set by [`Dispatcher::set_error_handler`] sees them first.
//!
//! ## Hosting
//!
//! A dispatcher serves one request at a time. Hosts that serve many requests
//! call [`Dispatcher::dispatch`] once per request, each with its own
//! [`Request`](crate::http::Request).

mod core;
mod pipeline;
#[cfg(test)]
mod tests;

pub use core::{DispatchOutcome, Dispatcher, ErrorHandler};
pub use pipeline::{ERROR_ACTION, ERROR_CONTROLLER};

//! # Error Module
//!
//! Every failure inside the framework is a [`Error`] carrying a stable
//! [`ErrorCode`]. The codes are part of the public contract: user error
//! controllers switch on them and `Application::last_error_no` reports them.
//!
//! ## Propagation
//!
//! Errors raised while dispatching are inspected by the dispatcher's exception
//! latch. With `catch_exception` enabled they become an `Error/error` dispatch
//! and are handed to the error controller through the `exception` request
//! param; otherwise they propagate to the caller of `Application::run`.

use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

/// A boxed error type for wrapping arbitrary causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Library result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error taxonomy.
///
/// Numeric values never change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Configuration or application construction failed.
    StartupFailed = 512,
    /// No route accepted the request.
    RouteFailed = 513,
    /// The dispatcher could not proceed (empty names, missing app directory).
    DispatchFailed = 514,
    /// The routed module is not in the configured module list.
    ModuleNotFound = 515,
    /// The controller script does not exist.
    ControllerNotFound = 516,
    /// Neither an action method nor an action class was found.
    ActionNotFound = 517,
    /// The template file does not exist.
    ViewNotFound = 518,
    /// A user callable (action, plugin hook, init method, template) failed.
    CallFailed = 519,
    /// A script was loaded but did not define the expected class.
    AutoloadFailed = 520,
    /// A class or value had the wrong kind.
    TypeError = 521,
    /// The forward loop ran out of iterations.
    ForwardOverflow = 522,
}

impl ErrorCode {
    /// Numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Upper-case symbolic name, as used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::StartupFailed => "STARTUP_FAILED",
            ErrorCode::RouteFailed => "ROUTE_FAILED",
            ErrorCode::DispatchFailed => "DISPATCH_FAILED",
            ErrorCode::ModuleNotFound => "MODULE_NOT_FOUND",
            ErrorCode::ControllerNotFound => "CONTROLLER_NOT_FOUND",
            ErrorCode::ActionNotFound => "ACTION_NOT_FOUND",
            ErrorCode::ViewNotFound => "VIEW_NOT_FOUND",
            ErrorCode::CallFailed => "CALL_FAILED",
            ErrorCode::AutoloadFailed => "AUTOLOAD_FAILED",
            ErrorCode::TypeError => "TYPE_ERROR",
            ErrorCode::ForwardOverflow => "FORWARD_OVERFLOW",
        }
    }

    /// Look a code up by its numeric value.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            512 => ErrorCode::StartupFailed,
            513 => ErrorCode::RouteFailed,
            514 => ErrorCode::DispatchFailed,
            515 => ErrorCode::ModuleNotFound,
            516 => ErrorCode::ControllerNotFound,
            517 => ErrorCode::ActionNotFound,
            518 => ErrorCode::ViewNotFound,
            519 => ErrorCode::CallFailed,
            520 => ErrorCode::AutoloadFailed,
            521 => ErrorCode::TypeError,
            522 => ErrorCode::ForwardOverflow,
            _ => return None,
        })
    }

    /// The mask bit selecting this code in an [`ErrorMask`].
    #[must_use]
    pub fn mask(self) -> ErrorMask {
        ErrorMask::from_bits_truncate(1 << (self.code() - 512))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Selects which error codes an error handler wants to see.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorMask: u32 {
        const STARTUP_FAILED = 1 << 0;
        const ROUTE_FAILED = 1 << 1;
        const DISPATCH_FAILED = 1 << 2;
        const MODULE_NOT_FOUND = 1 << 3;
        const CONTROLLER_NOT_FOUND = 1 << 4;
        const ACTION_NOT_FOUND = 1 << 5;
        const VIEW_NOT_FOUND = 1 << 6;
        const CALL_FAILED = 1 << 7;
        const AUTOLOAD_FAILED = 1 << 8;
        const TYPE_ERROR = 1 << 9;
        const FORWARD_OVERFLOW = 1 << 10;
    }
}

impl Default for ErrorMask {
    fn default() -> Self {
        ErrorMask::all()
    }
}

/// Framework error: a stable code, a message and an optional cause.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Create an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn startup(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StartupFailed, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeError, message)
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DispatchFailed, message)
    }

    /// Failure raised by user code (actions, hooks, init methods).
    pub fn call_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CallFailed, message)
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Build a `CALL_FAILED` error out of a caught panic payload.
    pub(crate) fn from_panic(context: &str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::call_failed(format!("{context} panicked: {detail}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorCode::CallFailed, err.to_string()).with_source(err)
    }
}

//! # HTTP Module
//!
//! The abstracted request/response pair the dispatcher consumes. The host
//! server builds a [`Request`], hands it to the dispatcher, and either receives
//! the [`Response`] back or lets the dispatcher flush it through an
//! [`Emitter`].
//!
//! ## Params vs query
//!
//! Query-string pairs are kept apart from params. Params are filled by routes
//! (`/user/id/5` → `id=5`) and by user code, and are what action arguments bind
//! to. The error controller finds the caught error in the `exception` param.

mod request;
mod response;

pub use request::{
    HeaderVec, ParamValue, ParamVec, QueryVec, Request, RequestKind, EXCEPTION_PARAM,
    MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
pub use response::{BufferEmitter, Emitted, Emitter, Response, StdoutEmitter, DEFAULT_BODY};

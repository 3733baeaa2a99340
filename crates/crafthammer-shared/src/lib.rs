//! Module lifecycle and request/response primitives
//!
//! Modules are driven through handshake/load/start/update/stop/unload by the
//! embedder. Their hooks talk to the remote peer with [`Request`], a single
//! correlated command that resolves exactly once, either with the peer's
//! response or with a timeout.

pub mod error;
pub mod module;
pub mod module_set;
pub mod request;

pub use error::{ASYNC_ERROR_NONE, ASYNC_ERROR_TIMEOUT, ModuleError, RequestError};
pub use module::{MODULE_NAMESPACE, Module, ModuleContext, ModuleHooks, ModuleProperties};
pub use module_set::{Lifecycle, ModuleSet};
pub use request::{
    DEFAULT_REQUEST_TIMEOUT, ErrorCallback, Request, RequestBuilder, RequestState, SuccessCallback,
};

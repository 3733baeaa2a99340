use std::time::Duration;

/// Async status code for a request that resolved with a response
pub const ASYNC_ERROR_NONE: u32 = 0;

/// Async status code for a request that timed out
pub const ASYNC_ERROR_TIMEOUT: u32 = 1;

/// Lifecycle precondition violations
///
/// Every variant carries the id of the module that rejected the transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("The module is already loaded: {id}")]
    AlreadyLoaded { id: String },

    #[error("The module is not loaded: {id}")]
    NotLoaded { id: String },

    #[error("The module has already started: {id}")]
    AlreadyStarted { id: String },

    #[error("The module has not started: {id}")]
    NotStarted { id: String },

    #[error("The module is running and cannot be unloaded: {id}")]
    StillRunning { id: String },

    #[error("A module with this id is already registered: {id}")]
    Duplicate { id: String },
}

impl ModuleError {
    /// Id of the offending module
    pub fn module_id(&self) -> &str {
        match self {
            ModuleError::AlreadyLoaded { id }
            | ModuleError::NotLoaded { id }
            | ModuleError::AlreadyStarted { id }
            | ModuleError::NotStarted { id }
            | ModuleError::StillRunning { id }
            | ModuleError::Duplicate { id } => id,
        }
    }
}

/// Asynchronous request failure delivered to `on_error`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Request {module}/{command} timed out after {elapsed:?} (limit {timeout:?})")]
    Timeout {
        module: String,
        command: String,
        elapsed: Duration,
        timeout: Duration,
    },
}

impl RequestError {
    /// Numeric async status code for this error
    pub fn code(&self) -> u32 {
        match self {
            RequestError::Timeout { .. } => ASYNC_ERROR_TIMEOUT,
        }
    }
}

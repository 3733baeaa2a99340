use crafthammer_host::{Host, ListenerId};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::RequestError;

/// Timeout applied when a request is built without one
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Invoked with the peer's result when the matching response arrives
pub type SuccessCallback = Box<dyn FnOnce(&Value, &Request)>;

/// Invoked when the request fails
pub type ErrorCallback = Box<dyn FnOnce(RequestError, &Request)>;

/// Where a request is in its lifecycle
///
/// `Unsent -> Pending -> {Succeeded | TimedOut | Cancelled}`, each step taken
/// at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Unsent,
    Pending,
    Succeeded,
    TimedOut,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Succeeded | RequestState::TimedOut | RequestState::Cancelled
        )
    }
}

/// A single outbound command paired with a time-bounded wait for its response
///
/// Cloning yields another handle to the same request. While pending, the
/// host's listener registries hold handles too, so the caller may drop theirs
/// and still receive the callback.
#[derive(Clone)]
pub struct Request {
    shared: Rc<Shared>,
}

struct Shared {
    host: Rc<dyn Host>,
    module: String,
    command: String,
    args: Vec<Value>,
    timeout: Duration,
    progress: RefCell<Progress>,
}

struct Progress {
    state: RequestState,
    started_at: Option<Instant>,
    listeners: Option<Listeners>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

#[derive(Debug, Clone, Copy)]
struct Listeners {
    server_command: ListenerId,
    tick: ListenerId,
}

impl Request {
    /// Start building a request for `command` in the `module` namespace
    pub fn builder(
        host: Rc<dyn Host>,
        module: impl Into<String>,
        command: impl Into<String>,
    ) -> RequestBuilder {
        RequestBuilder {
            host,
            module: module.into(),
            command: command.into(),
            args: Vec::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            on_success: None,
            on_error: None,
        }
    }

    /// Transmit the command and start waiting for the response
    ///
    /// Only the first call does anything; later calls return `false`.
    pub fn send(&self) -> bool {
        let host = &self.shared.host;

        {
            let mut progress = self.shared.progress.borrow_mut();
            if progress.state != RequestState::Unsent {
                debug!(
                    target: "request",
                    "Ignoring repeated send for {}/{} ({:?})",
                    self.shared.module,
                    self.shared.command,
                    progress.state
                );
                return false;
            }
            progress.state = RequestState::Pending;
            progress.started_at = Some(host.now());
        }

        let request = self.clone();
        let server_command = host.add_server_command_listener(Rc::new(
            move |module: &str, command: &str, result: &Value| {
                request.dispatch(module, command, result)
            },
        ));

        let request = self.clone();
        let tick = host.add_tick_listener(Rc::new(move || request.poll_timeout()));

        self.shared.progress.borrow_mut().listeners = Some(Listeners {
            server_command,
            tick,
        });

        debug!(
            target: "request",
            "Sending {}/{} (timeout {:?})",
            self.shared.module,
            self.shared.command,
            self.shared.timeout
        );

        // No borrow is held here: a loopback host may answer synchronously
        host.dispatch_command(&self.shared.module, &self.shared.command, &self.shared.args);
        true
    }

    /// Stop waiting without invoking either callback
    ///
    /// Returns `false` unless the request was pending.
    pub fn cancel(&self) -> bool {
        let callbacks = {
            let mut progress = self.shared.progress.borrow_mut();
            if progress.state != RequestState::Pending {
                return false;
            }
            self.retire(&mut progress, RequestState::Cancelled);
            (progress.on_success.take(), progress.on_error.take())
        };
        drop(callbacks);

        debug!(target: "request", "Cancelled {}/{}", self.shared.module, self.shared.command);
        true
    }

    pub fn module(&self) -> &str {
        &self.shared.module
    }

    pub fn command(&self) -> &str {
        &self.shared.command
    }

    pub fn args(&self) -> &[Value] {
        &self.shared.args
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    pub fn state(&self) -> RequestState {
        self.shared.progress.borrow().state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == RequestState::Pending
    }

    /// When `send()` first ran
    pub fn started_at(&self) -> Option<Instant> {
        self.shared.progress.borrow().started_at
    }

    /// Time since `send()` according to the host clock
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at()
            .map(|started| self.shared.host.now().saturating_duration_since(started))
    }

    /// Both the module and the command must equal this request's own
    fn matches(&self, module: &str, command: &str) -> bool {
        self.shared.module == module && self.shared.command == command
    }

    /// Remove both listeners and enter a terminal state
    fn retire(&self, progress: &mut Progress, state: RequestState) {
        if let Some(listeners) = progress.listeners.take() {
            self.shared
                .host
                .remove_server_command_listener(listeners.server_command);
            self.shared.host.remove_tick_listener(listeners.tick);
        }
        progress.state = state;
    }

    fn dispatch(&self, module: &str, command: &str, result: &Value) {
        let (on_success, on_error) = {
            let mut progress = self.shared.progress.borrow_mut();
            if progress.state != RequestState::Pending || !self.matches(module, command) {
                return;
            }
            self.retire(&mut progress, RequestState::Succeeded);
            (progress.on_success.take(), progress.on_error.take())
        };
        drop(on_error);

        debug!(
            target: "request",
            "Response for {}/{} after {:?}",
            module,
            command,
            self.elapsed().unwrap_or_default()
        );

        if let Some(callback) = on_success {
            callback(result, self);
        }
    }

    fn poll_timeout(&self) {
        let (on_success, on_error, error) = {
            let mut progress = self.shared.progress.borrow_mut();
            if progress.state != RequestState::Pending {
                return;
            }
            let Some(started_at) = progress.started_at else {
                return;
            };

            let elapsed = self.shared.host.now().saturating_duration_since(started_at);
            if elapsed <= self.shared.timeout {
                return;
            }

            self.retire(&mut progress, RequestState::TimedOut);
            let error = RequestError::Timeout {
                module: self.shared.module.clone(),
                command: self.shared.command.clone(),
                elapsed,
                timeout: self.shared.timeout,
            };
            (progress.on_success.take(), progress.on_error.take(), error)
        };
        drop(on_success);

        warn!(target: "request", "{}", error);

        if let Some(callback) = on_error {
            callback(error, self);
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("module", &self.shared.module)
            .field("command", &self.shared.command)
            .field("args", &self.shared.args)
            .field("timeout", &self.shared.timeout)
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`Request`]
pub struct RequestBuilder {
    host: Rc<dyn Host>,
    module: String,
    command: String,
    args: Vec<Value>,
    timeout: Duration,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl RequestBuilder {
    /// Replace the argument list
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Value, &Request) + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(RequestError, &Request) + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Build the request without sending it
    pub fn build(self) -> Request {
        Request {
            shared: Rc::new(Shared {
                host: self.host,
                module: self.module,
                command: self.command,
                args: self.args,
                timeout: self.timeout,
                progress: RefCell::new(Progress {
                    state: RequestState::Unsent,
                    started_at: None,
                    listeners: None,
                    on_success: self.on_success,
                    on_error: self.on_error,
                }),
            }),
        }
    }

    /// Build the request and send it immediately
    pub fn send(self) -> Request {
        let request = self.build();
        request.send();
        request
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// Identity of a registered listener
///
/// Returned by the `add_*` methods on [`Host`] and used to remove the same
/// listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Listener for inbound server commands: `(module, command, result)`
pub type ServerCommandListener = Rc<dyn Fn(&str, &str, &Value)>;

/// Listener for host ticks
pub type TickListener = Rc<dyn Fn()>;

/// Command sent from the client to the remote peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCommand {
    pub module: String,
    pub command: String,
    pub args: Vec<Value>,
}

/// Command received from the remote peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCommand {
    pub module: String,
    pub command: String,
    pub result: Value,
}

impl ServerCommand {
    pub fn new(module: impl Into<String>, command: impl Into<String>, result: Value) -> Self {
        Self {
            module: module.into(),
            command: command.into(),
            result,
        }
    }
}

/// Services the game host exposes to scripts
///
/// All methods take `&self`: listeners are invoked from inside the host and
/// may register or remove listeners (or dispatch commands) while a
/// notification is being delivered.
pub trait Host {
    /// Fire-and-forget transmission to the remote peer
    fn dispatch_command(&self, module: &str, command: &str, args: &[Value]);

    /// Register a listener for inbound server commands
    fn add_server_command_listener(&self, listener: ServerCommandListener) -> ListenerId;

    /// Remove a server command listener, returning whether it was registered
    fn remove_server_command_listener(&self, id: ListenerId) -> bool;

    /// Register a listener for ticks
    ///
    /// Ticks fire even while the host simulation is paused.
    fn add_tick_listener(&self, listener: TickListener) -> ListenerId;

    /// Remove a tick listener, returning whether it was registered
    fn remove_tick_listener(&self, id: ListenerId) -> bool;

    /// Current wall-clock time
    fn now(&self) -> Instant;
}

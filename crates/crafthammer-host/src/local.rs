use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::host::{ClientCommand, Host, ListenerId, ServerCommandListener, TickListener};

/// Ordered listener registry keyed by [`ListenerId`]
struct ListenerList<L> {
    entries: RefCell<Vec<(ListenerId, L)>>,
}

impl<L: Clone> ListenerList<L> {
    fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    fn add(&self, id: ListenerId, listener: L) {
        self.entries.borrow_mut().push((id, listener));
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|(eid, _)| *eid == id) {
            Some(pos) => {
                entries.remove(pos);
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|(eid, _)| *eid == id)
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Copy of the current entries, so listeners can mutate the registry
    /// while the snapshot is being walked
    fn snapshot(&self) -> Vec<(ListenerId, L)> {
        self.entries.borrow().clone()
    }
}

/// In-process host
///
/// Records every outbound command and optionally forwards it over a channel.
/// Inbound commands and ticks are pushed in by the embedder through
/// [`LocalHost::deliver_server_command`] and [`LocalHost::tick`].
pub struct LocalHost {
    clock: Rc<dyn Clock>,
    outbound_tx: Option<UnboundedSender<ClientCommand>>,
    sent: RefCell<Vec<ClientCommand>>,
    server_command_listeners: ListenerList<ServerCommandListener>,
    tick_listeners: ListenerList<TickListener>,
    next_listener_id: Cell<u64>,
    tick_count: Cell<u64>,
}

impl LocalHost {
    /// Create a host backed by the system clock
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    /// Create a host with an injected clock
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            outbound_tx: None,
            sent: RefCell::new(Vec::new()),
            server_command_listeners: ListenerList::new(),
            tick_listeners: ListenerList::new(),
            next_listener_id: Cell::new(0),
            tick_count: Cell::new(0),
        }
    }

    /// Forward outbound commands to a channel in addition to recording them
    pub fn with_outbound(mut self, tx: UnboundedSender<ClientCommand>) -> Self {
        self.outbound_tx = Some(tx);
        self
    }

    /// Deliver an inbound command to every registered listener
    ///
    /// Returns the number of listeners invoked. A listener removed by an
    /// earlier listener during the same delivery is skipped.
    pub fn deliver_server_command(&self, module: &str, command: &str, result: &Value) -> usize {
        let snapshot = self.server_command_listeners.snapshot();
        let mut invoked = 0;

        for (id, listener) in snapshot {
            if !self.server_command_listeners.contains(id) {
                continue;
            }
            listener(module, command, result);
            invoked += 1;
        }

        trace!(target: "host", "Delivered {}.{} to {} listener(s)", module, command, invoked);
        invoked
    }

    /// Fire one tick to every registered tick listener
    ///
    /// Returns the number of listeners invoked.
    pub fn tick(&self) -> usize {
        self.tick_count.set(self.tick_count.get() + 1);

        let snapshot = self.tick_listeners.snapshot();
        let mut invoked = 0;

        for (id, listener) in snapshot {
            if !self.tick_listeners.contains(id) {
                continue;
            }
            listener();
            invoked += 1;
        }

        invoked
    }

    /// Number of ticks fired so far
    pub fn tick_count(&self) -> u64 {
        self.tick_count.get()
    }

    /// All outbound commands dispatched so far
    pub fn sent_commands(&self) -> Vec<ClientCommand> {
        self.sent.borrow().clone()
    }

    /// Drain the outbound command log
    pub fn take_sent_commands(&self) -> Vec<ClientCommand> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn server_command_listener_count(&self) -> usize {
        self.server_command_listeners.len()
    }

    pub fn tick_listener_count(&self) -> usize {
        self.tick_listeners.len()
    }

    fn next_id(&self) -> ListenerId {
        let id = ListenerId::new(self.next_listener_id.get());
        self.next_listener_id.set(self.next_listener_id.get() + 1);
        id
    }
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for LocalHost {
    fn dispatch_command(&self, module: &str, command: &str, args: &[Value]) {
        let outgoing = ClientCommand {
            module: module.to_string(),
            command: command.to_string(),
            args: args.to_vec(),
        };

        debug!(target: "host", "Dispatching {}.{} ({} arg(s))", module, command, args.len());

        if let Some(tx) = &self.outbound_tx {
            // Receiver may be gone during shutdown
            let _ = tx.send(outgoing.clone());
        }
        self.sent.borrow_mut().push(outgoing);
    }

    fn add_server_command_listener(&self, listener: ServerCommandListener) -> ListenerId {
        let id = self.next_id();
        self.server_command_listeners.add(id, listener);
        trace!(target: "host", "Registered server command {}", id);
        id
    }

    fn remove_server_command_listener(&self, id: ListenerId) -> bool {
        let removed = self.server_command_listeners.remove(id);
        trace!(target: "host", "Removed server command {}: {}", id, removed);
        removed
    }

    fn add_tick_listener(&self, listener: TickListener) -> ListenerId {
        let id = self.next_id();
        self.tick_listeners.add(id, listener);
        trace!(target: "host", "Registered tick {}", id);
        id
    }

    fn remove_tick_listener(&self, id: ListenerId) -> bool {
        let removed = self.tick_listeners.remove(id);
        trace!(target: "host", "Removed tick {}: {}", id, removed);
        removed
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }
}

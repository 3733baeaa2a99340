use crafthammer_host::{LocalHost, ServerCommand};
use crafthammer_shared::{ModuleError, ModuleSet};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Error while running modules
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// Input fed to a running [`HostRunner`]
#[derive(Debug, Clone)]
pub enum HostInput {
    /// Command received from the remote peer
    ServerCommand(ServerCommand),
    /// Pause or resume module updates; host ticks keep firing either way
    Pause(bool),
    Shutdown,
}

/// Drives a [`LocalHost`] and its modules from a tokio interval
///
/// Everything runs on the current thread: the host and modules are `!Send`,
/// so `run` must be awaited directly (e.g. from a current-thread runtime or
/// a `LocalSet`), never spawned.
pub struct HostRunner {
    host: Rc<LocalHost>,
    modules: ModuleSet,
    input_rx: UnboundedReceiver<HostInput>,
    tick_interval: Duration,
    paused: bool,
}

impl HostRunner {
    pub fn new(
        host: Rc<LocalHost>,
        modules: ModuleSet,
        input_rx: UnboundedReceiver<HostInput>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            host,
            modules,
            input_rx,
            tick_interval,
            paused: false,
        }
    }

    pub fn host(&self) -> &Rc<LocalHost> {
        &self.host
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Handshake, load and start every module
    pub fn start(&mut self) -> Result<(), RunnerError> {
        self.modules.handshake_all();
        self.modules.load_all()?;
        self.modules.start_all()?;
        info!(target: "runner", "Started {} module(s): {:?}", self.modules.len(), self.modules.ids());
        Ok(())
    }

    /// One host tick, plus a module update unless paused
    pub fn step(&mut self) -> Result<(), RunnerError> {
        self.host.tick();
        if !self.paused {
            self.modules.update_all()?;
        }
        Ok(())
    }

    /// Apply one input; returns `false` when the runner should stop
    pub fn handle_input(&mut self, input: HostInput) -> bool {
        match input {
            HostInput::ServerCommand(command) => {
                let invoked = self.host.deliver_server_command(
                    &command.module,
                    &command.command,
                    &command.result,
                );
                debug!(
                    target: "runner",
                    "Server command {}/{} delivered to {} listener(s)",
                    command.module,
                    command.command,
                    invoked
                );
                true
            }
            HostInput::Pause(paused) => {
                if self.paused != paused {
                    info!(target: "runner", "{}", if paused { "Paused" } else { "Resumed" });
                }
                self.paused = paused;
                true
            }
            HostInput::Shutdown => false,
        }
    }

    /// Run until `Shutdown` arrives or every input sender is dropped
    ///
    /// Modules are stopped and unloaded on the way out and handed back. If a
    /// lifecycle call fails, whatever is running is still shut down before
    /// the error is returned.
    pub async fn run(mut self) -> Result<ModuleSet, RunnerError> {
        if let Err(err) = self.start() {
            return Err(self.abort(err));
        }

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.step() {
                        return Err(self.abort(err));
                    }
                }
                input = self.input_rx.recv() => {
                    let keep_running = match input {
                        Some(input) => self.handle_input(input),
                        None => {
                            debug!(target: "runner", "Input channel closed");
                            false
                        }
                    };
                    if !keep_running {
                        break;
                    }
                }
            }
        }

        info!(target: "runner", "Shutting down after {} tick(s)", self.host.tick_count());
        self.modules.shutdown()?;
        Ok(self.modules)
    }

    /// Best-effort shutdown after a failure; `err` is what the caller sees
    fn abort(&mut self, err: RunnerError) -> RunnerError {
        warn!(target: "runner", "Stopping modules after error: {}", err);
        if let Err(shutdown_err) = self.modules.shutdown() {
            warn!(target: "runner", "Shutdown after error failed too: {}", shutdown_err);
        }
        err
    }
}

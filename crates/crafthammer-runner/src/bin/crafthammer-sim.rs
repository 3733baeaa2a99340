use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crafthammer_host::{ClientCommand, LocalHost, ServerCommand};
use crafthammer_runner::{CrafthammerConfig, HostInput, HostRunner, init_logging};
use crafthammer_shared::{Module, ModuleContext, ModuleHooks, ModuleProperties, ModuleSet, Request};

#[derive(Parser)]
#[command(version, about = "Run crafthammer modules against a loopback peer", long_about = None)]
struct Cli {
    /// Config file (default: platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to run before shutting down
    #[arg(long, default_value_t = 5)]
    duration_secs: u64,

    /// Command the loopback peer never answers (repeatable)
    #[arg(long = "drop")]
    drop_commands: Vec<String>,

    /// Override the loopback response delay in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

/// Sends a `ping` on start and then every `every` updates while no ping is
/// outstanding
struct PingHooks {
    timeout: Duration,
    every: u32,
    updates: u32,
    sequence: u64,
    outstanding: Option<Request>,
    replies: Rc<Cell<u32>>,
    timeouts: Rc<Cell<u32>>,
}

impl PingHooks {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            every: 10,
            updates: 0,
            sequence: 0,
            outstanding: None,
            replies: Rc::new(Cell::new(0)),
            timeouts: Rc::new(Cell::new(0)),
        }
    }

    fn ping(&mut self, ctx: &ModuleContext<'_>) {
        self.sequence += 1;
        let replies = Rc::clone(&self.replies);
        let timeouts = Rc::clone(&self.timeouts);

        let request = ctx.send_request(
            "ping",
            vec![json!(self.sequence)],
            self.timeout,
            move |result, request| {
                replies.set(replies.get() + 1);
                info!(
                    target: "sim",
                    "pong {} after {:?}",
                    result,
                    request.elapsed().unwrap_or_default()
                );
            },
            move |err, _| {
                timeouts.set(timeouts.get() + 1);
                warn!(target: "sim", "{}", err);
            },
        );
        request.send();
        self.outstanding = Some(request);
    }
}

impl ModuleHooks for PingHooks {
    fn on_start(&mut self, ctx: &ModuleContext<'_>) {
        self.ping(ctx);
    }

    fn on_update(&mut self, ctx: &ModuleContext<'_>) {
        self.updates += 1;
        let busy = self.outstanding.as_ref().is_some_and(Request::is_pending);
        if !busy && self.updates % self.every == 0 {
            self.ping(ctx);
        }
    }

    fn on_stop(&mut self, _ctx: &ModuleContext<'_>) {
        if let Some(request) = self.outstanding.take() {
            request.cancel();
        }
    }

    fn on_unload(&mut self, ctx: &ModuleContext<'_>) {
        info!(
            target: "sim",
            "{}: {} ping(s), {} repl(ies), {} timeout(s)",
            ctx.properties().id,
            self.sequence,
            self.replies.get(),
            self.timeouts.get()
        );
    }
}

/// Echo every outbound command back after `delay`, except dropped ones
async fn loopback_peer(
    mut outbound_rx: UnboundedReceiver<ClientCommand>,
    input_tx: UnboundedSender<HostInput>,
    delay: Duration,
    drop_commands: Vec<String>,
) {
    while let Some(command) = outbound_rx.recv().await {
        if drop_commands.contains(&command.command) {
            debug!(target: "sim", "Dropping {}/{}", command.module, command.command);
            continue;
        }

        let input_tx = input_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reply = ServerCommand::new(
                command.module,
                command.command,
                json!({ "echo": command.args }),
            );
            let _ = input_tx.send(HostInput::ServerCommand(reply));
        });
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CrafthammerConfig::load_from(path)?,
        None => CrafthammerConfig::load()?,
    };
    config.sim.drop_commands.extend(cli.drop_commands);
    if let Some(delay_ms) = cli.delay_ms {
        config.sim.response_delay_ms = delay_ms;
    }

    let _guard = init_logging("sim", &config.logging)?;

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let host = Rc::new(LocalHost::new().with_outbound(outbound_tx));

    let mut modules = ModuleSet::new();
    modules.add(Module::new(
        ModuleProperties::new("ping", "Ping", env!("CARGO_PKG_VERSION")),
        host.clone(),
        PingHooks::new(config.request_timeout()),
    ))?;

    tokio::spawn(loopback_peer(
        outbound_rx,
        input_tx.clone(),
        config.response_delay(),
        config.sim.drop_commands.clone(),
    ));

    let shutdown_tx = input_tx.clone();
    let duration = Duration::from_secs(cli.duration_secs);
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        let _ = shutdown_tx.send(HostInput::Shutdown);
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = input_tx.send(HostInput::Shutdown);
        }
    });

    info!(
        "Running for {:?} (tick {:?}, timeout {:?})",
        duration,
        config.tick_interval(),
        config.request_timeout()
    );

    let runner = HostRunner::new(host, modules, input_rx, config.tick_interval());
    runner.run().await?;

    Ok(())
}

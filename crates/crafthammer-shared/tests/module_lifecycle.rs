// Module lifecycle guards and module-scoped requests

use crafthammer_host::{Host, LocalHost, ManualClock};
use crafthammer_shared::{
    Module, ModuleContext, ModuleError, ModuleHooks, ModuleProperties, Request, RequestState,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Default)]
struct Counters {
    load: u32,
    start: u32,
    update: u32,
    stop: u32,
    unload: u32,
}

impl ModuleHooks for Counters {
    fn on_load(&mut self, _ctx: &ModuleContext<'_>) {
        self.load += 1;
    }
    fn on_start(&mut self, _ctx: &ModuleContext<'_>) {
        self.start += 1;
    }
    fn on_update(&mut self, _ctx: &ModuleContext<'_>) {
        self.update += 1;
    }
    fn on_stop(&mut self, _ctx: &ModuleContext<'_>) {
        self.stop += 1;
    }
    fn on_unload(&mut self, _ctx: &ModuleContext<'_>) {
        self.unload += 1;
    }
}

fn core_module() -> Module<Counters> {
    Module::new(
        ModuleProperties::new("core", "Core", "1.0.0"),
        Rc::new(LocalHost::new()),
        Counters::default(),
    )
}

#[test]
fn test_core_module_scenario() {
    let mut module = core_module();

    let err = module.start().unwrap_err();
    assert_eq!(
        err,
        ModuleError::NotLoaded {
            id: "core".to_string()
        }
    );
    assert!(err.to_string().contains("core"));

    module.load().unwrap();
    module.start().unwrap();
    module.update().unwrap();

    let err = module.unload().unwrap_err();
    assert_eq!(
        err,
        ModuleError::StillRunning {
            id: "core".to_string()
        }
    );
    assert_eq!(module.hooks().unload, 0);
    assert!(module.is_loaded());
    assert!(module.is_started());
}

#[test]
fn test_double_load_does_not_rerun_hook() {
    let mut module = core_module();
    module.load().unwrap();

    assert_eq!(
        module.load(),
        Err(ModuleError::AlreadyLoaded {
            id: "core".to_string()
        })
    );
    assert_eq!(module.hooks().load, 1);
}

#[test]
fn test_restart_after_stop() {
    let mut module = core_module();
    module.load().unwrap();
    module.start().unwrap();
    module.stop().unwrap();
    module.start().unwrap();

    assert_eq!(module.hooks().start, 2);
    assert_eq!(module.hooks().stop, 1);
    assert!(module.is_started());
}

#[test]
fn test_update_after_stop_fails() {
    let mut module = core_module();
    module.load().unwrap();
    module.start().unwrap();
    module.stop().unwrap();

    assert_eq!(
        module.update(),
        Err(ModuleError::NotStarted {
            id: "core".to_string()
        })
    );
    assert_eq!(module.hooks().update, 0);
}

/// Asks the peer for its inventory when started
struct InventoryHooks {
    result: Rc<RefCell<Option<serde_json::Value>>>,
    pending: Option<Request>,
}

impl ModuleHooks for InventoryHooks {
    fn on_start(&mut self, ctx: &ModuleContext<'_>) {
        let slot = Rc::clone(&self.result);
        let request = ctx.send_request(
            "get",
            vec![json!("backpack")],
            Duration::from_millis(100),
            move |result, _| *slot.borrow_mut() = Some(result.clone()),
            |_, _| {},
        );
        request.send();
        self.pending = Some(request);
    }

    fn on_stop(&mut self, _ctx: &ModuleContext<'_>) {
        if let Some(request) = self.pending.take() {
            request.cancel();
        }
    }
}

#[test]
fn test_module_requests_use_module_namespace() {
    let clock = Rc::new(ManualClock::new());
    let host = Rc::new(LocalHost::with_clock(clock.clone()));
    let result = Rc::new(RefCell::new(None));

    let mut module = Module::new(
        ModuleProperties::new("inv", "Inventory", "0.3.0"),
        host.clone(),
        InventoryHooks {
            result: Rc::clone(&result),
            pending: None,
        },
    );
    module.load().unwrap();
    module.start().unwrap();

    let sent = host.sent_commands();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].module, "crafthammer.module.inv");
    assert_eq!(sent[0].command, "get");
    assert_eq!(sent[0].args, vec![json!("backpack")]);

    // A response under the bare id does not match
    host.deliver_server_command("inv", "get", &json!(["rope"]));
    assert!(result.borrow().is_none());

    host.deliver_server_command("crafthammer.module.inv", "get", &json!(["rope"]));
    assert_eq!(*result.borrow(), Some(json!(["rope"])));
}

#[test]
fn test_stop_hook_can_cancel_outstanding_request() {
    let host = Rc::new(LocalHost::new());
    let mut module = Module::new(
        ModuleProperties::new("inv", "Inventory", "0.3.0"),
        host.clone(),
        InventoryHooks {
            result: Rc::new(RefCell::new(None)),
            pending: None,
        },
    );
    module.load().unwrap();
    module.start().unwrap();
    assert_eq!(host.tick_listener_count(), 1);

    module.stop().unwrap();
    assert_eq!(host.tick_listener_count(), 0);
    assert_eq!(host.server_command_listener_count(), 0);
}

#[test]
fn test_send_request_does_not_transmit() {
    let host = Rc::new(LocalHost::new());
    let module = Module::new(
        ModuleProperties::new("inv", "Inventory", "0.3.0"),
        host.clone(),
        (),
    );

    let request = module.send_request(
        "get",
        vec![],
        Duration::from_millis(100),
        |_, _| {},
        |_, _| {},
    );

    assert_eq!(request.state(), RequestState::Unsent);
    assert_eq!(request.module(), "crafthammer.module.inv");
    assert!(host.sent_commands().is_empty());

    request.send();
    assert_eq!(host.sent_commands().len(), 1);
}

#[test]
fn test_context_exposes_host_and_flags() {
    struct Probe {
        seen: Vec<(bool, bool, bool)>,
    }

    impl ModuleHooks for Probe {
        fn on_handshake(&mut self, ctx: &ModuleContext<'_>) {
            self.seen
                .push((ctx.is_loaded(), ctx.is_started(), ctx.is_handshaked()));
        }
        fn on_start(&mut self, ctx: &ModuleContext<'_>) {
            self.seen
                .push((ctx.is_loaded(), ctx.is_started(), ctx.is_handshaked()));
            ctx.host().dispatch_command(&ctx.properties().namespace(), "hello", &[]);
        }
    }

    let host = Rc::new(LocalHost::new());
    let mut module = Module::new(
        ModuleProperties::new("probe", "Probe", "0.0.1"),
        host.clone(),
        Probe { seen: Vec::new() },
    );
    module.handshake();
    module.load().unwrap();
    module.start().unwrap();

    assert_eq!(
        module.hooks().seen,
        vec![(false, false, false), (true, false, true)]
    );
    assert_eq!(host.sent_commands()[0].command, "hello");
}

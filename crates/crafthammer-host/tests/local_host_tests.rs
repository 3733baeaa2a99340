// Integration tests for the in-process host

use crafthammer_host::{Host, LocalHost, ServerCommand};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_server_commands_reach_every_listener() {
    let host = LocalHost::new();
    let seen: Rc<RefCell<Vec<(String, String, Value)>>> = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..2 {
        let seen = Rc::clone(&seen);
        host.add_server_command_listener(Rc::new(move |module, command, result| {
            seen.borrow_mut()
                .push((module.to_string(), command.to_string(), result.clone()));
        }));
    }

    let incoming = ServerCommand::new("inv", "get", json!({"items": [1, 2]}));
    let invoked = host.deliver_server_command(&incoming.module, &incoming.command, &incoming.result);

    assert_eq!(invoked, 2);
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, "inv");
    assert_eq!(seen[1].2, json!({"items": [1, 2]}));
}

#[test]
fn test_removed_listener_receives_nothing() {
    let host = LocalHost::new();
    let calls = Rc::new(RefCell::new(0));

    let counter = Rc::clone(&calls);
    let id = host.add_server_command_listener(Rc::new(move |_, _, _| {
        *counter.borrow_mut() += 1;
    }));

    assert!(host.remove_server_command_listener(id));
    assert_eq!(host.deliver_server_command("inv", "get", &Value::Null), 0);
    assert_eq!(*calls.borrow(), 0);
    assert_eq!(host.server_command_listener_count(), 0);
}

#[test]
fn test_listener_can_dispatch_while_being_notified() {
    let host = Rc::new(LocalHost::new());

    let host_ref = Rc::downgrade(&host);
    host.add_server_command_listener(Rc::new(move |module, command, _| {
        if let Some(host) = host_ref.upgrade() {
            host.dispatch_command(module, &format!("{command}_ack"), &[]);
        }
    }));

    host.deliver_server_command("inv", "get", &Value::Null);

    let sent = host.sent_commands();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command, "get_ack");
}

#[test]
fn test_ticks_are_counted() {
    let host = LocalHost::new();
    assert_eq!(host.tick(), 0);
    assert_eq!(host.tick(), 0);
    assert_eq!(host.tick_count(), 2);
}

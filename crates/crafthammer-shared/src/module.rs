use crafthammer_host::Host;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ModuleError, RequestError};
use crate::request::{Request, RequestBuilder};

/// Namespace prefix for module-scoped commands
///
/// A module with id `inv` sends its commands as `crafthammer.module.inv`.
pub const MODULE_NAMESPACE: &str = "crafthammer.module";

/// Immutable identity of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleProperties {
    pub id: String,
    pub name: String,
    pub version: String,
}

impl ModuleProperties {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Command namespace for this module
    pub fn namespace(&self) -> String {
        format!("{}.{}", MODULE_NAMESPACE, self.id)
    }
}

impl fmt::Display for ModuleProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} v{})", self.name, self.id, self.version)
    }
}

/// Lifecycle hooks a module variant may override
///
/// Every hook defaults to doing nothing. Hooks run before the lifecycle flag
/// changes, so `ctx` reports the state the module is leaving.
pub trait ModuleHooks {
    fn on_handshake(&mut self, _ctx: &ModuleContext<'_>) {}
    fn on_load(&mut self, _ctx: &ModuleContext<'_>) {}
    fn on_start(&mut self, _ctx: &ModuleContext<'_>) {}
    fn on_update(&mut self, _ctx: &ModuleContext<'_>) {}
    fn on_stop(&mut self, _ctx: &ModuleContext<'_>) {}
    fn on_unload(&mut self, _ctx: &ModuleContext<'_>) {}
}

/// A module with no behavior of its own
impl ModuleHooks for () {}

/// View of the owning module handed to every hook
pub struct ModuleContext<'a> {
    properties: &'a ModuleProperties,
    host: &'a Rc<dyn Host>,
    loaded: bool,
    started: bool,
    handshaked: bool,
}

impl<'a> ModuleContext<'a> {
    pub fn properties(&self) -> &ModuleProperties {
        self.properties
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        self.host
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_handshaked(&self) -> bool {
        self.handshaked
    }

    /// Builder for a request in this module's namespace
    pub fn request(&self, command: impl Into<String>) -> RequestBuilder {
        Request::builder(Rc::clone(self.host), self.properties.namespace(), command)
    }

    /// Build a module-scoped request
    ///
    /// The request is returned unsent; call [`Request::send`] to transmit it.
    #[must_use = "the request is not transmitted until send() is called"]
    pub fn send_request<S, E>(
        &self,
        command: impl Into<String>,
        args: Vec<Value>,
        timeout: Duration,
        on_success: S,
        on_error: E,
    ) -> Request
    where
        S: FnOnce(&Value, &Request) + 'static,
        E: FnOnce(RequestError, &Request) + 'static,
    {
        self.request(command)
            .args(args)
            .timeout(timeout)
            .on_success(on_success)
            .on_error(on_error)
            .build()
    }
}

/// Lifecycle-managed unit of functionality
///
/// Transitions are guarded: an illegal call returns a [`ModuleError`] naming
/// this module and leaves both the flags and the hooks untouched.
pub struct Module<H> {
    properties: ModuleProperties,
    host: Rc<dyn Host>,
    hooks: H,
    loaded: bool,
    started: bool,
    handshaked: bool,
}

impl<H: ModuleHooks> Module<H> {
    pub fn new(properties: ModuleProperties, host: Rc<dyn Host>, hooks: H) -> Self {
        Self {
            properties,
            host,
            hooks,
            loaded: false,
            started: false,
            handshaked: false,
        }
    }

    pub fn properties(&self) -> &ModuleProperties {
        &self.properties
    }

    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_handshaked(&self) -> bool {
        self.handshaked
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Build a module-scoped request; see [`ModuleContext::send_request`]
    #[must_use = "the request is not transmitted until send() is called"]
    pub fn send_request<S, E>(
        &self,
        command: impl Into<String>,
        args: Vec<Value>,
        timeout: Duration,
        on_success: S,
        on_error: E,
    ) -> Request
    where
        S: FnOnce(&Value, &Request) + 'static,
        E: FnOnce(RequestError, &Request) + 'static,
    {
        self.context()
            .send_request(command, args, timeout, on_success, on_error)
    }

    pub fn handshake(&mut self) {
        self.run_hook(|hooks, ctx| hooks.on_handshake(ctx));
        self.handshaked = true;
        debug!(target: "module", "Handshaked {}", self.properties.id);
    }

    pub fn load(&mut self) -> Result<(), ModuleError> {
        if self.loaded {
            return Err(self.reject(ModuleError::AlreadyLoaded { id: self.id_owned() }));
        }

        self.run_hook(|hooks, ctx| hooks.on_load(ctx));
        self.loaded = true;
        debug!(target: "module", "Loaded {}", self.properties);
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), ModuleError> {
        if !self.loaded {
            return Err(self.reject(ModuleError::NotLoaded { id: self.id_owned() }));
        } else if self.started {
            return Err(self.reject(ModuleError::AlreadyStarted { id: self.id_owned() }));
        }

        self.run_hook(|hooks, ctx| hooks.on_start(ctx));
        self.started = true;
        debug!(target: "module", "Started {}", self.properties.id);
        Ok(())
    }

    pub fn update(&mut self) -> Result<(), ModuleError> {
        self.require_running()?;

        self.run_hook(|hooks, ctx| hooks.on_update(ctx));
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ModuleError> {
        self.require_running()?;

        self.run_hook(|hooks, ctx| hooks.on_stop(ctx));
        self.started = false;
        debug!(target: "module", "Stopped {}", self.properties.id);
        Ok(())
    }

    pub fn unload(&mut self) -> Result<(), ModuleError> {
        if !self.loaded {
            return Err(self.reject(ModuleError::NotLoaded { id: self.id_owned() }));
        } else if self.started {
            return Err(self.reject(ModuleError::StillRunning { id: self.id_owned() }));
        }

        self.run_hook(|hooks, ctx| hooks.on_unload(ctx));
        self.loaded = false;
        debug!(target: "module", "Unloaded {}", self.properties.id);
        Ok(())
    }

    fn require_running(&self) -> Result<(), ModuleError> {
        if !self.loaded {
            Err(self.reject(ModuleError::NotLoaded { id: self.id_owned() }))
        } else if !self.started {
            Err(self.reject(ModuleError::NotStarted { id: self.id_owned() }))
        } else {
            Ok(())
        }
    }

    fn reject(&self, err: ModuleError) -> ModuleError {
        warn!(target: "module", "{}", err);
        err
    }

    fn id_owned(&self) -> String {
        self.properties.id.clone()
    }

    /// Invoke a hook with a context describing the current state
    fn run_hook(&mut self, hook: impl FnOnce(&mut H, &ModuleContext<'_>)) {
        let ctx = ModuleContext {
            properties: &self.properties,
            host: &self.host,
            loaded: self.loaded,
            started: self.started,
            handshaked: self.handshaked,
        };
        hook(&mut self.hooks, &ctx);
    }

    fn context(&self) -> ModuleContext<'_> {
        ModuleContext {
            properties: &self.properties,
            host: &self.host,
            loaded: self.loaded,
            started: self.started,
            handshaked: self.handshaked,
        }
    }
}

impl<H> fmt::Debug for Module<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("properties", &self.properties)
            .field("loaded", &self.loaded)
            .field("started", &self.started)
            .field("handshaked", &self.handshaked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crafthammer_host::LocalHost;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        seen_loaded_in_on_load: Option<bool>,
    }

    impl ModuleHooks for Recorder {
        fn on_handshake(&mut self, _ctx: &ModuleContext<'_>) {
            self.calls.push("handshake");
        }
        fn on_load(&mut self, ctx: &ModuleContext<'_>) {
            self.seen_loaded_in_on_load = Some(ctx.is_loaded());
            self.calls.push("load");
        }
        fn on_start(&mut self, _ctx: &ModuleContext<'_>) {
            self.calls.push("start");
        }
        fn on_update(&mut self, _ctx: &ModuleContext<'_>) {
            self.calls.push("update");
        }
        fn on_stop(&mut self, _ctx: &ModuleContext<'_>) {
            self.calls.push("stop");
        }
        fn on_unload(&mut self, _ctx: &ModuleContext<'_>) {
            self.calls.push("unload");
        }
    }

    fn module() -> Module<Recorder> {
        Module::new(
            ModuleProperties::new("core", "Core", "1.0.0"),
            Rc::new(LocalHost::new()),
            Recorder::default(),
        )
    }

    #[test]
    fn test_namespace() {
        let props = ModuleProperties::new("inv", "Inventory", "0.2.0");
        assert_eq!(props.namespace(), "crafthammer.module.inv");
        assert_eq!(props.to_string(), "Inventory (inv v0.2.0)");
    }

    #[test]
    fn test_full_lifecycle_calls_hooks_in_order() {
        let mut module = module();
        module.handshake();
        module.load().unwrap();
        module.start().unwrap();
        module.update().unwrap();
        module.stop().unwrap();
        module.unload().unwrap();

        assert_eq!(
            module.hooks().calls,
            vec!["handshake", "load", "start", "update", "stop", "unload"]
        );
        assert!(module.is_handshaked());
        assert!(!module.is_loaded());
        assert!(!module.is_started());
    }

    #[test]
    fn test_hook_sees_pre_transition_state() {
        let mut module = module();
        module.load().unwrap();
        assert_eq!(module.hooks().seen_loaded_in_on_load, Some(false));
    }

    #[test]
    fn test_handshake_has_no_guard() {
        let mut module = module();
        module.handshake();
        module.handshake();
        assert_eq!(module.hooks().calls, vec!["handshake", "handshake"]);
    }

    #[test]
    fn test_stop_requires_started() {
        let mut module = module();
        assert_eq!(
            module.stop(),
            Err(ModuleError::NotLoaded {
                id: "core".to_string()
            })
        );
        module.load().unwrap();
        assert_eq!(
            module.stop(),
            Err(ModuleError::NotStarted {
                id: "core".to_string()
            })
        );
        assert_eq!(module.hooks().calls, vec!["load"]);
    }

    #[test]
    fn test_update_requires_started() {
        let mut module = module();
        module.load().unwrap();
        assert!(matches!(module.update(), Err(ModuleError::NotStarted { .. })));
        assert!(!module.hooks().calls.contains(&"update"));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut module = module();
        module.load().unwrap();
        module.start().unwrap();
        assert_eq!(
            module.start(),
            Err(ModuleError::AlreadyStarted {
                id: "core".to_string()
            })
        );
        assert_eq!(module.hooks().calls, vec!["load", "start"]);
    }

    #[test]
    fn test_unload_without_load_fails() {
        let mut module = module();
        assert!(matches!(module.unload(), Err(ModuleError::NotLoaded { .. })));
        assert!(module.hooks().calls.is_empty());
    }

    #[test]
    fn test_reload_after_unload() {
        let mut module = module();
        module.load().unwrap();
        module.unload().unwrap();
        module.load().unwrap();
        assert!(module.is_loaded());
        assert_eq!(module.hooks().calls, vec!["load", "unload", "load"]);
    }
}

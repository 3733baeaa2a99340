use tracing::{debug, info};

use crate::error::ModuleError;
use crate::module::{Module, ModuleHooks, ModuleProperties};

/// Object-safe view of a module's lifecycle
///
/// Lets modules with different hook types live in one [`ModuleSet`].
pub trait Lifecycle {
    fn properties(&self) -> &ModuleProperties;
    fn is_loaded(&self) -> bool;
    fn is_started(&self) -> bool;
    fn is_handshaked(&self) -> bool;
    fn handshake(&mut self);
    fn load(&mut self) -> Result<(), ModuleError>;
    fn start(&mut self) -> Result<(), ModuleError>;
    fn update(&mut self) -> Result<(), ModuleError>;
    fn stop(&mut self) -> Result<(), ModuleError>;
    fn unload(&mut self) -> Result<(), ModuleError>;
}

impl<H: ModuleHooks> Lifecycle for Module<H> {
    fn properties(&self) -> &ModuleProperties {
        Module::properties(self)
    }

    fn is_loaded(&self) -> bool {
        Module::is_loaded(self)
    }

    fn is_started(&self) -> bool {
        Module::is_started(self)
    }

    fn is_handshaked(&self) -> bool {
        Module::is_handshaked(self)
    }

    fn handshake(&mut self) {
        Module::handshake(self)
    }

    fn load(&mut self) -> Result<(), ModuleError> {
        Module::load(self)
    }

    fn start(&mut self) -> Result<(), ModuleError> {
        Module::start(self)
    }

    fn update(&mut self) -> Result<(), ModuleError> {
        Module::update(self)
    }

    fn stop(&mut self) -> Result<(), ModuleError> {
        Module::stop(self)
    }

    fn unload(&mut self) -> Result<(), ModuleError> {
        Module::unload(self)
    }
}

/// Ordered collection of modules driven together
///
/// Bulk operations visit modules in registration order and stop at the first
/// error, which is returned unchanged.
#[derive(Default)]
pub struct ModuleSet {
    modules: Vec<Box<dyn Lifecycle>>,
}

impl ModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; ids must be unique
    pub fn add(&mut self, module: impl Lifecycle + 'static) -> Result<(), ModuleError> {
        let id = &module.properties().id;
        if self.get(id).is_some() {
            return Err(ModuleError::Duplicate { id: id.clone() });
        }
        debug!(target: "module", "Registered module {}", module.properties());
        self.modules.push(Box::new(module));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Ids in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.modules
            .iter()
            .map(|m| m.properties().id.as_str())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&dyn Lifecycle> {
        self.modules
            .iter()
            .find(|m| m.properties().id == id)
            .map(|m| &**m)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut (dyn Lifecycle + 'static)> {
        self.modules
            .iter_mut()
            .find(|m| m.properties().id == id)
            .map(|m| &mut **m)
    }

    pub fn handshake_all(&mut self) {
        for module in &mut self.modules {
            module.handshake();
        }
    }

    pub fn load_all(&mut self) -> Result<(), ModuleError> {
        for module in &mut self.modules {
            module.load()?;
        }
        info!(target: "module", "Loaded {} module(s)", self.modules.len());
        Ok(())
    }

    pub fn start_all(&mut self) -> Result<(), ModuleError> {
        for module in &mut self.modules {
            module.start()?;
        }
        Ok(())
    }

    /// Update every started module; stopped modules are skipped
    pub fn update_all(&mut self) -> Result<(), ModuleError> {
        for module in self.modules.iter_mut().filter(|m| m.is_started()) {
            module.update()?;
        }
        Ok(())
    }

    /// Stop every started module
    pub fn stop_all(&mut self) -> Result<(), ModuleError> {
        for module in self.modules.iter_mut().filter(|m| m.is_started()) {
            module.stop()?;
        }
        Ok(())
    }

    /// Unload every loaded module
    pub fn unload_all(&mut self) -> Result<(), ModuleError> {
        for module in self.modules.iter_mut().filter(|m| m.is_loaded()) {
            module.unload()?;
        }
        Ok(())
    }

    /// Stop, then unload, everything still running
    pub fn shutdown(&mut self) -> Result<(), ModuleError> {
        self.stop_all()?;
        self.unload_all()?;
        info!(target: "module", "Shut down {} module(s)", self.modules.len());
        Ok(())
    }
}

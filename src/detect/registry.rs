use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::Detection;
use crate::frame::Frame;

use super::backend::DetectorBackend;

/// Handle to a loaded backend, shareable between the registry and a loop.
pub type SharedBackend = Arc<Mutex<dyn DetectorBackend>>;

/// Registry of loaded detector backends, keyed by backend name.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run warm-up on every registered backend.
    pub fn warm_up_all(&self) -> Result<()> {
        for (name, backend) in &self.backends {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?;
            guard.warm_up()?;
        }
        Ok(())
    }

    /// Run detection with the default backend.
    pub fn detect_default(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let backend = self
            .default_backend()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.detect(frame)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ScriptedBackend, StubBackend};

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 4 * 4 * 3], 4, 4, 1).unwrap()
    }

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register(ScriptedBackend::new());
        registry.register(StubBackend::with_seed(1));

        let default = registry.default_backend().expect("default backend");
        assert_eq!(default.lock().unwrap().name(), "scripted");
        assert_eq!(registry.list(), vec!["scripted", "stub"]);
    }

    #[test]
    fn set_default_requires_registration() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::with_seed(1));
        assert!(registry.set_default("tract").is_err());
        assert!(registry.set_default("stub").is_ok());
    }

    #[test]
    fn detect_default_without_backends_fails() {
        let registry = BackendRegistry::new();
        assert!(registry.detect_default(&frame()).is_err());
    }

    #[test]
    fn detect_default_uses_default_backend() {
        let mut registry = BackendRegistry::new();
        registry.register(ScriptedBackend::new().then_fail("model exploded"));
        let err = registry.detect_default(&frame()).unwrap_err();
        assert!(err.to_string().contains("model exploded"));
    }
}

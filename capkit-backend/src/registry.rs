//! Backend registry for dynamic driver registration and lookup
//!
//! Drivers register a [`BackendDescriptor`] under their [`BackendType`] tag;
//! sessions look the descriptor up by tag and instantiate it. The registry
//! owns descriptors, never backend instances.

use std::collections::HashMap;
use std::sync::Arc;

use capkit_core::{BackendType, Error, Result};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::descriptor::BackendDescriptor;

#[derive(Default)]
struct Entries {
    by_type: HashMap<BackendType, Arc<BackendDescriptor>>,
    /// Registration order
    order: Vec<BackendType>,
}

/// Thread-safe registry of backend descriptors
///
/// `register`, `unregister` and `get` may be called concurrently; a single
/// `RwLock` guards the map and the registration order together.
pub struct BackendRegistry {
    entries: RwLock<Entries>,
}

impl BackendRegistry {
    /// Create a new empty backend registry
    pub fn new() -> Self {
        debug!("Creating new BackendRegistry");
        Self {
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Register a backend descriptor
    ///
    /// Returns `AlreadyRegistered` if the type tag is taken.
    pub fn register(&self, descriptor: BackendDescriptor) -> Result<Arc<BackendDescriptor>> {
        let kind = descriptor.kind().clone();

        let mut entries = self.entries.write();
        if entries.by_type.contains_key(&kind) {
            warn!(backend = %kind, "Backend already registered");
            return Err(Error::AlreadyRegistered(kind.to_string()));
        }

        let descriptor = Arc::new(descriptor);
        entries.by_type.insert(kind.clone(), Arc::clone(&descriptor));
        entries.order.push(kind.clone());

        info!(
            backend = %kind,
            name = descriptor.name(),
            version = descriptor.version(),
            "Backend registered"
        );
        Ok(descriptor)
    }

    /// Unregister a backend by type tag
    pub fn unregister(&self, kind: &BackendType) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.by_type.remove(kind).is_none() {
            warn!(backend = %kind, "Backend not found");
            return Err(Error::NotFound(kind.to_string()));
        }
        entries.order.retain(|k| k != kind);

        info!(backend = %kind, "Backend unregistered");
        Ok(())
    }

    /// Look up a backend descriptor by type tag
    pub fn get(&self, kind: &BackendType) -> Result<Arc<BackendDescriptor>> {
        self.entries
            .read()
            .by_type
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::NotFound(kind.to_string()))
    }

    /// All descriptors, in registration order
    pub fn list(&self) -> Vec<Arc<BackendDescriptor>> {
        let entries = self.entries.read();
        entries
            .order
            .iter()
            .filter_map(|kind| entries.by_type.get(kind).cloned())
            .collect()
    }

    /// Get the number of registered backends
    pub fn count(&self) -> usize {
        self.entries.read().by_type.len()
    }

    /// Check if a backend is registered
    pub fn contains(&self, kind: &BackendType) -> bool {
        self.entries.read().by_type.contains_key(kind)
    }

    /// Remove every descriptor
    pub fn clear(&self) {
        info!("Clearing all registered backends");
        let mut entries = self.entries.write();
        entries.by_type.clear();
        entries.order.clear();
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide backend registry
///
/// Created lazily on first use. `reset()` is the explicit teardown; it only
/// drops descriptors, sessions already holding one keep it alive.
pub struct GlobalRegistry;

impl GlobalRegistry {
    /// Get the global backend registry instance
    pub fn instance() -> &'static BackendRegistry {
        static INSTANCE: std::sync::OnceLock<BackendRegistry> = std::sync::OnceLock::new();
        INSTANCE.get_or_init(BackendRegistry::new)
    }

    /// Register a backend with the global registry
    pub fn register(descriptor: BackendDescriptor) -> Result<Arc<BackendDescriptor>> {
        Self::instance().register(descriptor)
    }

    /// Unregister a backend from the global registry
    pub fn unregister(kind: &BackendType) -> Result<()> {
        Self::instance().unregister(kind)
    }

    /// Get a backend descriptor from the global registry
    pub fn get(kind: &BackendType) -> Result<Arc<BackendDescriptor>> {
        Self::instance().get(kind)
    }

    /// List all backends in the global registry
    pub fn list() -> Vec<Arc<BackendDescriptor>> {
        Self::instance().list()
    }

    /// Drop every globally registered backend
    pub fn reset() {
        Self::instance().clear()
    }
}

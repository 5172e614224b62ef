//! Registered backend metadata and instantiation

use std::fmt;
use std::sync::Arc;

use capkit_core::{BackendType, Result};

use crate::backend::{Backend, Capabilities};
use crate::sink::ErrorSink;

/// Creates backend instances for a descriptor
pub trait BackendFactory: Send + Sync {
    fn create(&self, errors: ErrorSink) -> Result<Box<dyn Backend>>;
}

impl<F> BackendFactory for F
where
    F: Fn(ErrorSink) -> Result<Box<dyn Backend>> + Send + Sync,
{
    fn create(&self, errors: ErrorSink) -> Result<Box<dyn Backend>> {
        self(errors)
    }
}

/// Immutable description of a backend, registered once
#[derive(Clone)]
pub struct BackendDescriptor {
    kind: BackendType,
    name: String,
    version: String,
    description: String,
    capabilities: Capabilities,
    factory: Arc<dyn BackendFactory>,
}

impl BackendDescriptor {
    /// Create a descriptor from a constructor closure; version defaults to
    /// "0.0.0" and capabilities to none
    pub fn new<S, F>(kind: BackendType, name: S, factory: F) -> Self
    where
        S: Into<String>,
        F: Fn(ErrorSink) -> Result<Box<dyn Backend>> + Send + Sync + 'static,
    {
        Self::from_factory(kind, name, Arc::new(factory))
    }

    /// Create a descriptor around an existing factory
    pub fn from_factory<S: Into<String>>(
        kind: BackendType,
        name: S,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            version: "0.0.0".to_string(),
            description: String::new(),
            capabilities: Capabilities::empty(),
            factory,
        }
    }

    /// Set the driver version string
    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = version.into();
        self
    }

    /// Set the human readable description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Set the capability mask
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Backend type this descriptor registers
    pub fn kind(&self) -> &BackendType {
        &self.kind
    }

    /// Driver name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver version
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// True if every bit of `capability` is set
    pub fn supports(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    /// Look up a capability by feature name (e.g. "pause")
    pub fn is_feature_supported(&self, feature: &str) -> bool {
        self.capabilities.supports_feature(feature)
    }

    /// Create a fresh backend instance
    pub fn instantiate(&self, errors: ErrorSink) -> Result<Box<dyn Backend>> {
        self.factory.create(errors.scoped(&self.name))
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

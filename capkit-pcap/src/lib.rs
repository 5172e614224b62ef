//! libpcap backend for capkit
//!
//! Registers a [`PcapBackend`] under [`BackendType::Pcap`]; sessions created
//! with the default backend type then capture through libpcap.
//!
//! ```no_run
//! use capkit_backend::GlobalRegistry;
//! use capkit_core::BackendType;
//!
//! fn main() -> capkit_core::Result<()> {
//!     capkit_pcap::register()?;
//!
//!     let descriptor = GlobalRegistry::get(&BackendType::Pcap)?;
//!     println!("{} {}", descriptor.name(), descriptor.version());
//!     Ok(())
//! }
//! ```

pub mod backend;

use std::sync::Arc;

use capkit_backend::{BackendDescriptor, BackendRegistry, GlobalRegistry};
use capkit_core::{BackendType, Result};

pub use backend::PcapBackend;

/// Descriptor for the libpcap driver
pub fn descriptor() -> BackendDescriptor {
    BackendDescriptor::new(BackendType::Pcap, backend::NAME, |errors| {
        Ok(Box::new(PcapBackend::new(errors)))
    })
    .with_version(env!("CARGO_PKG_VERSION"))
    .with_description(backend::DESCRIPTION)
    .with_capabilities(backend::capabilities())
}

/// Register the libpcap driver with the global registry
pub fn register() -> Result<Arc<BackendDescriptor>> {
    GlobalRegistry::register(descriptor())
}

/// Register the libpcap driver with a private registry
pub fn register_with(registry: &BackendRegistry) -> Result<Arc<BackendDescriptor>> {
    registry.register(descriptor())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capkit_backend::{Capabilities, ErrorSink};

    #[test]
    fn test_descriptor() {
        let registry = BackendRegistry::new();
        let descriptor = register_with(&registry).unwrap();

        assert_eq!(descriptor.kind(), &BackendType::Pcap);
        assert_eq!(descriptor.name(), "pcap");
        assert!(descriptor.supports(Capabilities::LIVE_FILTER));
        assert!(descriptor.is_feature_supported("pause"));
        assert!(!descriptor.is_feature_supported("hw-timestamps"));

        assert!(register_with(&registry).is_err());

        let backend = descriptor.instantiate(ErrorSink::new()).unwrap();
        assert_eq!(backend.name(), "pcap");
        assert_eq!(backend.capabilities(), descriptor.capabilities());
    }
}

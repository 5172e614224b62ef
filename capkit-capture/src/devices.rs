//! Device listing without an open session

use capkit_backend::{BackendRegistry, ErrorSink, GlobalRegistry};
use capkit_core::{BackendType, DeviceDescriptor, Error, Result};
use tracing::debug;

/// List the devices a backend type can capture on, via the global registry
pub fn list_devices(kind: &BackendType) -> Result<Vec<DeviceDescriptor>> {
    list_devices_with(GlobalRegistry::instance(), kind)
}

/// List devices through a transient instance of the backend
pub fn list_devices_with(
    registry: &BackendRegistry,
    kind: &BackendType,
) -> Result<Vec<DeviceDescriptor>> {
    let descriptor = registry.get(kind)?;
    let backend = descriptor.instantiate(ErrorSink::new())?;

    let result = backend.enumerate_devices().map_err(|e| match e {
        Error::Backend(msg) | Error::Internal(msg) => Error::GetDevicesFailed(msg),
        other => other,
    });
    backend.cleanup();

    let devices = result?;
    debug!(backend = %kind, count = devices.len(), "Listed devices");
    Ok(devices)
}

/// Devices of `kind` that are up and not loopback
pub fn list_capture_devices(kind: &BackendType) -> Result<Vec<DeviceDescriptor>> {
    Ok(list_devices(kind)?
        .into_iter()
        .filter(DeviceDescriptor::is_capture_capable)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capkit_backend::synthetic;
    use capkit_core::ErrorKind;

    #[test]
    fn test_list_synthetic_devices() {
        let registry = BackendRegistry::new();
        registry.register(synthetic::descriptor()).unwrap();

        let devices = list_devices_with(&registry, &BackendType::Synthetic).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, synthetic::DEVICE);
        assert!(devices[0].is_capture_capable());
    }

    #[test]
    fn test_list_unknown_backend() {
        let registry = BackendRegistry::new();
        let err = list_devices_with(&registry, &BackendType::Dpdk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_capture_devices_global() {
        // Another test may have registered it already
        let _ = synthetic::register();

        let devices = list_capture_devices(&BackendType::Synthetic).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, synthetic::DEVICE);
    }
}

//! Driver contract every capture backend implements

use bitflags::bitflags;
use capkit_core::{
    CaptureConfig, CaptureStats, DeviceDescriptor, Error, OptionValue, PacketRecord, Result,
};

bitflags! {
    /// Optional capabilities a backend may offer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// `pause()` / `resume()`
        const PAUSE = 0x0001;
        /// `set_filter()` while the capture loop runs
        const LIVE_FILTER = 0x0002;
        /// `set_filter()` before the capture loop runs
        const FILTER = 0x0004;
        /// `enumerate_devices()`
        const DEVICES = 0x0008;
        /// `set_option()` / `get_option()`
        const OPTIONS = 0x0010;
        /// Populates interface index / protocol / VLAN / hash metadata
        const PACKET_METADATA = 0x0020;
        /// Hardware timestamps
        const HW_TIMESTAMPS = 0x0040;
    }
}

impl Capabilities {
    /// Map a feature name to its capability bit
    pub fn from_feature(name: &str) -> Option<Capabilities> {
        let cap = match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pause" | "resume" | "pause-resume" => Capabilities::PAUSE,
            "live-filter" => Capabilities::LIVE_FILTER,
            "filter" | "bpf" => Capabilities::FILTER,
            "devices" | "enumerate-devices" => Capabilities::DEVICES,
            "options" => Capabilities::OPTIONS,
            "packet-metadata" | "metadata" => Capabilities::PACKET_METADATA,
            "hw-timestamps" | "hardware-timestamps" => Capabilities::HW_TIMESTAMPS,
            _ => return None,
        };
        Some(cap)
    }

    /// True if the named feature is part of this set
    pub fn supports_feature(self, name: &str) -> bool {
        Self::from_feature(name).map_or(false, |cap| self.contains(cap))
    }
}

/// Receiver of frames produced by a backend's capture loop
///
/// Returning `false` asks the backend to stop; it must not deliver another
/// frame afterwards and should return from `start()` promptly.
pub trait PacketSink {
    fn deliver(&mut self, packet: &PacketRecord<'_>) -> bool;
}

impl<F> PacketSink for F
where
    F: FnMut(&PacketRecord<'_>) -> bool,
{
    fn deliver(&mut self, packet: &PacketRecord<'_>) -> bool {
        self(packet)
    }
}

/// One driver session
///
/// All methods take `&self`: `stop()`, `pause()`, `resume()`, `set_filter()`
/// and `get_stats()` are called from other threads while `start()` is
/// blocked in the capture loop, so implementations keep their state behind
/// locks or atomics.
///
/// Contract for `start()`/`stop()`:
///
/// - `start()` blocks until `stop()` is called, the sink returns `false`, or
///   an unrecoverable driver error occurs.
/// - `stop()` never waits for `start()` to return, and makes `start()` return
///   within a bounded interval even if no traffic arrives. Use an explicit
///   wake mechanism such as [`capkit_core::Interrupt`].
/// - A `stop()` issued before the loop got going is not lost.
///
/// Optional operations default to `NotSupported`.
pub trait Backend: Send + Sync {
    /// Apply the session configuration; called once before `open()`
    fn init(&self, config: &CaptureConfig) -> Result<()>;

    /// Release every driver resource; called exactly once, last
    fn cleanup(&self);

    /// Open the capture device
    fn open(&self, device: &str) -> Result<()>;

    /// Close the capture device
    fn close(&self) -> Result<()>;

    /// Run the capture loop, delivering every frame to `sink`
    fn start(&self, sink: &mut dyn PacketSink) -> Result<()>;

    /// Make a running (or about to run) `start()` return
    fn stop(&self) -> Result<()>;

    fn pause(&self) -> Result<()> {
        Err(Error::not_supported("pause"))
    }

    fn resume(&self) -> Result<()> {
        Err(Error::not_supported("resume"))
    }

    fn set_filter(&self, _expr: &str) -> Result<()> {
        Err(Error::not_supported("set_filter"))
    }

    /// Driver-level counters
    fn get_stats(&self) -> Result<CaptureStats>;

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        Err(Error::not_supported("enumerate_devices"))
    }

    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn is_feature_supported(&self, feature: &str) -> bool {
        self.capabilities().supports_feature(feature)
    }

    fn set_option(&self, name: &str, _value: OptionValue) -> Result<()> {
        Err(Error::not_supported(format!("option '{}'", name)))
    }

    fn get_option(&self, name: &str) -> Result<OptionValue> {
        Err(Error::not_supported(format!("option '{}'", name)))
    }
}

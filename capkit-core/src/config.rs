//! Capture configuration

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::{BackendType, Error, Result};

/// Default snapshot length (maximum bytes per packet)
pub const DEFAULT_SNAPLEN: u32 = 65535;

/// Largest snapshot length accepted by validation
pub const MAX_SNAPLEN: u32 = 262_144;

/// Default read timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Longest frame the synthetic generator produces
pub const MAX_FRAME_LEN: usize = MAX_SNAPLEN as usize;

/// Largest kernel buffer size accepted by validation (2 GiB)
pub const MAX_BUFFER_SIZE: u32 = 1 << 31;

/// Ad hoc option value passed through `set_option`/`get_option`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            OptionValue::UInt(v) => Some(*v),
            OptionValue::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::UInt(v) => write!(f, "{}", v),
            OptionValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        OptionValue::UInt(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

/// Traffic direction selector for drivers that support it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureDirection {
    #[default]
    InOut,
    In,
    Out,
}

/// libpcap specific options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcapOptions {
    /// Request nanosecond timestamp precision
    pub nanosecond_timestamps: bool,
    /// Restrict capture to one direction
    pub direction: Option<CaptureDirection>,
}

/// Synthetic frame generator options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticOptions {
    /// Number of frames to produce; `None` generates forever
    pub frame_count: Option<u64>,
    /// Length of every generated frame in bytes
    pub frame_len: usize,
    /// Delay between frames
    pub interval: Duration,
    /// Return from the capture loop once all frames were produced
    /// instead of idling until stopped
    pub end_of_stream: bool,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            frame_count: None,
            frame_len: 64,
            interval: Duration::ZERO,
            end_of_stream: false,
        }
    }
}

impl SyntheticOptions {
    /// Reject frame lengths the generator cannot produce
    pub fn validate(&self) -> Result<()> {
        if self.frame_len > MAX_FRAME_LEN {
            return Err(Error::invalid_param(
                "frame_len",
                format!("must not exceed {} bytes", MAX_FRAME_LEN),
            ));
        }
        Ok(())
    }
}

/// Typed option set, one variant per driver that has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSpecific {
    Pcap(PcapOptions),
    Synthetic(SyntheticOptions),
}

impl BackendSpecific {
    /// Backend this option set belongs to
    pub fn backend_type(&self) -> BackendType {
        match self {
            BackendSpecific::Pcap(_) => BackendType::Pcap,
            BackendSpecific::Synthetic(_) => BackendType::Synthetic,
        }
    }
}

/// Backend-specific option set: typed part plus string-keyed tunables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOptions {
    pub typed: Option<BackendSpecific>,
    pub extra: BTreeMap<String, OptionValue>,
}

impl BackendOptions {
    /// Look up a string-keyed tunable
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.extra.get(name)
    }

    /// Typed pcap options, if present
    pub fn pcap(&self) -> Option<&PcapOptions> {
        match &self.typed {
            Some(BackendSpecific::Pcap(opts)) => Some(opts),
            _ => None,
        }
    }

    /// Typed synthetic options, if present
    pub fn synthetic(&self) -> Option<&SyntheticOptions> {
        match &self.typed {
            Some(BackendSpecific::Synthetic(opts)) => Some(opts),
            _ => None,
        }
    }
}

/// Configuration for a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Device identifier (e.g. "eth0")
    pub device: String,
    /// Filter expression applied right after the device is opened
    pub filter: Option<String>,
    /// Maximum bytes to capture per packet
    pub snaplen: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Deliver packets as soon as they arrive
    pub immediate: bool,
    /// Kernel buffer size in bytes (0 = driver default)
    pub buffer_size: u32,
    /// Driver to use
    pub backend: BackendType,
    /// Driver specific options
    pub options: BackendOptions,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            filter: None,
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            immediate: true,
            buffer_size: 0,
            backend: BackendType::default(),
            options: BackendOptions::default(),
        }
    }
}

impl CaptureConfig {
    /// Default configuration for `device`
    pub fn new<S: Into<String>>(device: S) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }

    /// Select the backend type
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Set the filter applied at open
    pub fn with_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set snapshot length
    pub fn with_snaplen(mut self, snaplen: u32) -> Self {
        self.snaplen = snaplen;
        self
    }

    /// Set read timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Enable or disable promiscuous mode
    pub fn with_promiscuous(mut self, enable: bool) -> Self {
        self.promiscuous = enable;
        self
    }

    /// Enable or disable immediate delivery
    pub fn with_immediate(mut self, enable: bool) -> Self {
        self.immediate = enable;
        self
    }

    /// Set kernel buffer size
    pub fn with_buffer_size(mut self, bytes: u32) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Attach typed driver options
    pub fn with_backend_options(mut self, typed: BackendSpecific) -> Self {
        self.options.typed = Some(typed);
        self
    }

    /// Add a string-keyed tunable
    pub fn with_option<K: Into<String>, V: Into<OptionValue>>(mut self, name: K, value: V) -> Self {
        self.options.extra.insert(name.into(), value.into());
        self
    }

    /// Read timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Check every field; no driver is touched
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(Error::invalid_param("device", "device name is empty"));
        }
        if self.device.contains('\0') {
            return Err(Error::invalid_param("device", "device name contains NUL"));
        }
        if self.snaplen == 0 || self.snaplen > MAX_SNAPLEN {
            return Err(Error::invalid_param(
                "snaplen",
                format!("must be within 1..={}", MAX_SNAPLEN),
            ));
        }
        if let Some(filter) = &self.filter {
            validate_filter(filter)?;
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(Error::invalid_param(
                "buffer_size",
                format!("must not exceed {} bytes", MAX_BUFFER_SIZE),
            ));
        }
        if let Some(typed) = &self.options.typed {
            let owner = typed.backend_type();
            if owner != self.backend {
                return Err(Error::invalid_param(
                    "options",
                    format!("{} options given for backend {}", owner, self.backend),
                ));
            }
        }
        if let Some(synthetic) = self.options.synthetic() {
            synthetic.validate()?;
        }
        Ok(())
    }
}

/// Reject filter expressions no driver could accept
pub fn validate_filter(expr: &str) -> Result<()> {
    if expr.trim().is_empty() {
        return Err(Error::invalid_param("filter", "filter expression is blank"));
    }
    if expr.contains('\0') {
        return Err(Error::invalid_param("filter", "filter expression contains NUL"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.snaplen, DEFAULT_SNAPLEN);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.promiscuous);
        assert!(config.immediate);
        assert_eq!(config.backend, BackendType::Pcap);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_builder() {
        let config = CaptureConfig::new("test0")
            .with_backend(BackendType::custom("TEST"))
            .with_snaplen(1500)
            .with_timeout_ms(10)
            .with_filter("arp")
            .with_promiscuous(false)
            .with_option("ring.slots", 4096u64);

        assert_eq!(config.device, "test0");
        assert_eq!(config.snaplen, 1500);
        assert_eq!(config.timeout(), Duration::from_millis(10));
        assert_eq!(config.filter.as_deref(), Some("arp"));
        assert!(!config.promiscuous);
        assert_eq!(
            config.options.get("ring.slots"),
            Some(&OptionValue::UInt(4096))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let err = CaptureConfig::new("").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);

        let err = CaptureConfig::new("eth0").with_snaplen(0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);

        let err = CaptureConfig::new("eth0")
            .with_snaplen(MAX_SNAPLEN + 1)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);

        let err = CaptureConfig::new("eth0").with_filter("  ").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
    }

    #[test]
    fn test_validate_typed_options_must_match_backend() {
        let config = CaptureConfig::new("eth0")
            .with_backend(BackendType::Pcap)
            .with_backend_options(BackendSpecific::Synthetic(SyntheticOptions::default()));
        assert!(config.validate().is_err());

        let config = CaptureConfig::new("syn0")
            .with_backend(BackendType::Synthetic)
            .with_backend_options(BackendSpecific::Synthetic(SyntheticOptions::default()));
        assert!(config.validate().is_ok());
        assert!(config.options.synthetic().is_some());
        assert!(config.options.pcap().is_none());
    }

    #[test]
    fn test_validate_bounds_synthetic_frame_len() {
        let with_len = |frame_len| {
            CaptureConfig::new("syn0")
                .with_backend(BackendType::Synthetic)
                .with_backend_options(BackendSpecific::Synthetic(SyntheticOptions {
                    frame_len,
                    ..Default::default()
                }))
        };

        assert!(with_len(MAX_FRAME_LEN).validate().is_ok());
        let err = with_len(MAX_FRAME_LEN + 1).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        let err = with_len(usize::MAX).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
    }

    #[test]
    fn test_option_value_accessors() {
        assert_eq!(OptionValue::from(true).as_bool(), Some(true));
        assert_eq!(OptionValue::Int(7).as_u64(), Some(7));
        assert_eq!(OptionValue::Int(-1).as_u64(), None);
        assert_eq!(OptionValue::from("x").as_str(), Some("x"));
        assert_eq!(OptionValue::UInt(3).to_string(), "3");
    }
}

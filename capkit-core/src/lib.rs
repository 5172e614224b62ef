//! capkit core library
//!
//! This crate provides the fundamental types, error handling and
//! configuration shared by every capkit crate: the capture configuration,
//! the borrowed packet view handed to delivery callbacks, the statistics
//! value, the device model, the session state enum and the [`Interrupt`]
//! wake primitive drivers use to honour `stop()` while idle.

pub mod config;
pub mod device;
pub mod error;
pub mod interrupt;
pub mod packet;
pub mod state;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use config::{
    BackendOptions, BackendSpecific, CaptureConfig, CaptureDirection, OptionValue, PcapOptions,
    SyntheticOptions,
};
pub use device::{DeviceDescriptor, DeviceFlags, DeviceHints, DeviceType};
pub use error::{Error, ErrorKind, Result};
pub use interrupt::Interrupt;
pub use packet::PacketRecord;
pub use state::SessionState;
pub use stats::CaptureStats;
pub use types::{BackendType, MacAddr};

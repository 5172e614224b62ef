//! Capture sessions for capkit
//!
//! This crate provides the caller-facing side of capkit:
//!
//! - [`CaptureSession`]: lifecycle state machine around one backend instance
//! - Packet delivery from the driver's loop to the caller's callback
//! - [`StatsAccumulator`]: merged, monotonic session statistics
//! - [`list_devices`]: device enumeration without an open session
//!
//! # Example
//!
//! ```no_run
//! use capkit_capture::CaptureSession;
//! use capkit_core::{BackendType, CaptureConfig};
//!
//! fn main() -> capkit_core::Result<()> {
//!     capkit_backend::synthetic::register()?;
//!
//!     let config = CaptureConfig::new("syn0").with_backend(BackendType::Synthetic);
//!     let session = CaptureSession::init(config)?;
//!
//!     let mut seen = 0;
//!     session.start(|packet| {
//!         println!("{} bytes", packet.len());
//!         seen += 1;
//!         seen < 10
//!     })?;
//!
//!     println!("{}", session.get_stats()?.format());
//!     Ok(())
//! }
//! ```

mod pipeline;

pub mod devices;
pub mod session;
pub mod stats;

pub use devices::{list_capture_devices, list_devices, list_devices_with};
pub use session::CaptureSession;
pub use stats::StatsAccumulator;

pub use capkit_core::{CaptureConfig, CaptureStats, Error, PacketRecord, Result, SessionState};

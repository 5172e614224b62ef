//! Backend driver contract and registry for capkit
//!
//! This crate defines what a capture driver is and how drivers are found:
//!
//! - [`Backend`]: the driver contract (blocking `start()`, non-blocking `stop()`)
//! - [`BackendDescriptor`]: immutable, registered driver metadata and factory
//! - [`BackendRegistry`] / [`GlobalRegistry`]: type-tag to descriptor lookup
//! - [`ErrorSink`]: non-fatal diagnostic reporting
//! - [`interface`]: host interface enumeration shared by drivers
//! - [`synthetic`]: an in-memory frame generator driver
//!
//! # Example
//!
//! ```no_run
//! use capkit_backend::{synthetic, ErrorSink, GlobalRegistry};
//! use capkit_core::BackendType;
//!
//! fn main() -> capkit_core::Result<()> {
//!     synthetic::register()?;
//!
//!     let descriptor = GlobalRegistry::get(&BackendType::Synthetic)?;
//!     let backend = descriptor.instantiate(ErrorSink::new())?;
//!     println!("{} {}", backend.name(), backend.version());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod descriptor;
pub mod interface;
pub mod registry;
pub mod sink;
pub mod synthetic;

pub use backend::{Backend, Capabilities, PacketSink};
pub use descriptor::{BackendDescriptor, BackendFactory};
pub use registry::{BackendRegistry, GlobalRegistry};
pub use sink::ErrorSink;

pub use capkit_core::{Error, Result};

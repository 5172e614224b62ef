//! List Devices Example
//!
//! Prints the devices every registered backend can capture on.
//!
//! Usage:
//!   cargo run --example list_devices

use capkit_backend::{synthetic, GlobalRegistry};
use capkit_capture::list_devices;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    capkit_pcap::register()?;
    synthetic::register()?;

    for descriptor in GlobalRegistry::list() {
        println!(
            "{} {} [{}]: {}",
            descriptor.name(),
            descriptor.version(),
            descriptor.kind(),
            descriptor.description()
        );

        match list_devices(descriptor.kind()) {
            Ok(devices) => {
                for device in devices {
                    println!("  {}", device);
                }
            }
            Err(e) => println!("  unavailable: {}", e),
        }
    }
    Ok(())
}

//! Basic Capture Example
//!
//! Captures from a live interface through libpcap for a few seconds, then
//! stops the session from another thread.
//!
//! Usage:
//!   cargo run --example basic_capture -- eth0 "tcp port 443"
//!
//! Without a device argument the first capture-capable device is used.
//!
//! Requires capture privileges (root or CAP_NET_RAW).

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use capkit_capture::{list_capture_devices, CaptureSession};
use capkit_core::{BackendType, CaptureConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    capkit_pcap::register()?;

    let mut args = env::args().skip(1);
    let device = match args.next() {
        Some(device) => device,
        None => list_capture_devices(&BackendType::Pcap)?
            .into_iter()
            .next()
            .map(|dev| dev.name)
            .ok_or("no capture-capable device found")?,
    };
    let mut config = CaptureConfig::new(device).with_timeout_ms(100);
    if let Some(filter) = args.next() {
        config = config.with_filter(filter);
    }

    let session = Arc::new(CaptureSession::init(config)?);

    let stopper = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(5));
            if let Err(e) = session.stop() {
                eprintln!("stop failed: {}", e);
            }
        })
    };

    session.start(|packet| {
        println!(
            "{:?} if={} {} bytes ({} captured)",
            packet.timestamp(),
            packet.if_index(),
            packet.wire_len(),
            packet.caplen()
        );
        true
    })?;

    stopper.join().map_err(|_| "stopper thread panicked")?;

    println!("\n{}", session.get_stats()?.format());
    Ok(())
}

//! Synthetic Capture Example
//!
//! Captures generated frames without touching a real interface, pausing
//! and resuming the session from a control thread.
//!
//! Usage:
//!   cargo run --example synthetic_capture

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use capkit_backend::synthetic;
use capkit_capture::CaptureSession;
use capkit_core::{BackendSpecific, BackendType, CaptureConfig, SyntheticOptions};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    synthetic::register()?;

    let config = CaptureConfig::new(synthetic::DEVICE)
        .with_backend(BackendType::Synthetic)
        .with_backend_options(BackendSpecific::Synthetic(SyntheticOptions {
            frame_count: Some(200),
            frame_len: 128,
            interval: Duration::from_millis(5),
            end_of_stream: true,
        }));

    let session = Arc::new(CaptureSession::init(config)?);
    println!("Session {} on {}", session.id(), session.config().device);

    let control = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            if let Err(e) = session.pause() {
                eprintln!("pause failed: {}", e);
            }
            println!("Paused");

            thread::sleep(Duration::from_millis(200));
            if let Err(e) = session.resume() {
                eprintln!("resume failed: {}", e);
            }
            println!("Resumed");
        })
    };

    let mut delivered = 0u64;
    session.start(|packet| {
        delivered += 1;
        if delivered % 50 == 0 {
            println!("{} frames, last {} bytes", delivered, packet.len());
        }
        true
    })?;

    control.join().map_err(|_| "control thread panicked")?;

    println!("\n{}", session.get_stats()?.format());
    session.cleanup();
    Ok(())
}

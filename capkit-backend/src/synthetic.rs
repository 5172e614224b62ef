//! In-memory frame generator backend
//!
//! Produces Ethernet frames without touching any device: a broadcast
//! destination, a locally administered source, the local experimental
//! ethertype and an incrementing sequence number as payload. Used for demos
//! and as the reference implementation of the stop/idle contract.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use capkit_core::{
    config::{validate_filter, MAX_FRAME_LEN},
    BackendType, CaptureConfig, CaptureStats, DeviceDescriptor, DeviceFlags, DeviceType, Error,
    Interrupt, MacAddr, OptionValue, PacketRecord, Result, SyntheticOptions,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{Backend, Capabilities, PacketSink};
use crate::descriptor::BackendDescriptor;
use crate::registry::GlobalRegistry;
use crate::sink::ErrorSink;

pub const NAME: &str = "synthetic";
pub const DEVICE: &str = "syn0";

const ETHERTYPE_LOCAL_EXP: u16 = 0x88B5;
const SOURCE_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Features the synthetic driver implements
pub fn capabilities() -> Capabilities {
    Capabilities::PAUSE
        | Capabilities::FILTER
        | Capabilities::LIVE_FILTER
        | Capabilities::DEVICES
        | Capabilities::OPTIONS
}

/// Descriptor registering this driver under [`BackendType::Synthetic`]
pub fn descriptor() -> BackendDescriptor {
    BackendDescriptor::new(BackendType::Synthetic, NAME, |errors| {
        Ok(Box::new(SyntheticBackend::new(errors)))
    })
    .with_version(env!("CARGO_PKG_VERSION"))
    .with_description("In-memory Ethernet frame generator")
    .with_capabilities(capabilities())
}

/// Register the synthetic driver with the global registry
pub fn register() -> Result<Arc<BackendDescriptor>> {
    GlobalRegistry::register(descriptor())
}

#[derive(Debug, Default)]
struct State {
    options: SyntheticOptions,
    snaplen: u32,
    device: Option<String>,
    filter: Option<String>,
}

/// Synthetic capture backend
pub struct SyntheticBackend {
    state: Mutex<State>,
    interrupt: Interrupt,
    paused: AtomicBool,
    packets: AtomicU64,
    bytes: AtomicU64,
    errors: ErrorSink,
}

impl SyntheticBackend {
    /// Create an unopened generator reporting through `errors`
    pub fn new(errors: ErrorSink) -> Self {
        Self {
            state: Mutex::new(State::default()),
            interrupt: Interrupt::new(),
            paused: AtomicBool::new(false),
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            errors,
        }
    }

    /// Active filter expression, if any
    pub fn filter(&self) -> Option<String> {
        self.state.lock().filter.clone()
    }

    fn build_frame(seq: u64, len: usize) -> Vec<u8> {
        let mut frame = Vec::with_capacity(len.max(22));
        frame.extend_from_slice(MacAddr::broadcast().as_bytes());
        frame.extend_from_slice(SOURCE_MAC.as_bytes());
        frame.extend_from_slice(&ETHERTYPE_LOCAL_EXP.to_be_bytes());
        frame.extend_from_slice(&seq.to_be_bytes());
        frame.resize(len, 0);
        frame
    }
}

impl Backend for SyntheticBackend {
    fn init(&self, config: &CaptureConfig) -> Result<()> {
        let options = config.options.synthetic().cloned().unwrap_or_default();
        options.validate()?;

        let mut state = self.state.lock();
        state.options = options;
        state.snaplen = config.snaplen;
        debug!(
            frame_count = ?state.options.frame_count,
            frame_len = state.options.frame_len,
            "Synthetic backend initialised"
        );
        Ok(())
    }

    fn cleanup(&self) {
        let mut state = self.state.lock();
        state.device = None;
        state.filter = None;
    }

    fn open(&self, device: &str) -> Result<()> {
        self.interrupt.reset();
        self.paused.store(false, Ordering::SeqCst);
        self.state.lock().device = Some(device.to_string());
        info!(device = device, "Synthetic device opened");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.interrupt.trigger();
        self.state.lock().device = None;
        Ok(())
    }

    fn start(&self, sink: &mut dyn PacketSink) -> Result<()> {
        let (options, snaplen) = {
            let state = self.state.lock();
            if state.device.is_none() {
                return Err(self
                    .errors
                    .report_error(Error::StartFailed("device not open".to_string())));
            }
            (state.options.clone(), state.snaplen as usize)
        };

        let mut seq = 0u64;
        loop {
            if self.interrupt.is_triggered() {
                break;
            }
            if self.paused.load(Ordering::SeqCst) {
                self.interrupt.wait_timeout(PAUSE_POLL);
                continue;
            }
            if options.frame_count.map_or(false, |n| seq >= n) {
                if !options.end_of_stream {
                    self.interrupt.wait();
                }
                break;
            }

            let frame = Self::build_frame(seq, options.frame_len);
            let caplen = frame.len().min(snaplen);
            let wire_len = u32::try_from(frame.len())
                .map_err(|_| Error::StartFailed(format!("frame of {} bytes", frame.len())))?;
            let record = PacketRecord::new(&frame[..caplen], SystemTime::now())
                .with_wire_len(wire_len)
                .with_protocol(u32::from(ETHERTYPE_LOCAL_EXP));

            self.packets.fetch_add(1, Ordering::Relaxed);
            self.bytes.fetch_add(frame.len() as u64, Ordering::Relaxed);
            seq += 1;

            if !sink.deliver(&record) {
                break;
            }
            if !options.interval.is_zero() && self.interrupt.wait_timeout(options.interval) {
                break;
            }
        }

        debug!(frames = seq, "Synthetic capture loop finished");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.interrupt.trigger();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_filter(&self, expr: &str) -> Result<()> {
        validate_filter(expr).map_err(|e| Error::SetFilterFailed(e.to_string()))?;
        self.state.lock().filter = Some(expr.to_string());
        Ok(())
    }

    fn get_stats(&self) -> Result<CaptureStats> {
        Ok(CaptureStats {
            packets_received: self.packets.load(Ordering::Relaxed),
            bytes_received: self.bytes.load(Ordering::Relaxed),
            ..Default::default()
        })
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let mut dev = DeviceDescriptor::new(DEVICE);
        dev.description = "Synthetic frame generator".to_string();
        dev.flags = DeviceFlags::UP | DeviceFlags::RUNNING | DeviceFlags::VIRTUAL;
        dev.device_type = DeviceType::Other;
        dev.mtu = u32::try_from(self.state.lock().options.frame_len).unwrap_or(u32::MAX);
        dev.mac = SOURCE_MAC;
        Ok(vec![dev])
    }

    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "In-memory Ethernet frame generator"
    }

    fn capabilities(&self) -> Capabilities {
        capabilities()
    }

    fn set_option(&self, name: &str, value: OptionValue) -> Result<()> {
        let invalid = || Error::invalid_param(name, format!("unexpected value '{}'", value));
        let mut state = self.state.lock();
        match name {
            "frame_count" => state.options.frame_count = Some(value.as_u64().ok_or_else(invalid)?),
            "frame_len" => {
                let len = value
                    .as_u64()
                    .and_then(|len| usize::try_from(len).ok())
                    .ok_or_else(invalid)?;
                if len > MAX_FRAME_LEN {
                    return Err(Error::invalid_param(
                        name,
                        format!("must not exceed {} bytes", MAX_FRAME_LEN),
                    ));
                }
                state.options.frame_len = len;
            }
            "interval_ms" => {
                state.options.interval = Duration::from_millis(value.as_u64().ok_or_else(invalid)?)
            }
            "end_of_stream" => state.options.end_of_stream = value.as_bool().ok_or_else(invalid)?,
            _ => return Err(Error::not_supported(format!("option '{}'", name))),
        }
        Ok(())
    }

    fn get_option(&self, name: &str) -> Result<OptionValue> {
        let state = self.state.lock();
        let value = match name {
            "frame_count" => match state.options.frame_count {
                Some(n) => OptionValue::UInt(n),
                None => return Err(Error::NotFound(name.to_string())),
            },
            "frame_len" => OptionValue::UInt(state.options.frame_len as u64),
            "interval_ms" => OptionValue::UInt(state.options.interval.as_millis() as u64),
            "end_of_stream" => OptionValue::Bool(state.options.end_of_stream),
            _ => return Err(Error::not_supported(format!("option '{}'", name))),
        };
        Ok(value)
    }
}

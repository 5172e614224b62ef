//! libpcap capture backend

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use capkit_backend::{interface, Backend, Capabilities, ErrorSink, PacketSink};
use capkit_core::config::validate_filter;
use capkit_core::{
    CaptureConfig, CaptureDirection, CaptureStats, DeviceDescriptor, DeviceFlags, Error,
    Interrupt, OptionValue, PacketRecord, Result,
};
use parking_lot::Mutex;
use pcap::{Active, BreakLoop, Capture, Device, Direction, Precision};
use tracing::{debug, error, info, warn};

pub const NAME: &str = "pcap";
pub const DESCRIPTION: &str = "libpcap live capture";

/// Refresh the cached kernel counters every this many frames
const STATS_REFRESH_INTERVAL: u64 = 1024;

pub fn capabilities() -> Capabilities {
    Capabilities::PAUSE
        | Capabilities::FILTER
        | Capabilities::LIVE_FILTER
        | Capabilities::DEVICES
        | Capabilities::OPTIONS
        | Capabilities::PACKET_METADATA
}

fn to_pcap_direction(direction: CaptureDirection) -> Direction {
    match direction {
        CaptureDirection::InOut => Direction::InOut,
        CaptureDirection::In => Direction::In,
        CaptureDirection::Out => Direction::Out,
    }
}

fn parse_direction(value: &str) -> Option<CaptureDirection> {
    match value.to_ascii_lowercase().as_str() {
        "in" => Some(CaptureDirection::In),
        "out" => Some(CaptureDirection::Out),
        "inout" | "in-out" | "both" => Some(CaptureDirection::InOut),
        _ => None,
    }
}

/// Convert a pcap timeval; the fractional part is in nanoseconds when
/// nanosecond precision was requested
fn to_system_time(tv_sec: i64, tv_frac: i64, nanos: bool) -> SystemTime {
    let secs = Duration::from_secs(tv_sec.max(0) as u64);
    let frac = if nanos {
        Duration::from_nanos(tv_frac.max(0) as u64)
    } else {
        Duration::from_micros(tv_frac.max(0) as u64)
    };
    UNIX_EPOCH + secs + frac
}

/// Settings captured at `init()`
#[derive(Debug, Clone, Default)]
struct Settings {
    snaplen: i32,
    timeout_ms: i32,
    promiscuous: bool,
    immediate: bool,
    buffer_size: i32,
    nanosecond_timestamps: bool,
    direction: Option<CaptureDirection>,
}

/// Capture backend on top of libpcap
///
/// The active capture handle lives behind a mutex that the capture loop
/// holds for one `next_packet()` plus delivery. `stop()` never touches that
/// mutex: it latches the interrupt and breaks libpcap's read through a
/// separate break-loop handle. A filter set from inside the delivery
/// callback is queued and compiled by the loop before the next read.
pub struct PcapBackend {
    settings: Mutex<Settings>,
    capture: Mutex<Option<Capture<Active>>>,
    breaker: Mutex<Option<BreakLoop>>,
    /// Thread currently inside `start()`
    loop_thread: Mutex<Option<ThreadId>>,
    pending_filter: Mutex<Option<String>>,
    device: Mutex<Option<String>>,
    if_index: AtomicU64,
    options: Mutex<BTreeMap<String, OptionValue>>,
    interrupt: Interrupt,
    paused: AtomicBool,
    bytes: AtomicU64,
    last_stat: Mutex<CaptureStats>,
    errors: ErrorSink,
}

impl PcapBackend {
    /// Create an unopened libpcap driver
    pub fn new(errors: ErrorSink) -> Self {
        Self {
            settings: Mutex::new(Settings::default()),
            capture: Mutex::new(None),
            breaker: Mutex::new(None),
            loop_thread: Mutex::new(None),
            pending_filter: Mutex::new(None),
            device: Mutex::new(None),
            if_index: AtomicU64::new(0),
            options: Mutex::new(BTreeMap::new()),
            interrupt: Interrupt::new(),
            paused: AtomicBool::new(false),
            bytes: AtomicU64::new(0),
            last_stat: Mutex::new(CaptureStats::default()),
            errors,
        }
    }

    fn lock_timeout(&self) -> Duration {
        let timeout_ms = self.settings.lock().timeout_ms.max(0) as u64;
        Duration::from_millis(timeout_ms) + Duration::from_millis(100)
    }

    /// Update the cached kernel counters from an active capture
    fn refresh_stats(&self, capture: &mut Capture<Active>) {
        match capture.stats() {
            Ok(stat) => {
                let mut last = self.last_stat.lock();
                last.packets_received = u64::from(stat.received);
                last.packets_dropped = u64::from(stat.dropped);
                last.packets_if_dropped = u64::from(stat.if_dropped);
            }
            Err(e) => debug!(error = %e, "pcap_stats unavailable"),
        }
    }

    /// Compile a filter queued from the delivery callback
    fn apply_pending_filter(&self, capture: &mut Capture<Active>) {
        let pending = self.pending_filter.lock().take();
        if let Some(expr) = pending {
            match capture.filter(&expr, true) {
                Ok(()) => info!(filter = %expr, "BPF filter set"),
                Err(e) => self
                    .errors
                    .report(&format!("filter '{}' not applied: {}", expr, e)),
            }
        }
    }

    fn apply_direction(&self, direction: CaptureDirection) -> Result<()> {
        let guard = self.capture.try_lock_for(self.lock_timeout());
        let mut guard = guard.ok_or_else(|| Error::Timeout("capture handle busy".to_string()))?;
        if let Some(capture) = guard.as_mut() {
            capture
                .direction(to_pcap_direction(direction))
                .map_err(|e| self.errors.report_error(Error::backend(e.to_string())))?;
        }
        self.settings.lock().direction = Some(direction);
        Ok(())
    }
}

impl Backend for PcapBackend {
    fn init(&self, config: &CaptureConfig) -> Result<()> {
        let pcap_options = config.options.pcap().cloned().unwrap_or_default();
        let to_i32 = |name: &str, value: u32| {
            i32::try_from(value).map_err(|_| Error::invalid_param(name, "out of range for libpcap"))
        };

        let settings = Settings {
            snaplen: to_i32("snaplen", config.snaplen)?,
            timeout_ms: to_i32("timeout_ms", config.timeout_ms)?,
            promiscuous: config.promiscuous,
            immediate: config.immediate,
            buffer_size: to_i32("buffer_size", config.buffer_size)?,
            nanosecond_timestamps: pcap_options.nanosecond_timestamps,
            direction: pcap_options.direction,
        };
        debug!(?settings, "pcap backend initialised");
        *self.settings.lock() = settings;

        let mut options = self.options.lock();
        for (name, value) in &config.options.extra {
            options.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn cleanup(&self) {
        self.breaker.lock().take();
        self.capture.lock().take();
        self.options.lock().clear();
        debug!("pcap backend cleaned up");
    }

    fn open(&self, device: &str) -> Result<()> {
        let settings = self.settings.lock().clone();

        let mut inactive = Capture::from_device(device)
            .map_err(|e| self.errors.report_error(Error::OpenFailed(e.to_string())))?
            .promisc(settings.promiscuous)
            .snaplen(settings.snaplen)
            .timeout(settings.timeout_ms)
            .immediate_mode(settings.immediate);

        if settings.buffer_size > 0 {
            inactive = inactive.buffer_size(settings.buffer_size);
        }
        if settings.nanosecond_timestamps {
            inactive = inactive.precision(Precision::Nano);
        }

        let mut capture = inactive
            .open()
            .map_err(|e| self.errors.report_error(Error::OpenFailed(e.to_string())))?;

        if let Some(direction) = settings.direction {
            if let Err(e) = capture.direction(to_pcap_direction(direction)) {
                // Not every platform supports pcap_setdirection
                self.errors
                    .report(&format!("direction {:?} not applied: {}", direction, e));
            }
        }

        *self.breaker.lock() = Some(capture.breakloop_handle());
        *self.capture.lock() = Some(capture);
        *self.device.lock() = Some(device.to_string());
        self.if_index
            .store(u64::from(interface::if_index(device).unwrap_or(0)), Ordering::Relaxed);
        self.interrupt.reset();
        self.paused.store(false, Ordering::SeqCst);

        info!(device = device, "pcap device opened");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.interrupt.trigger();
        if let Some(breaker) = self.breaker.lock().take() {
            breaker.breakloop();
        }
        if let Some(mut capture) = self.capture.lock().take() {
            self.refresh_stats(&mut capture);
        }
        if let Some(device) = self.device.lock().take() {
            info!(device = %device, "pcap device closed");
        }
        Ok(())
    }

    fn start(&self, sink: &mut dyn PacketSink) -> Result<()> {
        if self.device.lock().is_none() {
            return Err(Error::StartFailed("device not open".to_string()));
        }
        let if_index = self.if_index.load(Ordering::Relaxed) as u32;
        let nanos = self.settings.lock().nanosecond_timestamps;
        let mut frames = 0u64;
        *self.loop_thread.lock() = Some(thread::current().id());

        let result = loop {
            if self.interrupt.is_triggered() {
                break Ok(());
            }

            let mut guard = self.capture.lock();
            let capture = match guard.as_mut() {
                Some(capture) => capture,
                None => break Ok(()),
            };

            let mut refresh = false;
            let finished = match capture.next_packet() {
                Ok(_) if self.paused.load(Ordering::SeqCst) => None,
                Ok(packet) => {
                    let header = packet.header;
                    let timestamp =
                        to_system_time(header.ts.tv_sec as i64, header.ts.tv_usec as i64, nanos);
                    let record = PacketRecord::new(packet.data, timestamp)
                        .with_wire_len(header.len)
                        .with_if_index(if_index);

                    self.bytes.fetch_add(u64::from(header.len), Ordering::Relaxed);
                    frames += 1;
                    refresh = frames % STATS_REFRESH_INTERVAL == 0;

                    if sink.deliver(&record) {
                        None
                    } else {
                        Some(Ok(()))
                    }
                }
                Err(pcap::Error::TimeoutExpired) => {
                    refresh = true;
                    None
                }
                // Returned after pcap_breakloop or at the end of a savefile
                Err(pcap::Error::NoMorePackets) => Some(Ok(())),
                Err(e) => {
                    error!(error = %e, "Packet capture error");
                    Some(Err(self.errors.report_error(Error::backend(e.to_string()))))
                }
            };

            self.apply_pending_filter(capture);
            if refresh {
                self.refresh_stats(capture);
            }
            if let Some(result) = finished {
                break result;
            }
        };

        self.loop_thread.lock().take();
        if let Some(capture) = self.capture.lock().as_mut() {
            self.apply_pending_filter(capture);
            self.refresh_stats(capture);
        }
        debug!(frames, "pcap capture loop finished");
        result
    }

    fn stop(&self) -> Result<()> {
        self.interrupt.trigger();
        if let Some(breaker) = self.breaker.lock().as_ref() {
            breaker.breakloop();
        }
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
        validate_filter(expr)?;

        // The loop holds the handle while the callback runs
        if *self.loop_thread.lock() == Some(thread::current().id()) {
            debug!(filter = expr, "Filter queued from capture callback");
            *self.pending_filter.lock() = Some(expr.to_string());
            return Ok(());
        }

        let mut guard = self
            .capture
            .try_lock_for(self.lock_timeout())
            .ok_or_else(|| Error::Timeout("capture handle busy".to_string()))?;
        let capture = guard
            .as_mut()
            .ok_or_else(|| Error::SetFilterFailed("device not open".to_string()))?;

        capture
            .filter(expr, true)
            .map_err(|e| self.errors.report_error(Error::SetFilterFailed(e.to_string())))?;

        info!(filter = expr, "BPF filter set");
        Ok(())
    }

    fn get_stats(&self) -> Result<CaptureStats> {
        // The loop thread may hold the handle; fall back to the cached counters
        if let Some(mut guard) = self.capture.try_lock() {
            if let Some(capture) = guard.as_mut() {
                self.refresh_stats(capture);
            }
        }

        let mut stats = self.last_stat.lock().clone();
        stats.bytes_received = self.bytes.load(Ordering::Relaxed);
        Ok(stats)
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let devices = Device::list().map_err(|e| {
            self.errors
                .report_error(Error::GetDevicesFailed(e.to_string()))
        })?;

        let host = interface::host_devices().unwrap_or_else(|e| {
            warn!(error = %e, "Host interface data unavailable");
            Vec::new()
        });

        let descriptors = devices
            .iter()
            .map(|device| {
                let mut desc = DeviceDescriptor::new(device.name.clone());
                desc.description = device.desc.clone().unwrap_or_default();

                if device.flags.is_up() {
                    desc.flags |= DeviceFlags::UP;
                }
                if device.flags.is_running() {
                    desc.flags |= DeviceFlags::RUNNING;
                }
                if device.flags.is_loopback() {
                    desc.flags |= DeviceFlags::LOOPBACK;
                }
                if device.flags.is_wireless() {
                    desc.flags |= DeviceFlags::WIRELESS;
                }

                for address in &device.addresses {
                    match address.addr {
                        IpAddr::V4(ip) => {
                            desc.flags |= DeviceFlags::HAS_IPV4;
                            if desc.ipv4.is_none() {
                                desc.ipv4 = Some(ip);
                                desc.netmask = match address.netmask {
                                    Some(IpAddr::V4(mask)) => Some(mask),
                                    _ => None,
                                };
                                desc.broadcast = match address.broadcast_addr {
                                    Some(IpAddr::V4(bcast)) => Some(bcast),
                                    _ => None,
                                };
                            }
                        }
                        IpAddr::V6(_) => desc.flags |= DeviceFlags::HAS_IPV6,
                    }
                }

                if let Some(known) = host.iter().find(|h| h.name == device.name) {
                    desc.merge_from(known);
                }
                desc
            })
            .collect();

        Ok(descriptors)
    }

    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn capabilities(&self) -> Capabilities {
        capabilities()
    }

    fn set_option(&self, name: &str, value: OptionValue) -> Result<()> {
        if name == "direction" {
            let direction = value
                .as_str()
                .and_then(parse_direction)
                .ok_or_else(|| Error::invalid_param(name, format!("unknown direction '{}'", value)))?;
            self.apply_direction(direction)?;
        }
        debug!(option = name, value = %value, "pcap option set");
        self.options.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn get_option(&self, name: &str) -> Result<OptionValue> {
        self.options
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("option '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_name() -> &'static str {
        if cfg!(target_os = "linux") {
            "lo"
        } else if cfg!(windows) {
            "\\Device\\NPF_Loopback"
        } else {
            "lo0"
        }
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!(parse_direction("IN"), Some(CaptureDirection::In));
        assert_eq!(parse_direction("out"), Some(CaptureDirection::Out));
        assert_eq!(parse_direction("both"), Some(CaptureDirection::InOut));
        assert_eq!(parse_direction("sideways"), None);
    }

    #[test]
    fn test_timestamp_precision() {
        let micro = to_system_time(10, 500, false);
        let nano = to_system_time(10, 500, true);
        assert_eq!(
            micro.duration_since(UNIX_EPOCH).unwrap(),
            Duration::new(10, 500_000)
        );
        assert_eq!(
            nano.duration_since(UNIX_EPOCH).unwrap(),
            Duration::new(10, 500)
        );
    }

    #[test]
    fn test_init_rejects_oversized_values() {
        let backend = PcapBackend::new(ErrorSink::new());
        let config = CaptureConfig::new("eth0").with_buffer_size(u32::MAX);
        let err = backend.init(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidParam { .. }));
    }

    #[test]
    fn test_start_without_open() {
        let backend = PcapBackend::new(ErrorSink::new());
        backend.init(&CaptureConfig::new("eth0")).unwrap();
        let mut sink = |_: &PacketRecord<'_>| true;
        assert!(matches!(
            backend.start(&mut sink),
            Err(Error::StartFailed(_))
        ));
    }

    #[test]
    fn test_options_roundtrip() {
        let backend = PcapBackend::new(ErrorSink::new());
        let config = CaptureConfig::new("eth0").with_option("ring", 4u64);
        backend.init(&config).unwrap();

        assert_eq!(backend.get_option("ring").unwrap(), OptionValue::UInt(4));
        backend.set_option("label", OptionValue::from("uplink")).unwrap();
        assert_eq!(
            backend.get_option("label").unwrap(),
            OptionValue::Str("uplink".to_string())
        );
        assert!(backend.get_option("missing").is_err());
        assert!(backend
            .set_option("direction", OptionValue::from("sideways"))
            .is_err());
    }

    #[test]
    fn test_set_filter_requires_open_device() {
        let backend = PcapBackend::new(ErrorSink::new());
        assert!(matches!(
            backend.set_filter("tcp"),
            Err(Error::SetFilterFailed(_))
        ));
        assert!(matches!(
            backend.set_filter(""),
            Err(Error::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_filter_from_loop_thread_is_queued() {
        let backend = PcapBackend::new(ErrorSink::new());
        *backend.loop_thread.lock() = Some(thread::current().id());

        let began = std::time::Instant::now();
        backend.set_filter("udp port 53").unwrap();
        assert!(began.elapsed() < Duration::from_millis(100));
        assert_eq!(backend.pending_filter.lock().as_deref(), Some("udp port 53"));

        // Other threads still go through the handle
        let other = thread::scope(|scope| scope.spawn(|| backend.set_filter("tcp")).join());
        assert!(matches!(other, Ok(Err(Error::SetFilterFailed(_)))));
        assert_eq!(backend.pending_filter.lock().as_deref(), Some("udp port 53"));
    }

    #[test]
    fn test_open_loopback() {
        let backend = PcapBackend::new(ErrorSink::new());
        let config = CaptureConfig::new(loopback_name()).with_timeout_ms(50);
        backend.init(&config).unwrap();

        // Needs capture privileges
        match backend.open(loopback_name()) {
            Ok(()) => {
                match backend.set_filter("icmp") {
                    Ok(()) => {}
                    Err(e) => println!("Could not set filter: {}", e),
                }
                assert!(backend.set_filter("invalid filter syntax !!!").is_err());

                backend.stop().unwrap();
                let mut sink = |_: &PacketRecord<'_>| true;
                backend.start(&mut sink).unwrap();
                backend.close().unwrap();
            }
            Err(e) => println!("Could not open capture (may need privileges): {}", e),
        }
        backend.cleanup();
    }

    #[test]
    fn test_enumerate_devices() {
        let backend = PcapBackend::new(ErrorSink::new());
        match backend.enumerate_devices() {
            Ok(devices) => {
                for dev in devices {
                    assert!(!dev.name.is_empty());
                }
            }
            Err(e) => println!("Could not enumerate devices: {}", e),
        }
    }
}

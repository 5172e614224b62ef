//! Capture session: the caller-facing handle around one backend instance
//!
//! A session owns exactly one backend and drives it through
//! `Created → Open → Running ⇄ Paused → Stopped → Closed`. All methods take
//! `&self`; share the session through an `Arc` to run `start()` on a worker
//! thread and control it from another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use capkit_backend::{Backend, BackendDescriptor, BackendRegistry, Capabilities, ErrorSink, GlobalRegistry};
use capkit_core::config::validate_filter;
use capkit_core::{
    CaptureConfig, CaptureStats, DeviceDescriptor, Error, OptionValue, PacketRecord, Result,
    SessionState,
};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::pipeline::DeliveryPipeline;
use crate::stats::StatsAccumulator;


#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    /// A thread is inside `backend.start()`
    loop_active: bool,
    loop_thread: Option<ThreadId>,
    /// `cleanup()` was called from inside the capture loop
    close_pending: bool,
    filter: Option<String>,
}

/// Fold generic driver failures into the operation's failure kind
///
/// Errors that already carry a precise kind (invalid parameter, not
/// supported, a specific failure) pass through unchanged.
fn categorize(err: Error, wrap: fn(String) -> Error) -> Error {
    match err {
        Error::Backend(msg) | Error::Internal(msg) => wrap(msg),
        other => other,
    }
}

/// Runs the loop exit bookkeeping when `start()` returns or unwinds
struct LoopExit<'a> {
    session: &'a CaptureSession,
}

impl Drop for LoopExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!(session = %self.session.id, "Capture loop unwinding");
        }
        self.session.exit_loop();
    }
}

/// A capture session bound to one device and one backend instance
pub struct CaptureSession {
    id: Uuid,
    config: CaptureConfig,
    descriptor: Arc<BackendDescriptor>,
    /// `None` once released by `cleanup()`
    backend: RwLock<Option<Arc<dyn Backend>>>,
    inner: Mutex<SessionInner>,
    loop_exited: Condvar,
    /// Shared with the delivery pipeline of the running loop
    paused: AtomicBool,
    stats: StatsAccumulator,
}

impl CaptureSession {
    /// Open a session using the process-wide backend registry
    pub fn init(config: CaptureConfig) -> Result<Self> {
        Self::init_with(config, GlobalRegistry::instance(), ErrorSink::new())
    }

    /// Open a session resolving the backend in `registry`
    ///
    /// Validates the configuration, creates the backend instance, initialises
    /// it, opens the device and applies the configured filter. On any failure
    /// the partly built backend is closed and cleaned up before the error is
    /// returned.
    pub fn init_with(
        config: CaptureConfig,
        registry: &BackendRegistry,
        errors: ErrorSink,
    ) -> Result<Self> {
        config.validate()?;

        let descriptor = registry.get(&config.backend)?;
        let backend: Arc<dyn Backend> = Arc::from(descriptor.instantiate(errors)?);
        let id = Uuid::now_v7();

        debug!(session = %id, backend = %config.backend, "Initialising backend");
        if let Err(e) = backend.init(&config) {
            backend.cleanup();
            return Err(categorize(e, Error::InitFailed));
        }

        let session = Self {
            id,
            descriptor,
            backend: RwLock::new(Some(Arc::clone(&backend))),
            inner: Mutex::new(SessionInner {
                state: SessionState::Created,
                loop_active: false,
                loop_thread: None,
                close_pending: false,
                filter: None,
            }),
            loop_exited: Condvar::new(),
            paused: AtomicBool::new(false),
            stats: StatsAccumulator::new(),
            config,
        };

        if let Err(e) = backend.open(&session.config.device) {
            error!(session = %id, device = %session.config.device, error = %e, "Failed to open device");
            session.discard(&backend);
            return Err(categorize(e, Error::OpenFailed));
        }

        if let Some(filter) = session.config.filter.as_deref() {
            if let Err(e) = backend.set_filter(filter) {
                error!(session = %id, filter = filter, error = %e, "Failed to apply filter");
                if let Err(close_err) = backend.close() {
                    warn!(session = %id, error = %close_err, "Failed to close device");
                }
                session.discard(&backend);
                return Err(categorize(e, Error::SetFilterFailed));
            }
        }

        {
            let mut inner = session.inner.lock();
            inner.filter = session.config.filter.clone();
            inner.state = SessionState::Open;
        }

        info!(
            session = %id,
            backend = %session.config.backend,
            device = %session.config.device,
            "Capture session opened"
        );
        Ok(session)
    }

    /// Release a backend from a session that never reached `Open`
    fn discard(&self, backend: &Arc<dyn Backend>) {
        backend.cleanup();
        self.backend.write().take();
        self.inner.lock().state = SessionState::Closed;
    }

    fn backend(&self) -> Result<Arc<dyn Backend>> {
        self.backend
            .read()
            .clone()
            .ok_or_else(|| Error::internal("backend already released"))
    }

    /// Unique identifier of this session
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configuration the session was opened with
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Descriptor of the backend driving this session
    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Get current session state
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Active filter expression
    pub fn filter(&self) -> Option<String> {
        self.inner.lock().filter.clone()
    }

    /// Check a backend feature by name
    pub fn is_feature_supported(&self, feature: &str) -> bool {
        self.descriptor.is_feature_supported(feature)
    }

    /// Run the capture loop, calling `callback` for every frame
    ///
    /// Blocks until `stop()` is called, the callback returns `false`, or the
    /// driver fails; the session is `Stopped` afterwards. Calling `start()`
    /// while the loop already runs returns immediately.
    pub fn start<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(&PacketRecord<'_>) -> bool,
    {
        let backend = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Open => {}
                SessionState::Running => {
                    debug!(session = %self.id, "Capture already running");
                    return Ok(());
                }
                state => return Err(Error::invalid_state("start", state)),
            }
            let backend = self.backend()?;

            inner.state = SessionState::Running;
            inner.loop_active = true;
            inner.loop_thread = Some(thread::current().id());
            self.paused.store(false, Ordering::Release);
            self.stats.mark_started();
            backend
        };

        info!(session = %self.id, device = %self.config.device, "Capture started");

        let (result, stopped_by_callback) = {
            let _exit = LoopExit { session: self };
            let mut pipeline = DeliveryPipeline::new(callback, &self.stats, &self.paused);
            let result = backend.start(&mut pipeline);
            drop(backend);
            (result, pipeline.stop_requested())
        };

        match result {
            Ok(()) => {
                info!(
                    session = %self.id,
                    packets = self.stats.packets_received(),
                    stopped_by_callback,
                    "Capture finished"
                );
                Ok(())
            }
            Err(e) => {
                error!(session = %self.id, error = %e, "Capture loop failed");
                Err(categorize(e, Error::StartFailed))
            }
        }
    }

    /// Make a running `start()` return
    ///
    /// Callable from any thread; does not wait for the loop to exit. On an
    /// `Open` session this succeeds and leaves the state unchanged.
    pub fn stop(&self) -> Result<()> {
        let backend = {
            let inner = self.inner.lock();
            match inner.state {
                SessionState::Running | SessionState::Paused => {}
                SessionState::Open | SessionState::Stopped => return Ok(()),
                state => return Err(Error::invalid_state("stop", state)),
            }
            self.backend()?
        };

        backend
            .stop()
            .map_err(|e| categorize(e, Error::StopFailed))?;

        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            inner.state = SessionState::Stopped;
            self.stats.mark_stopped();
            info!(session = %self.id, "Capture stopped");
        }
        Ok(())
    }

    /// Withhold frames from the callback without ending the loop
    pub fn pause(&self) -> Result<()> {
        let backend = {
            let inner = self.inner.lock();
            match inner.state {
                SessionState::Running => {}
                SessionState::Paused | SessionState::Open | SessionState::Stopped => {
                    return Ok(())
                }
                state => return Err(Error::invalid_state("pause", state)),
            }
            if !self.descriptor.supports(Capabilities::PAUSE) {
                return Err(Error::not_supported(format!(
                    "pause on backend '{}'",
                    self.descriptor.name()
                )));
            }
            self.backend()?
        };

        backend
            .pause()
            .map_err(|e| categorize(e, Error::PauseFailed))?;

        let mut inner = self.inner.lock();
        if inner.state == SessionState::Running {
            inner.state = SessionState::Paused;
            self.paused.store(true, Ordering::Release);
            debug!(session = %self.id, "Capture paused");
        }
        Ok(())
    }

    /// Deliver frames to the callback again
    pub fn resume(&self) -> Result<()> {
        let backend = {
            let inner = self.inner.lock();
            match inner.state {
                SessionState::Paused => {}
                SessionState::Running | SessionState::Open | SessionState::Stopped => {
                    return Ok(())
                }
                state => return Err(Error::invalid_state("resume", state)),
            }
            self.backend()?
        };

        backend
            .resume()
            .map_err(|e| categorize(e, Error::ResumeFailed))?;

        let mut inner = self.inner.lock();
        if inner.state == SessionState::Paused {
            inner.state = SessionState::Running;
            self.paused.store(false, Ordering::Release);
            debug!(session = %self.id, "Capture resumed");
        }
        Ok(())
    }

    /// Install a filter expression
    ///
    /// Allowed while `Open`, and while `Running` if the backend supports live
    /// filter changes.
    pub fn set_filter(&self, expr: &str) -> Result<()> {
        validate_filter(expr)?;

        let backend = {
            let inner = self.inner.lock();
            match inner.state {
                SessionState::Open => {}
                SessionState::Running => {
                    if !self.descriptor.supports(Capabilities::LIVE_FILTER) {
                        return Err(Error::not_supported(format!(
                            "live filter on backend '{}'",
                            self.descriptor.name()
                        )));
                    }
                }
                state => return Err(Error::invalid_state("set_filter", state)),
            }
            self.backend()?
        };

        backend
            .set_filter(expr)
            .map_err(|e| categorize(e, Error::SetFilterFailed))?;

        self.inner.lock().filter = Some(expr.to_string());
        info!(session = %self.id, filter = expr, "Filter set");
        Ok(())
    }

    /// Merged statistics snapshot
    ///
    /// After `cleanup()` the last snapshot taken before release is returned.
    pub fn get_stats(&self) -> Result<CaptureStats> {
        let backend = {
            let inner = self.inner.lock();
            match inner.state {
                SessionState::Created => return Err(Error::invalid_state("get_stats", inner.state)),
                SessionState::Closed => return Ok(self.stats.last()),
                _ => {}
            }
            self.backend()?
        };

        let driver = match backend.get_stats() {
            Ok(stats) => Some(stats),
            Err(e) if e.is_not_supported() => None,
            Err(e) => return Err(categorize(e, Error::GetStatsFailed)),
        };
        Ok(self.stats.merge(driver.as_ref()))
    }

    /// Devices visible to this session's backend
    pub fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        self.live_backend("enumerate_devices")?
            .enumerate_devices()
            .map_err(|e| categorize(e, Error::GetDevicesFailed))
    }

    /// Set an ad hoc backend option
    pub fn set_option(&self, name: &str, value: OptionValue) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::invalid_param("name", "option name is empty"));
        }
        self.live_backend("set_option")?.set_option(name, value)
    }

    /// Read an ad hoc backend option
    pub fn get_option(&self, name: &str) -> Result<OptionValue> {
        self.live_backend("get_option")?.get_option(name)
    }

    fn live_backend(&self, operation: &'static str) -> Result<Arc<dyn Backend>> {
        let inner = self.inner.lock();
        match inner.state {
            SessionState::Created | SessionState::Closed => {
                Err(Error::invalid_state(operation, inner.state))
            }
            _ => self.backend(),
        }
    }

    /// Stop, wait for the capture loop, then close and release the backend
    ///
    /// Valid in every state and idempotent. Called from inside the capture
    /// callback, the release is deferred until the loop has returned.
    pub fn cleanup(&self) {
        if self.state().is_active() {
            if let Err(e) = self.stop() {
                warn!(session = %self.id, error = %e, "Stop before cleanup failed");
            }
        }

        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return;
        }

        if inner.loop_active {
            if inner.loop_thread == Some(thread::current().id()) {
                debug!(session = %self.id, "Cleanup requested from capture loop, deferring");
                inner.close_pending = true;
                return;
            }
            while inner.loop_active {
                self.loop_exited.wait(&mut inner);
            }
            if inner.state.is_terminal() {
                return;
            }
        }

        self.release(&mut inner);
    }

    /// Leave the capture loop: reset loop bookkeeping and wake `cleanup()`
    fn exit_loop(&self) {
        self.stats.mark_stopped();
        {
            let mut inner = self.inner.lock();
            inner.loop_active = false;
            inner.loop_thread = None;
            if inner.state.is_active() {
                inner.state = SessionState::Stopped;
            }
            self.paused.store(false, Ordering::Release);

            if std::mem::take(&mut inner.close_pending) {
                debug!(session = %self.id, "Releasing backend deferred from capture loop");
                self.release(&mut inner);
            }
        }
        self.loop_exited.notify_all();
    }

    /// Close and drop the backend; caller holds the session lock
    fn release(&self, inner: &mut SessionInner) {
        let backend = self.backend.write().take();
        if let Some(backend) = backend {
            let driver = backend.get_stats().ok();
            self.stats.mark_stopped();
            self.stats.merge(driver.as_ref());

            if let Err(e) = backend.close() {
                warn!(session = %self.id, error = %e, "Failed to close device");
            }
            backend.cleanup();
        }

        inner.state = SessionState::Closed;
        info!(session = %self.id, "Capture session closed");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("backend", &self.config.backend)
            .field("device", &self.config.device)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

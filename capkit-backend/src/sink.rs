//! Observer hook for non-fatal driver diagnostics

use std::fmt;
use std::sync::Arc;

use capkit_core::Error;
use tracing::warn;

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Where a backend reports human-readable diagnostics
///
/// Every report is logged through `tracing`; the optional hook additionally
/// forwards it to the caller. The `Result` returned by the failing operation
/// stays the authoritative signal.
#[derive(Clone, Default)]
pub struct ErrorSink {
    backend: Option<Arc<str>>,
    hook: Option<Hook>,
}

impl ErrorSink {
    /// Sink that only logs
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that logs and forwards to `hook`
    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            backend: None,
            hook: Some(Arc::new(hook)),
        }
    }

    /// Copy of this sink tagged with a backend name for log context
    pub fn scoped(&self, backend: &str) -> Self {
        Self {
            backend: Some(Arc::from(backend)),
            hook: self.hook.clone(),
        }
    }

    /// True if a caller hook is installed
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Report a diagnostic message
    pub fn report(&self, message: &str) {
        warn!(
            backend = self.backend.as_deref().unwrap_or("-"),
            "{}", message
        );
        if let Some(hook) = &self.hook {
            hook(message);
        }
    }

    /// Report an error and hand it back, for use in `map_err` chains
    pub fn report_error(&self, err: Error) -> Error {
        self.report(&err.to_string());
        err
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink")
            .field("backend", &self.backend)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

//! Capture session lifecycle states

use std::fmt;

/// Lifecycle state of a capture session
///
/// `Created → Open → Running ⇄ Paused → Stopped → Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Backend instance exists but the device is not open yet
    Created,
    /// Device is open, no capture loop has run
    Open,
    /// Capture loop is delivering frames
    Running,
    /// Capture loop is alive but frames are withheld from the callback
    Paused,
    /// Capture loop has ended
    Stopped,
    /// Backend released; terminal
    Closed,
}

impl SessionState {
    /// True while a capture loop is (logically) active
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }

    /// True once the backend has been released
    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "Created",
            SessionState::Open => "Open",
            SessionState::Running => "Running",
            SessionState::Paused => "Paused",
            SessionState::Stopped => "Stopped",
            SessionState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

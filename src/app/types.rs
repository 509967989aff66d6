use crate::error::FatalError;
use std::fmt;

/// Why a streaming session was torn down
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Fatal(FatalError),
    ServerExited(String),
    UserRequest,
}

impl ShutdownReason {
    /// Whether the session ended because something broke
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ShutdownReason::Fatal(_) | ShutdownReason::ServerExited(_)
        )
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(signal) => write!(f, "received {}", signal),
            ShutdownReason::Fatal(error) => write!(f, "fatal error: {}", error),
            ShutdownReason::ServerExited(details) => write!(f, "stream server exited: {}", details),
            ShutdownReason::UserRequest => write!(f, "user request"),
        }
    }
}

use std::fmt;
use thiserror::Error;

/// Why the statistics engine refused an event at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The engine lifecycle has been cancelled or the worker has stopped
    Inactive,
    /// The bounded submission queue has no free slot
    QueueFull,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Inactive => write!(f, "engine is not active"),
            RejectReason::QueueFull => write!(f, "event queue is full"),
        }
    }
}

/// Fatal conditions reported to the owning supervisor.
///
/// Once one of these has been reported the streaming session can no longer
/// guarantee consistent statistics and must be torn down and rebuilt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("Statistic event '{event}' rejected: {reason}")]
    SubmissionRejected {
        reason: RejectReason,
        event: &'static str,
    },

    #[error("Statistics actor failed while processing '{event}': {details}")]
    ActorFailure { event: &'static str, details: String },
}

impl FatalError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            FatalError::SubmissionRejected { .. } => "submission_rejected",
            FatalError::ActorFailure { .. } => "actor_failure",
        }
    }
}

/// HTTP adapter errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to bind stream server to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream server failed: {details}")]
    StartupFailed { details: String },
}

#[derive(Error, Debug)]
pub enum FramecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Fatal error: {0}")]
    Fatal(#[from] FatalError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl FramecastError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FramecastError>;

#[cfg(feature = "streaming")]
pub mod app;
pub mod clock;
pub mod config;
pub mod distribution;
pub mod error;
pub mod frame;
pub mod notification;
pub mod statistics;

#[cfg(feature = "streaming")]
pub mod streaming;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FramecastConfig;
pub use distribution::{
    frame_channel, FrameHub, FrameReceiver, FrameSender, FrameSink, OfferOutcome,
};
pub use error::{FatalError, FramecastError, RejectReason, Result};
pub use frame::Frame;
pub use notification::{NotificationGenerator, NotificationType};
pub use statistics::{
    ClientSnapshot, StatisticEvent, StatisticsEngine, StatisticsEngineBuilder, StatisticsHandle,
    StatisticsReport, TrafficSample,
};

#[cfg(feature = "streaming")]
pub use app::{FramecastOrchestrator, ShutdownReason};

#[cfg(feature = "streaming")]
pub use streaming::{StreamServer, StreamServerBuilder};

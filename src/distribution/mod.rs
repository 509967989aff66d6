mod channel;
mod hub;
mod stats;

pub use channel::{frame_channel, FrameReceiver, FrameSender, FrameSink, OfferOutcome};
pub use hub::FrameHub;
pub use stats::{DistributionStats, DistributionStatsSnapshot};

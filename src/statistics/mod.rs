mod engine;
mod reporting;
mod state;
mod types;

pub use engine::{StatisticsEngine, StatisticsEngineBuilder, StatisticsHandle};
pub use reporting::{error_channel, ErrorReporter, StatisticsObserver};
pub use state::{ProcessingError, StatisticsState, TRAFFIC_BUCKET_MILLIS};
pub use types::{client_id, ClientSnapshot, StatisticEvent, StatisticsReport, TrafficSample};

use super::types::{ClientSnapshot, StatisticsReport, TrafficSample};
use crate::error::FatalError;
use tokio::sync::{mpsc, watch};

/// Receives a projection of the engine state once per reporting tick.
///
/// Called on the engine's worker task; implementations must not block.
pub trait StatisticsObserver: Send + Sync + 'static {
    fn on_statistic(&self, clients: Vec<ClientSnapshot>, traffic: Vec<TrafficSample>);
}

impl<F> StatisticsObserver for F
where
    F: Fn(Vec<ClientSnapshot>, Vec<TrafficSample>) + Send + Sync + 'static,
{
    fn on_statistic(&self, clients: Vec<ClientSnapshot>, traffic: Vec<TrafficSample>) {
        self(clients, traffic)
    }
}

/// Keeps only the latest report for readers that poll
impl StatisticsObserver for watch::Sender<StatisticsReport> {
    fn on_statistic(&self, clients: Vec<ClientSnapshot>, traffic: Vec<TrafficSample>) {
        self.send_replace(StatisticsReport { clients, traffic });
    }
}

/// Forwards every report to a channel
impl StatisticsObserver for mpsc::UnboundedSender<StatisticsReport> {
    fn on_statistic(&self, clients: Vec<ClientSnapshot>, traffic: Vec<TrafficSample>) {
        let _ = self.send(StatisticsReport { clients, traffic });
    }
}

/// Supervisor side of the fatal error contract
pub trait ErrorReporter: Send + Sync + 'static {
    fn on_error(&self, error: FatalError);
}

impl<F> ErrorReporter for F
where
    F: Fn(FatalError) + Send + Sync + 'static,
{
    fn on_error(&self, error: FatalError) {
        self(error)
    }
}

impl ErrorReporter for mpsc::UnboundedSender<FatalError> {
    fn on_error(&self, error: FatalError) {
        let _ = self.send(error);
    }
}

/// Channel a supervisor can await fatal errors on
pub fn error_channel() -> (
    mpsc::UnboundedSender<FatalError>,
    mpsc::UnboundedReceiver<FatalError>,
) {
    mpsc::unbounded_channel()
}

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

/// Events processed by the statistics engine, strictly in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatisticEvent {
    /// A client opened a stream
    Connected(SocketAddr),
    /// A client stream ended
    Disconnected(SocketAddr),
    /// A client's frame channel could not keep up
    Backpressure(SocketAddr),
    /// Bytes written to a client since the last report
    NextBytes(SocketAddr, u64),
    /// Evict expired clients and fold byte counters into a new traffic sample
    CalculateTraffic,
    /// Project the current state and hand it to the observer
    SendStatistic,
}

impl StatisticEvent {
    /// Event name used in logs and error reports
    pub fn name(&self) -> &'static str {
        match self {
            StatisticEvent::Connected(_) => "Connected",
            StatisticEvent::Disconnected(_) => "Disconnected",
            StatisticEvent::Backpressure(_) => "Backpressure",
            StatisticEvent::NextBytes(..) => "NextBytes",
            StatisticEvent::CalculateTraffic => "CalculateTraffic",
            StatisticEvent::SendStatistic => "SendStatistic",
        }
    }

    /// Client address carried by the event, if any
    pub fn address(&self) -> Option<SocketAddr> {
        match self {
            StatisticEvent::Connected(addr)
            | StatisticEvent::Disconnected(addr)
            | StatisticEvent::Backpressure(addr)
            | StatisticEvent::NextBytes(addr, _) => Some(*addr),
            StatisticEvent::CalculateTraffic | StatisticEvent::SendStatistic => None,
        }
    }
}

impl fmt::Display for StatisticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address() {
            Some(addr) => write!(f, "{}({})", self.name(), addr),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// Point-in-time view of one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub id: u64,
    pub address: String,
    pub is_slow_connection: bool,
    pub is_disconnected: bool,
}

/// Aggregate bytes sent to all clients during one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrafficSample {
    pub timestamp_millis: u64,
    pub bytes: u64,
}

impl TrafficSample {
    pub fn new(timestamp_millis: u64, bytes: u64) -> Self {
        Self {
            timestamp_millis,
            bytes,
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_millis as i64).single()
    }
}

/// One reporting tick: clients ordered by id, traffic ordered by time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsReport {
    pub clients: Vec<ClientSnapshot>,
    pub traffic: Vec<TrafficSample>,
}

impl StatisticsReport {
    pub fn connected_clients(&self) -> usize {
        self.clients.iter().filter(|c| !c.is_disconnected).count()
    }

    pub fn slow_clients(&self) -> usize {
        self.clients.iter().filter(|c| c.is_slow_connection).count()
    }

    /// Bytes in the most recent traffic bucket
    pub fn latest_bytes(&self) -> u64 {
        self.traffic.last().map(|s| s.bytes).unwrap_or(0)
    }
}

/// Stable identifier derived from a client address
pub fn client_id(address: &SocketAddr) -> u64 {
    let mut hasher = DefaultHasher::new();
    address.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_is_stable_per_address() {
        let a: SocketAddr = "192.168.1.10:50000".parse().unwrap();
        let b: SocketAddr = "192.168.1.10:50001".parse().unwrap();

        assert_eq!(client_id(&a), client_id(&a));
        assert_ne!(client_id(&a), client_id(&b));
    }

    #[test]
    fn test_event_display() {
        let addr: SocketAddr = "10.0.0.1:8000".parse().unwrap();

        assert_eq!(
            StatisticEvent::NextBytes(addr, 10).to_string(),
            "NextBytes(10.0.0.1:8000)"
        );
        assert_eq!(StatisticEvent::SendStatistic.to_string(), "SendStatistic");
        assert_eq!(StatisticEvent::CalculateTraffic.address(), None);
    }

    #[test]
    fn test_report_summaries() {
        let report = StatisticsReport {
            clients: vec![
                ClientSnapshot {
                    id: 1,
                    address: "10.0.0.1:1".to_string(),
                    is_slow_connection: true,
                    is_disconnected: false,
                },
                ClientSnapshot {
                    id: 2,
                    address: "10.0.0.1:2".to_string(),
                    is_slow_connection: false,
                    is_disconnected: true,
                },
            ],
            traffic: vec![TrafficSample::new(1_000, 5), TrafficSample::new(2_000, 9)],
        };

        assert_eq!(report.connected_clients(), 1);
        assert_eq!(report.slow_clients(), 1);
        assert_eq!(report.latest_bytes(), 9);
        assert!(report.traffic[0].datetime().is_some());
    }
}

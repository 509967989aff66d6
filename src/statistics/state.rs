use super::types::{client_id, ClientSnapshot, StatisticEvent, StatisticsReport, TrafficSample};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Bucket width of the traffic history
pub const TRAFFIC_BUCKET_MILLIS: u64 = 1_000;

/// Failure while applying one event; the state must not be used afterwards
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("byte counter overflow for client {address}")]
    ByteCounterOverflow { address: SocketAddr },

    #[error("traffic sum overflow across {clients} clients")]
    TrafficOverflow { clients: usize },
}

#[derive(Debug, Clone)]
struct Client {
    address: SocketAddr,
    is_slow_connection: bool,
    is_disconnected: bool,
    send_bytes: u64,
    disconnected_time: u64,
}

impl Client {
    fn new(address: SocketAddr) -> Self {
        Self {
            address,
            is_slow_connection: false,
            is_disconnected: false,
            send_bytes: 0,
            disconnected_time: 0,
        }
    }

    fn is_expired(&self, now: u64, hold_time_millis: u64) -> bool {
        self.is_disconnected && now.saturating_sub(self.disconnected_time) > hold_time_millis
    }

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            id: client_id(&self.address),
            address: self.address.to_string(),
            is_slow_connection: self.is_slow_connection,
            is_disconnected: self.is_disconnected,
        }
    }
}

/// Client table and traffic window owned by the statistics worker.
///
/// All transitions go through [`StatisticsState::apply`]; nothing else
/// mutates the state.
#[derive(Debug)]
pub struct StatisticsState {
    clients: HashMap<SocketAddr, Client>,
    traffic: VecDeque<TrafficSample>,
    hold_time_millis: u64,
}

impl StatisticsState {
    /// Create an empty client table and a zero-filled window of
    /// `history_len` buckets ending one bucket before `now_millis`
    pub fn new(history_len: usize, hold_time: Duration, now_millis: u64) -> Self {
        let history_len = history_len.max(1);
        let past = now_millis.saturating_sub(history_len as u64 * TRAFFIC_BUCKET_MILLIS);

        let traffic = (0..history_len as u64)
            .map(|i| TrafficSample::new(past + i * TRAFFIC_BUCKET_MILLIS, 0))
            .collect();

        debug!(
            "Created statistics state with {} traffic buckets and {:?} hold time",
            history_len, hold_time
        );

        Self {
            clients: HashMap::new(),
            traffic,
            hold_time_millis: hold_time.as_millis() as u64,
        }
    }

    /// Apply one event. Returns a report for `SendStatistic`.
    pub fn apply(
        &mut self,
        event: &StatisticEvent,
        now_millis: u64,
    ) -> Result<Option<StatisticsReport>, ProcessingError> {
        match event {
            StatisticEvent::Connected(addr) => {
                self.clients.insert(*addr, Client::new(*addr));
            }

            StatisticEvent::Disconnected(addr) => match self.clients.get_mut(addr) {
                Some(client) => {
                    client.is_disconnected = true;
                    client.disconnected_time = now_millis;
                }
                None => trace!("Disconnected for unknown client {}", addr),
            },

            StatisticEvent::Backpressure(addr) => match self.clients.get_mut(addr) {
                Some(client) => client.is_slow_connection = true,
                None => trace!("Backpressure for unknown client {}", addr),
            },

            StatisticEvent::NextBytes(addr, count) => match self.clients.get_mut(addr) {
                Some(client) => {
                    client.send_bytes = client
                        .send_bytes
                        .checked_add(*count)
                        .ok_or(ProcessingError::ByteCounterOverflow { address: *addr })?;
                }
                None => trace!("NextBytes for unknown client {}", addr),
            },

            StatisticEvent::CalculateTraffic => self.calculate_traffic(now_millis)?,

            StatisticEvent::SendStatistic => return Ok(Some(self.report())),
        }

        Ok(None)
    }

    fn calculate_traffic(&mut self, now_millis: u64) -> Result<(), ProcessingError> {
        let hold = self.hold_time_millis;
        let before = self.clients.len();
        self.clients.retain(|_, c| !c.is_expired(now_millis, hold));
        if self.clients.len() != before {
            debug!("Evicted {} disconnected clients", before - self.clients.len());
        }

        let clients = self.clients.len();
        let total = self
            .clients
            .values()
            .try_fold(0u64, |sum, c| sum.checked_add(c.send_bytes))
            .ok_or(ProcessingError::TrafficOverflow { clients })?;

        self.clients.values_mut().for_each(|c| c.send_bytes = 0);

        let timestamp = match self.traffic.back() {
            Some(last) => now_millis.max(last.timestamp_millis + 1),
            None => now_millis,
        };
        self.traffic.pop_front();
        self.traffic.push_back(TrafficSample::new(timestamp, total));

        Ok(())
    }

    /// Project clients ordered by id and traffic ordered by time
    pub fn report(&self) -> StatisticsReport {
        let mut clients: Vec<ClientSnapshot> = self.clients.values().map(Client::snapshot).collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.address.cmp(&b.address)));

        let mut traffic: Vec<TrafficSample> = self.traffic.iter().copied().collect();
        traffic.sort_by_key(|s| s.timestamp_millis);

        StatisticsReport { clients, traffic }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.clients.contains_key(address)
    }

    pub fn client(&self, address: &SocketAddr) -> Option<ClientSnapshot> {
        self.clients.get(address).map(Client::snapshot)
    }

    /// Bytes accumulated for a client since the last traffic tick
    pub fn pending_bytes(&self, address: &SocketAddr) -> Option<u64> {
        self.clients.get(address).map(|c| c.send_bytes)
    }

    pub fn history_len(&self) -> usize {
        self.traffic.len()
    }

    pub fn latest_sample(&self) -> Option<TrafficSample> {
        self.traffic.back().copied()
    }
}

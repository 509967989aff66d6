use super::channel::{frame_channel, FrameReceiver, FrameSender, FrameSink, OfferOutcome};
use super::stats::{DistributionStats, DistributionStatsSnapshot};
use crate::frame::Frame;
use crate::statistics::{StatisticEvent, StatisticsHandle};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace};

/// Fans frames out to one bounded channel per connected client.
///
/// A client whose channel is full misses the frame and is flagged as a
/// slow connection; the hub never waits on a consumer.
pub struct FrameHub {
    clients: RwLock<HashMap<SocketAddr, ClientChannel>>,
    channel_capacity: usize,
    statistics: Option<StatisticsHandle>,
    closed: AtomicBool,
    stats: DistributionStats,
}

/// A client's sender plus whether it has been reported slow since it
/// registered
struct ClientChannel {
    sender: FrameSender,
    slow_reported: AtomicBool,
}

impl ClientChannel {
    fn new(sender: FrameSender) -> Self {
        Self {
            sender,
            slow_reported: AtomicBool::new(false),
        }
    }
}

impl FrameHub {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            channel_capacity: channel_capacity.max(1),
            statistics: None,
            closed: AtomicBool::new(false),
            stats: DistributionStats::default(),
        }
    }

    /// Report slow consumers to a statistics engine
    pub fn with_statistics(mut self, statistics: StatisticsHandle) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Open a channel for a client, replacing any previous one for the address
    pub fn register(&self, address: SocketAddr) -> FrameReceiver {
        let (sender, receiver) = frame_channel(self.channel_capacity);

        if self.closed.load(Ordering::SeqCst) {
            debug!("Hub closed, rejecting client {}", address);
            return receiver;
        }

        if self
            .clients
            .write()
            .insert(address, ClientChannel::new(sender))
            .is_some()
        {
            debug!("Replaced frame channel for client {}", address);
        }
        info!(
            "Registered frame channel for client {} ({} clients)",
            address,
            self.client_count()
        );
        receiver
    }

    /// Drop a client's channel; its receiver drains then ends
    pub fn unregister(&self, address: &SocketAddr) -> bool {
        let removed = self.clients.write().remove(address).is_some();
        if removed {
            debug!("Unregistered frame channel for client {}", address);
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn stats(&self) -> DistributionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Drop every channel and refuse new registrations
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let count = {
            let mut clients = self.clients.write();
            let count = clients.len();
            clients.clear();
            count
        };
        info!("Frame hub closed ({} channels dropped)", count);
    }

    fn report_backpressure(&self, address: SocketAddr) {
        if let Some(statistics) = &self.statistics {
            // A rejected submission is already reported to the supervisor
            let _ = statistics.submit(StatisticEvent::Backpressure(address));
        }
    }
}

impl FrameSink for FrameHub {
    /// Offer a frame to every client.
    ///
    /// Returns `Delivered` if at least one client took it, `Full` if clients
    /// exist but none had room, and `Closed` when there is nobody to serve.
    fn offer(&self, frame: Frame) -> OfferOutcome {
        if self.closed.load(Ordering::SeqCst) {
            return OfferOutcome::Closed;
        }
        self.stats.record_offer();

        let mut delivered = 0usize;
        let mut full = 0usize;
        let mut gone = Vec::new();

        {
            let clients = self.clients.read();
            for (address, client) in clients.iter() {
                match client.sender.offer(frame.clone()) {
                    OfferOutcome::Delivered => {
                        delivered += 1;
                        self.stats.record_delivered();
                    }
                    OfferOutcome::Full => {
                        full += 1;
                        self.stats.record_dropped();
                        trace!("Dropped frame {} for slow client {}", frame.id, address);
                        // One report per registration; the flag is sticky in the engine
                        if !client.slow_reported.swap(true, Ordering::SeqCst) {
                            self.report_backpressure(*address);
                        }
                    }
                    OfferOutcome::Closed => gone.push(*address),
                }
            }
        }

        if !gone.is_empty() {
            let mut clients = self.clients.write();
            for address in gone {
                // The entry may have been replaced by a reconnect in between
                if clients
                    .get(&address)
                    .is_some_and(|client| client.sender.is_closed())
                {
                    clients.remove(&address);
                    self.stats.record_closed();
                    debug!("Removed closed frame channel for client {}", address);
                }
            }
        }

        if delivered > 0 {
            OfferOutcome::Delivered
        } else if full > 0 {
            OfferOutcome::Full
        } else {
            OfferOutcome::Closed
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

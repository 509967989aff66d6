use crate::distribution::{FrameHub, FrameReceiver};
use crate::error::FatalError;
use crate::statistics::{StatisticEvent, StatisticsHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// One connected stream viewer.
///
/// Opening a session registers the client with the hub and the statistics
/// engine; dropping it unregisters and reports the disconnect.
pub struct ClientSession {
    address: SocketAddr,
    hub: Arc<FrameHub>,
    statistics: StatisticsHandle,
    bytes_sent: u64,
}

impl ClientSession {
    pub fn open(
        address: SocketAddr,
        hub: Arc<FrameHub>,
        statistics: StatisticsHandle,
    ) -> Result<(Self, FrameReceiver), FatalError> {
        let receiver = hub.register(address);

        let session = Self {
            address,
            hub,
            statistics,
            bytes_sent: 0,
        };
        session
            .statistics
            .submit(StatisticEvent::Connected(address))?;

        info!("Stream client {} connected", address);
        Ok((session, receiver))
    }

    /// Account bytes written to the client
    pub fn record_bytes(&mut self, bytes: u64) -> Result<(), FatalError> {
        self.bytes_sent = self.bytes_sent.saturating_add(bytes);
        self.statistics
            .submit(StatisticEvent::NextBytes(self.address, bytes))
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.hub.unregister(&self.address);

        // A stopped engine has already been torn down by its supervisor
        if self.statistics.is_active() {
            let _ = self
                .statistics
                .submit(StatisticEvent::Disconnected(self.address));
        }

        debug!(
            "Stream client {} disconnected after {} bytes",
            self.address, self.bytes_sent
        );
    }
}

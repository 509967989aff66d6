use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for frame fan-out
#[derive(Debug, Default)]
pub struct DistributionStats {
    pub frames_offered: AtomicU64,
    pub frames_delivered: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub consumers_closed: AtomicU64,
}

impl DistributionStats {
    pub(crate) fn record_offer(&self) {
        self.frames_offered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_closed(&self) {
        self.consumers_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DistributionStatsSnapshot {
        DistributionStatsSnapshot {
            frames_offered: self.frames_offered.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            consumers_closed: self.consumers_closed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DistributionStatsSnapshot {
    pub frames_offered: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub consumers_closed: u64,
}

impl DistributionStatsSnapshot {
    /// Share of per-client deliveries that were dropped
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_delivered + self.frames_dropped;
        if total > 0 {
            self.frames_dropped as f64 / total as f64
        } else {
            0.0
        }
    }
}

use crate::frame::Frame;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Result of a non-blocking frame offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// The frame was queued for the consumer
    Delivered,
    /// The consumer is behind; the frame was dropped
    Full,
    /// The consumer has gone away; the frame was dropped
    Closed,
}

/// Anything frames can be offered into without blocking
pub trait FrameSink: Send + Sync {
    fn offer(&self, frame: Frame) -> OfferOutcome;

    fn is_closed(&self) -> bool;
}

/// Create a bounded per-consumer frame channel
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (FrameSender { inner: sender }, FrameReceiver { inner: receiver })
}

/// Producer side of a frame channel
#[derive(Debug, Clone)]
pub struct FrameSender {
    inner: mpsc::Sender<Frame>,
}

impl FrameSender {
    /// Free slots left in the channel
    pub fn available(&self) -> usize {
        self.inner.capacity()
    }
}

impl FrameSink for FrameSender {
    fn offer(&self, frame: Frame) -> OfferOutcome {
        match self.inner.try_send(frame) {
            Ok(()) => OfferOutcome::Delivered,
            Err(TrySendError::Full(_)) => OfferOutcome::Full,
            Err(TrySendError::Closed(_)) => OfferOutcome::Closed,
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Consumer side of a frame channel, drained by the transport
#[derive(Debug)]
pub struct FrameReceiver {
    inner: mpsc::Receiver<Frame>,
}

impl FrameReceiver {
    /// Wait for the next frame; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inner.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inner.try_recv().ok()
    }

    /// Stop accepting frames; already queued frames can still be drained
    pub fn close(&mut self) {
        self.inner.close();
    }
}

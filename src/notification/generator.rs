use super::render::NotificationRenderer;
use crate::config::NotificationConfig;
use crate::distribution::{FrameSink, OfferOutcome};
use crate::error::{FramecastError, Result};
use crate::frame::Frame;
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Copies of a notification frame offered per publish. Some MJPEG
/// clients only paint a frame once the next one arrives.
pub const NOTIFICATION_REPEATS: usize = 3;

/// Informational screens shown to stream viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// Streaming has not been started on the device yet
    Start,
    /// The viewer should reload the page
    ReloadPage,
    /// The stream moved to another address
    NewAddress,
}

impl NotificationType {
    pub const ALL: [NotificationType; 3] = [
        NotificationType::Start,
        NotificationType::ReloadPage,
        NotificationType::NewAddress,
    ];

    /// Text drawn for this notification
    pub fn message<'a>(&self, config: &'a NotificationConfig) -> &'a str {
        match self {
            NotificationType::Start => &config.start_message,
            NotificationType::ReloadPage => &config.reload_message,
            NotificationType::NewAddress => &config.new_address_message,
        }
    }

    fn index(&self) -> usize {
        match self {
            NotificationType::Start => 0,
            NotificationType::ReloadPage => 1,
            NotificationType::NewAddress => 2,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::Start => write!(f, "start"),
            NotificationType::ReloadPage => write!(f, "reload_page"),
            NotificationType::NewAddress => write!(f, "new_address"),
        }
    }
}

/// Encoded frames for every notification type
/// Result of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Offers made to the sink
    pub offered: usize,
    /// Offers the sink accepted
    pub delivered: usize,
}

#[derive(Debug, Clone)]
pub struct NotificationFrames {
    frames: [Frame; 3],
}

impl NotificationFrames {
    pub fn get(&self, kind: NotificationType) -> &Frame {
        &self.frames[kind.index()]
    }
}

/// Renders notification frames once and publishes them into a frame sink
pub struct NotificationGenerator {
    sink: Arc<dyn FrameSink>,
    renderer: Arc<NotificationRenderer>,
    frames: Arc<OnceCell<NotificationFrames>>,
}

impl NotificationGenerator {
    /// Create a generator and start rendering in the background.
    ///
    /// Fails when a configured font cannot be loaded. Must be called inside
    /// a Tokio runtime.
    pub fn new(
        config: NotificationConfig,
        logo: Option<DynamicImage>,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self> {
        let renderer = Arc::new(NotificationRenderer::new(config, logo)?);
        let frames = Arc::new(OnceCell::new());

        let background_frames = Arc::clone(&frames);
        let background_renderer = Arc::clone(&renderer);
        tokio::spawn(async move {
            if let Err(e) = background_frames
                .get_or_try_init(|| render_all(background_renderer))
                .await
            {
                warn!("Background notification rendering failed: {}", e);
            }
        });

        Ok(Self {
            sink,
            renderer,
            frames,
        })
    }

    /// Whether every notification frame has been rendered
    pub fn is_ready(&self) -> bool {
        self.frames.initialized()
    }

    /// Wait for the rendered frames, rendering them here if needed
    pub async fn frames(&self) -> Result<&NotificationFrames> {
        let renderer = Arc::clone(&self.renderer);
        self.frames.get_or_try_init(|| render_all(renderer)).await
    }

    /// Offer a notification frame to the sink [`NOTIFICATION_REPEATS`] times.
    ///
    /// Nothing is offered when the sink is already closed for sending.
    /// Copies refused by a full sink count as offered but not delivered.
    pub async fn publish(&self, kind: NotificationType) -> Result<PublishOutcome> {
        let frame = self.frames().await?.get(kind);

        if self.sink.is_closed() {
            debug!("Frame sink closed, skipping {} notification", kind);
            return Ok(PublishOutcome::default());
        }

        let mut outcome = PublishOutcome::default();
        for _ in 0..NOTIFICATION_REPEATS {
            outcome.offered += 1;
            if self.sink.offer(frame.clone()) == OfferOutcome::Delivered {
                outcome.delivered += 1;
            }
        }

        debug!(
            "Published {} notification ({}/{} delivered)",
            kind, outcome.delivered, outcome.offered
        );
        Ok(outcome)
    }
}

async fn render_all(renderer: Arc<NotificationRenderer>) -> Result<NotificationFrames> {
    tokio::task::spawn_blocking(move || {
        let config = renderer.config();
        let mut frames = Vec::with_capacity(NotificationType::ALL.len());

        for kind in NotificationType::ALL {
            let data = renderer.render_jpeg(kind.message(config))?;
            frames.push(Frame::new(
                kind.index() as u64,
                data,
                config.width,
                config.height,
            ));
        }

        let frames: [Frame; 3] = frames.try_into().map_err(|_| {
            FramecastError::component("notification", "Unexpected notification frame count")
        })?;
        info!("Rendered {} notification frames", frames.len());
        Ok(NotificationFrames { frames })
    })
    .await
    .map_err(|e| {
        error!("Notification render task failed: {}", e);
        FramecastError::component("notification", format!("Render task failed: {}", e))
    })?
}

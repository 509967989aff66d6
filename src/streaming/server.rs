use crate::{
    config::StreamConfig,
    distribution::FrameHub,
    error::{FramecastError, Result, StreamError},
    notification::NotificationGenerator,
    statistics::{StatisticsHandle, StatisticsReport},
};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::handlers::{mjpeg_stream_handler, stats_handler, stream_page_handler};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) hub: Arc<FrameHub>,
    pub(crate) statistics: StatisticsHandle,
    pub(crate) reports: watch::Receiver<StatisticsReport>,
    pub(crate) notifications: Option<Arc<NotificationGenerator>>,
    pub(crate) target_frame_interval: Duration,
}

/// MJPEG server draining per-client frame channels over HTTP
pub struct StreamServer {
    pub(crate) config: StreamConfig,
    state: ServerState,
}

impl StreamServer {
    pub fn new(
        config: StreamConfig,
        hub: Arc<FrameHub>,
        statistics: StatisticsHandle,
        reports: watch::Receiver<StatisticsReport>,
        notifications: Option<Arc<NotificationGenerator>>,
    ) -> Self {
        let target_frame_interval =
            Duration::from_micros(1_000_000u64 / config.max_fps.max(1) as u64);

        Self {
            config,
            state: ServerState {
                hub,
                statistics,
                reports,
                notifications,
                target_frame_interval,
            },
        }
    }

    /// Routes served by the stream server
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(stream_page_handler))
            .route("/stream.mjpg", get(mjpeg_stream_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.ip, self.config.port);

        TcpListener::bind(&addr).await.map_err(|e| {
            StreamError::BindFailed {
                address: addr.clone(),
                source: e,
            }
            .into()
        })
    }

    /// Serve on a bound listener until the token is cancelled
    pub async fn serve(&self, listener: TcpListener, token: CancellationToken) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("MJPEG server listening on {}", local_addr);

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| StreamError::StartupFailed {
            details: format!("Server error: {}", e),
        })?;

        info!("MJPEG server on {} stopped", local_addr);
        Ok(())
    }

    /// Bind and serve until the token is cancelled
    pub async fn start(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting MJPEG streaming server on {}:{}",
            self.config.ip, self.config.port
        );
        let listener = self.bind().await?;
        self.serve(listener, token).await
    }
}

/// Stream server builder for configuration
pub struct StreamServerBuilder {
    config: Option<StreamConfig>,
    hub: Option<Arc<FrameHub>>,
    statistics: Option<StatisticsHandle>,
    reports: Option<watch::Receiver<StatisticsReport>>,
    notifications: Option<Arc<NotificationGenerator>>,
}

impl StreamServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            hub: None,
            statistics: None,
            reports: None,
            notifications: None,
        }
    }

    /// Set the stream configuration
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn hub(mut self, hub: Arc<FrameHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Statistics engine notified of client traffic
    pub fn statistics(mut self, statistics: StatisticsHandle) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Latest statistics snapshot served on `/stats`
    pub fn reports(mut self, reports: watch::Receiver<StatisticsReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Publish the start notification to each new client
    pub fn notifications(mut self, notifications: Arc<NotificationGenerator>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Build the stream server
    pub fn build(self) -> Result<StreamServer> {
        let config = self.config.ok_or_else(|| {
            FramecastError::Stream(StreamError::StartupFailed {
                details: "Stream configuration is required".to_string(),
            })
        })?;

        let hub = self.hub.ok_or_else(|| {
            FramecastError::Stream(StreamError::StartupFailed {
                details: "Frame hub is required".to_string(),
            })
        })?;

        let statistics = self.statistics.ok_or_else(|| {
            FramecastError::Stream(StreamError::StartupFailed {
                details: "Statistics handle is required".to_string(),
            })
        })?;

        let reports = self.reports.ok_or_else(|| {
            FramecastError::Stream(StreamError::StartupFailed {
                details: "Statistics report receiver is required".to_string(),
            })
        })?;

        Ok(StreamServer::new(
            config,
            hub,
            statistics,
            reports,
            self.notifications,
        ))
    }
}

impl Default for StreamServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

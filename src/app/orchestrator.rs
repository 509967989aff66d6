use super::types::ShutdownReason;
use crate::config::FramecastConfig;
use crate::distribution::FrameHub;
use crate::error::{FatalError, Result};
use crate::notification::{NotificationGenerator, NotificationRenderer};
use crate::statistics::{
    error_channel, ClientSnapshot, StatisticsEngine, StatisticsEngineBuilder, StatisticsHandle,
    StatisticsReport, TrafficSample,
};
use crate::streaming::{StreamServer, StreamServerBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Owns one streaming session: statistics engine, frame hub, notification
/// generator and HTTP server, all tied to a single cancellation token.
pub struct FramecastOrchestrator {
    pub(super) config: FramecastConfig,

    // Components
    pub(super) engine: Option<StatisticsEngine>,
    pub(super) hub: Arc<FrameHub>,
    pub(super) notifications: Arc<NotificationGenerator>,
    pub(super) stream_server: Arc<StreamServer>,
    pub(super) server_task: Option<JoinHandle<Result<()>>>,
    pub(super) local_addr: Option<SocketAddr>,
    pub(super) reports: watch::Receiver<StatisticsReport>,

    // Lifecycle management
    pub(super) error_sender: mpsc::UnboundedSender<FatalError>,
    pub(super) error_receiver: Option<mpsc::UnboundedReceiver<FatalError>>,
    pub(super) shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl FramecastOrchestrator {
    /// Create every component of a session. Must be called inside a Tokio
    /// runtime; the statistics engine starts immediately.
    pub async fn new(config: FramecastConfig) -> Result<Self> {
        config.validate()?;

        let cancellation_token = CancellationToken::new();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (error_sender, error_receiver) = error_channel();
        let (report_sender, reports) = watch::channel(StatisticsReport::default());

        let observer = move |clients: Vec<ClientSnapshot>, traffic: Vec<TrafficSample>| {
            let report = StatisticsReport { clients, traffic };
            debug!(
                "Statistics: {} clients ({} connected, {} slow), {} bytes in last bucket",
                report.clients.len(),
                report.connected_clients(),
                report.slow_clients(),
                report.latest_bytes()
            );
            report_sender.send_replace(report);
        };

        let engine = StatisticsEngineBuilder::new()
            .config(config.statistics.clone())
            .observer(observer)
            .reporter(error_sender.clone())
            .parent_token(cancellation_token.clone())
            .build()?;

        let hub = Arc::new(
            FrameHub::new(config.distribution.channel_capacity).with_statistics(engine.handle()),
        );

        let logo = NotificationRenderer::load_logo(&config.notification);
        let notifications = Arc::new(NotificationGenerator::new(
            config.notification.clone(),
            logo,
            hub.clone(),
        )?);

        let stream_server = Arc::new(
            StreamServerBuilder::new()
                .config(config.stream.clone())
                .hub(Arc::clone(&hub))
                .statistics(engine.handle())
                .reports(reports.clone())
                .notifications(Arc::clone(&notifications))
                .build()?,
        );

        info!("Framecast session {} created", engine.session_id());

        Ok(Self {
            config,
            engine: Some(engine),
            hub,
            notifications,
            stream_server,
            server_task: None,
            local_addr: None,
            reports,
            error_sender,
            error_receiver: Some(error_receiver),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token,
        })
    }

    pub fn config(&self) -> &FramecastConfig {
        &self.config
    }

    /// Submission handle of the running statistics engine
    pub fn statistics(&self) -> Option<StatisticsHandle> {
        self.engine.as_ref().map(|engine| engine.handle())
    }

    pub fn hub(&self) -> Arc<FrameHub> {
        Arc::clone(&self.hub)
    }

    /// Latest statistics snapshot
    pub fn reports(&self) -> watch::Receiver<StatisticsReport> {
        self.reports.clone()
    }

    /// Channel fatal errors are delivered on
    pub fn supervisor(&self) -> mpsc::UnboundedSender<FatalError> {
        self.error_sender.clone()
    }

    /// Address the stream server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

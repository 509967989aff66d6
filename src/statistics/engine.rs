use super::reporting::{ErrorReporter, StatisticsObserver};
use super::state::StatisticsState;
use super::types::StatisticEvent;
use crate::clock::{Clock, SystemClock};
use crate::config::StatisticsConfig;
use crate::error::{FatalError, FramecastError, RejectReason, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Cloneable submission side of a running [`StatisticsEngine`]
#[derive(Clone)]
pub struct StatisticsHandle {
    sender: mpsc::Sender<StatisticEvent>,
    cancellation_token: CancellationToken,
    pending: Arc<AtomicUsize>,
    reporter: Arc<dyn ErrorReporter>,
    queue_depth_warning: usize,
}

impl StatisticsHandle {
    /// Submit an event without waiting.
    ///
    /// A rejected event is reported to the supervisor and returned as an
    /// error; the engine must be treated as unusable afterwards.
    pub fn submit(&self, event: StatisticEvent) -> std::result::Result<(), FatalError> {
        self.enqueue(event).map_err(|error| {
            error!("Failed to submit statistic event: {}", error);
            self.reporter.on_error(error.clone());
            error
        })
    }

    fn enqueue(&self, event: StatisticEvent) -> std::result::Result<(), FatalError> {
        let name = event.name();

        if self.cancellation_token.is_cancelled() {
            return Err(FatalError::SubmissionRejected {
                reason: RejectReason::Inactive,
                event: name,
            });
        }

        let depth = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        match self.sender.try_send(event) {
            Ok(()) => {
                if depth > self.queue_depth_warning {
                    info!("Statistic event queue depth: {} (last: {})", depth, name);
                }
                Ok(())
            }
            Err(e) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                let reason = match e {
                    TrySendError::Full(_) => RejectReason::QueueFull,
                    TrySendError::Closed(_) => RejectReason::Inactive,
                };
                Err(FatalError::SubmissionRejected {
                    reason,
                    event: name,
                })
            }
        }
    }

    /// Number of submitted events not yet processed
    pub fn queue_depth(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether the engine still accepts events
    pub fn is_active(&self) -> bool {
        !self.cancellation_token.is_cancelled() && !self.sender.is_closed()
    }
}

/// Serialized processor owning all client and traffic state.
///
/// One worker task applies events one at a time in submission order; a
/// timer task submits `CalculateTraffic` then `SendStatistic` every tick.
/// Both tasks share one cancellation token.
pub struct StatisticsEngine {
    session_id: Uuid,
    handle: StatisticsHandle,
    cancellation_token: CancellationToken,
    worker: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl StatisticsEngine {
    /// Start an engine with the system clock
    pub fn start<O, R>(config: &StatisticsConfig, observer: O, reporter: R) -> Self
    where
        O: StatisticsObserver,
        R: ErrorReporter,
    {
        StatisticsEngineBuilder::new()
            .config(config.clone())
            .spawn(Arc::new(observer), Arc::new(reporter))
    }

    /// Submission handle for producers
    pub fn handle(&self) -> StatisticsHandle {
        self.handle.clone()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Token governing the engine lifecycle
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Resolves once the engine has stopped, by cancellation or failure
    pub async fn stopped(&self) {
        self.cancellation_token.cancelled().await
    }

    /// Cancel the lifecycle and wait for both tasks to finish
    pub async fn shutdown(mut self) {
        info!("Shutting down statistics engine {}", self.session_id);
        self.cancellation_token.cancel();

        for task in [self.timer.take(), self.worker.take()].into_iter().flatten() {
            if let Err(e) = task.await {
                warn!("Statistics task ended abnormally: {}", e);
            }
        }

        debug!("Statistics engine {} stopped", self.session_id);
    }
}

impl Drop for StatisticsEngine {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// Builder for [`StatisticsEngine`]
pub struct StatisticsEngineBuilder {
    config: StatisticsConfig,
    observer: Option<Arc<dyn StatisticsObserver>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    clock: Arc<dyn Clock>,
    parent_token: Option<CancellationToken>,
}

impl StatisticsEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: StatisticsConfig::default(),
            observer: None,
            reporter: None,
            clock: Arc::new(SystemClock),
            parent_token: None,
        }
    }

    pub fn config(mut self, config: StatisticsConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the report callback
    pub fn observer<O: StatisticsObserver>(mut self, observer: O) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Set the supervisor error callback
    pub fn reporter<R: ErrorReporter>(mut self, reporter: R) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Tie the engine lifecycle to an outer scope
    pub fn parent_token(mut self, token: CancellationToken) -> Self {
        self.parent_token = Some(token);
        self
    }

    /// Validate and start the engine. Must be called inside a Tokio runtime.
    pub fn build(self) -> Result<StatisticsEngine> {
        if self.config.event_queue_capacity == 0 || self.config.tick_interval_ms == 0 {
            return Err(FramecastError::component(
                "statistics",
                "Event queue capacity and tick interval must be greater than 0",
            ));
        }

        if self.config.hold_time() < self.config.tick_interval() {
            return Err(FramecastError::component(
                "statistics",
                "Hold time must cover at least one tick interval",
            ));
        }

        let observer = self.observer.clone().ok_or_else(|| {
            FramecastError::component("statistics", "Statistics observer is required")
        })?;
        let reporter = self.reporter.clone().ok_or_else(|| {
            FramecastError::component("statistics", "Error reporter is required")
        })?;

        Ok(self.spawn(observer, reporter))
    }

    fn spawn(
        self,
        observer: Arc<dyn StatisticsObserver>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> StatisticsEngine {
        let session_id = Uuid::new_v4();
        let cancellation_token = match &self.parent_token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let (sender, receiver) = mpsc::channel(self.config.event_queue_capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));

        let handle = StatisticsHandle {
            sender,
            cancellation_token: cancellation_token.clone(),
            pending: Arc::clone(&pending),
            reporter: Arc::clone(&reporter),
            queue_depth_warning: self.config.queue_depth_warning,
        };

        let state = StatisticsState::new(
            self.config.traffic_history_seconds as usize,
            self.config.hold_time(),
            self.clock.now_millis(),
        );

        let worker = Worker {
            receiver,
            state,
            clock: self.clock,
            observer,
            reporter,
            pending,
            cancellation_token: cancellation_token.clone(),
        };

        info!(
            "Starting statistics engine {} (window: {}s, hold: {}s, queue: {})",
            session_id,
            self.config.traffic_history_seconds,
            self.config.hold_time_seconds,
            self.config.event_queue_capacity
        );

        let worker = tokio::spawn(worker.run());
        let timer = tokio::spawn(run_timer(
            handle.clone(),
            self.config.tick_interval(),
            cancellation_token.clone(),
        ));

        StatisticsEngine {
            session_id,
            handle,
            cancellation_token,
            worker: Some(worker),
            timer: Some(timer),
        }
    }
}

impl Default for StatisticsEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Worker {
    receiver: mpsc::Receiver<StatisticEvent>,
    state: StatisticsState,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn StatisticsObserver>,
    reporter: Arc<dyn ErrorReporter>,
    pending: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        debug!("Statistics worker started");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                event = self.receiver.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.pending.fetch_sub(1, Ordering::SeqCst);
            trace!("Processing statistic event: {}", event);

            if let Err(details) = self.process(&event) {
                error!("Statistics actor failed on {}: {}", event, details);
                self.cancellation_token.cancel();
                self.reporter.on_error(FatalError::ActorFailure {
                    event: event.name(),
                    details,
                });
                break;
            }
        }

        // Discard what is still queued so the depth gauge settles at zero
        self.receiver.close();
        let mut discarded = 0usize;
        while self.receiver.try_recv().is_ok() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} unprocessed statistic events", discarded);
        }
        debug!("Statistics worker stopped");
    }

    fn process(&mut self, event: &StatisticEvent) -> std::result::Result<(), String> {
        let now = self.clock.now_millis();
        let state = &mut self.state;
        let observer = &self.observer;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(report) = state.apply(event, now)? {
                observer.on_statistic(report.clients, report.traffic);
            }
            Ok::<_, super::state::ProcessingError>(())
        }));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

async fn run_timer(handle: StatisticsHandle, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if !submit_tick(&handle, StatisticEvent::CalculateTraffic)
                    || !submit_tick(&handle, StatisticEvent::SendStatistic)
                {
                    break;
                }
            }
        }
    }

    debug!("Statistics timer stopped");
}

/// Timer submissions racing a cancellation stop quietly
fn submit_tick(handle: &StatisticsHandle, event: StatisticEvent) -> bool {
    if handle.cancellation_token.is_cancelled() {
        return false;
    }
    handle.submit(event).is_ok()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic with non-string payload".to_string()
    }
}

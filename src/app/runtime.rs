use super::{FramecastOrchestrator, ShutdownReason};
use crate::error::{FramecastError, Result};
use crate::notification::NotificationType;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

type ShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl FramecastOrchestrator {
    /// Bind the stream server, start serving and publish the start screen
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr {
            return Err(FramecastError::system(format!(
                "Stream server already running on {}",
                addr
            )));
        }

        let server = Arc::clone(&self.stream_server);
        let listener = server.bind().await?;
        let local_addr = listener.local_addr()?;

        let token = self.cancellation_token.clone();
        let shutdown_sender = Arc::clone(&self.shutdown_sender);
        self.server_task = Some(tokio::spawn(async move {
            let result = server.serve(listener, token.clone()).await;
            if !token.is_cancelled() {
                let details = match &result {
                    Ok(()) => "server stopped unexpectedly".to_string(),
                    Err(e) => e.to_string(),
                };
                error!("Stream server exited: {}", details);
                send_shutdown(&shutdown_sender, ShutdownReason::ServerExited(details)).await;
            }
            result
        }));
        self.local_addr = Some(local_addr);

        self.publish_notification(NotificationType::Start).await;

        info!("Framecast streaming on {}", local_addr);
        Ok(local_addr)
    }

    /// Run the session until a signal, a fatal error or a server exit
    pub async fn run(&mut self) -> Result<i32> {
        if self.local_addr.is_none() {
            self.start().await?;
        }

        info!("Framecast system is running");
        self.setup_signal_handlers();

        let shutdown_reason = self.wait_for_shutdown().await?;
        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = self.shutdown(&shutdown_reason).await?;

        info!("Framecast system shutdown complete");
        Ok(exit_code)
    }

    /// Wait for the first reason to tear the session down
    pub async fn wait_for_shutdown(&mut self) -> Result<ShutdownReason> {
        let mut shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| FramecastError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        let mut error_receiver =
            self.error_receiver
                .take()
                .ok_or_else(|| FramecastError::System {
                    message: "Error receiver already taken".to_string(),
                })?;

        tokio::select! {
            reason = &mut shutdown_receiver => reason.map_err(|_| FramecastError::System {
                message: "Shutdown channel closed unexpectedly".to_string(),
            }),
            Some(fatal) = error_receiver.recv() => {
                error!("Fatal streaming error ({}): {}", fatal.kind(), fatal);
                Ok(ShutdownReason::Fatal(fatal))
            }
        }
    }

    /// Ask a running session to shut down
    pub async fn request_shutdown(&self, reason: ShutdownReason) {
        send_shutdown(&self.shutdown_sender, reason).await;
    }

    /// Offer a notification screen to every connected client
    pub async fn publish_notification(&self, kind: NotificationType) {
        if let Err(e) = self.notifications.publish(kind).await {
            warn!("Failed to publish {} notification: {}", kind, e);
        }
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&self.shutdown_sender);
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if let Some(()) = sigterm.recv().await {
                            info!("Received SIGTERM signal");
                            send_shutdown(
                                &shutdown_sender_sigterm,
                                ShutdownReason::Signal("SIGTERM".to_string()),
                            )
                            .await;
                        }
                    }
                    Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&self.shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_shutdown(
                    &shutdown_sender_sigint,
                    ShutdownReason::Signal("SIGINT".to_string()),
                )
                .await;
            }
        });
    }
}

async fn send_shutdown(sender: &ShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}

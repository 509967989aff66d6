use super::{FramecastOrchestrator, ShutdownReason};
use crate::error::Result;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const COMPONENT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl FramecastOrchestrator {
    /// Tear the session down. Returns the process exit code.
    pub async fn shutdown(&mut self, reason: &ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown ({})", reason);

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = if reason.is_failure() { 1 } else { 0 };

        // Ends every open stream so the server can drain its connections
        self.hub.close();

        if let Some(task) = self.server_task.take() {
            let abort = task.abort_handle();
            match timeout(COMPONENT_STOP_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => info!("streaming component stopped"),
                Ok(Ok(Err(e))) => {
                    error!("Error stopping streaming component: {}", e);
                    exit_code = 1;
                }
                Ok(Err(e)) => {
                    error!("Streaming task failed: {}", e);
                    exit_code = 1;
                }
                Err(_) => {
                    error!("streaming component stop timeout");
                    abort.abort();
                    exit_code = 1;
                }
            }
        }

        if let Some(engine) = self.engine.take() {
            let session_id = engine.session_id();
            if timeout(COMPONENT_STOP_TIMEOUT, engine.shutdown())
                .await
                .is_err()
            {
                error!("statistics component {} stop timeout", session_id);
                exit_code = 1;
            } else {
                info!("statistics component stopped");
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}

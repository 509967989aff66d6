mod orchestrator;
mod runtime;
mod shutdown;
mod types;


pub use orchestrator::FramecastOrchestrator;
pub use types::ShutdownReason;

//! Informational frames shown to viewers when no live video is available

mod generator;
mod render;
#[cfg(test)]
mod tests;

pub use generator::{
    NotificationFrames, NotificationGenerator, NotificationType, PublishOutcome,
    NOTIFICATION_REPEATS,
};
pub use render::NotificationRenderer;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FramecastConfig {
    pub statistics: StatisticsConfig,
    pub distribution: DistributionConfig,
    pub notification: NotificationConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StatisticsConfig {
    /// Seconds a disconnected client stays visible before eviction
    #[serde(default = "default_hold_time_seconds")]
    pub hold_time_seconds: u32,

    /// Number of one-second buckets in the traffic history window
    #[serde(default = "default_traffic_history_seconds")]
    pub traffic_history_seconds: u32,

    /// Period of the traffic/report timer in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u32,

    /// Capacity of the bounded event submission queue
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Pending event count above which the queue depth is logged
    #[serde(default = "default_queue_depth_warning")]
    pub queue_depth_warning: usize,
}

impl StatisticsConfig {
    pub fn hold_time(&self) -> Duration {
        Duration::from_secs(self.hold_time_seconds as u64)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms as u64)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DistributionConfig {
    /// Capacity of each per-client frame channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NotificationConfig {
    /// Canvas width in pixels
    #[serde(default = "default_notification_width")]
    pub width: u32,

    /// Canvas height in pixels
    #[serde(default = "default_notification_height")]
    pub height: u32,

    /// Background fill (r, g, b)
    #[serde(default = "default_background")]
    pub background: (u8, u8, u8),

    /// Optional logo image drawn above the message
    pub logo_path: Option<String>,

    /// Edge length the logo is scaled to
    #[serde(default = "default_logo_size")]
    pub logo_size: u32,

    /// Top-left corner of the logo (x, y)
    #[serde(default = "default_logo_position")]
    pub logo_position: (u32, u32),

    /// TrueType font used for the message; text is skipped when unset or empty
    pub font_path: Option<String>,

    /// Font size for the message text
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Baseline of the message text
    #[serde(default = "default_text_baseline")]
    pub text_baseline: u32,

    /// JPEG quality used when encoding notification frames
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default = "default_start_message")]
    pub start_message: String,

    #[serde(default = "default_reload_message")]
    pub reload_message: String,

    #[serde(default = "default_new_address_message")]
    pub new_address_message: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamConfig {
    /// IP address to bind to
    #[serde(default = "default_stream_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Upper bound on frames written per second to each client
    #[serde(default = "default_stream_max_fps")]
    pub max_fps: u32,
}

impl FramecastConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("framecast.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let background = default_background();
        let logo_position = default_logo_position();

        let settings = Config::builder()
            .set_default("statistics.hold_time_seconds", default_hold_time_seconds())?
            .set_default(
                "statistics.traffic_history_seconds",
                default_traffic_history_seconds(),
            )?
            .set_default("statistics.tick_interval_ms", default_tick_interval_ms())?
            .set_default(
                "statistics.event_queue_capacity",
                default_event_queue_capacity() as i64,
            )?
            .set_default(
                "statistics.queue_depth_warning",
                default_queue_depth_warning() as i64,
            )?
            .set_default(
                "distribution.channel_capacity",
                default_channel_capacity() as i64,
            )?
            .set_default("notification.width", default_notification_width())?
            .set_default("notification.height", default_notification_height())?
            .set_default(
                "notification.background",
                vec![
                    background.0 as i64,
                    background.1 as i64,
                    background.2 as i64,
                ],
            )?
            .set_default("notification.logo_size", default_logo_size())?
            .set_default(
                "notification.logo_position",
                vec![logo_position.0, logo_position.1],
            )?
            .set_default("notification.font_path", default_font_path())?
            .set_default("notification.font_size", default_font_size() as f64)?
            .set_default("notification.text_baseline", default_text_baseline())?
            .set_default("notification.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("notification.start_message", default_start_message())?
            .set_default("notification.reload_message", default_reload_message())?
            .set_default(
                "notification.new_address_message",
                default_new_address_message(),
            )?
            .set_default("stream.ip", default_stream_ip())?
            .set_default("stream.port", default_stream_port())?
            .set_default("stream.max_fps", default_stream_max_fps())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with FRAMECAST_ prefix
            .add_source(
                Environment::with_prefix("FRAMECAST")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: FramecastConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Statistics engine
        if self.statistics.traffic_history_seconds == 0 {
            return Err(ConfigError::Message(
                "Traffic history window must contain at least one bucket".to_string(),
            ));
        }

        if self.statistics.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Statistics tick interval must be greater than 0".to_string(),
            ));
        }

        // A disconnected client must survive into at least one snapshot
        if self.statistics.hold_time() < self.statistics.tick_interval() {
            return Err(ConfigError::Message(format!(
                "Hold time ({} s) must be at least one tick interval ({} ms)",
                self.statistics.hold_time_seconds, self.statistics.tick_interval_ms
            )));
        }

        if self.statistics.event_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Event queue capacity must be greater than 0".to_string(),
            ));
        }

        // Frame distribution
        if self.distribution.channel_capacity == 0 {
            return Err(ConfigError::Message(
                "Frame channel capacity must be greater than 0".to_string(),
            ));
        }

        // Notification rendering
        let n = &self.notification;
        if n.width == 0 || n.height == 0 {
            return Err(ConfigError::Message(
                "Notification canvas size must be greater than 0".to_string(),
            ));
        }

        if n.logo_size == 0 || n.logo_size > n.width.min(n.height) {
            return Err(ConfigError::Message(format!(
                "Logo size {} does not fit a {}x{} canvas",
                n.logo_size, n.width, n.height
            )));
        }

        if n.font_size <= 0.0 {
            return Err(ConfigError::Message(
                "Notification font size must be greater than 0".to_string(),
            ));
        }

        if n.text_baseline >= n.height {
            return Err(ConfigError::Message(
                "Notification text baseline must lie inside the canvas".to_string(),
            ));
        }

        if n.jpeg_quality == 0 || n.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        // Stream adapter
        if self.stream.max_fps == 0 {
            return Err(ConfigError::Message(
                "Stream max_fps must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for FramecastConfig {
    fn default() -> Self {
        Self {
            statistics: StatisticsConfig::default(),
            distribution: DistributionConfig::default(),
            notification: NotificationConfig::default(),
            stream: StreamConfig {
                ip: default_stream_ip(),
                port: default_stream_port(),
                max_fps: default_stream_max_fps(),
            },
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            hold_time_seconds: default_hold_time_seconds(),
            traffic_history_seconds: default_traffic_history_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
            event_queue_capacity: default_event_queue_capacity(),
            queue_depth_warning: default_queue_depth_warning(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            width: default_notification_width(),
            height: default_notification_height(),
            background: default_background(),
            logo_path: None,
            logo_size: default_logo_size(),
            logo_position: default_logo_position(),
            font_path: Some(default_font_path()),
            font_size: default_font_size(),
            text_baseline: default_text_baseline(),
            jpeg_quality: default_jpeg_quality(),
            start_message: default_start_message(),
            reload_message: default_reload_message(),
            new_address_message: default_new_address_message(),
        }
    }
}

// Default value functions
fn default_hold_time_seconds() -> u32 {
    20
}
fn default_traffic_history_seconds() -> u32 {
    30
}
fn default_tick_interval_ms() -> u32 {
    1000
}
fn default_event_queue_capacity() -> usize {
    32
}
fn default_queue_depth_warning() -> usize {
    8
}

fn default_channel_capacity() -> usize {
    4
}

fn default_notification_width() -> u32 {
    500
}
fn default_notification_height() -> u32 {
    400
}
fn default_background() -> (u8, u8, u8) {
    (69, 90, 100)
}
fn default_logo_size() -> u32 {
    192
}
fn default_logo_position() -> (u32, u32) {
    (154, 16)
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    20.0
}
fn default_text_baseline() -> u32 {
    300
}
fn default_jpeg_quality() -> u8 {
    85
}
fn default_start_message() -> String {
    "Press START on device".to_string()
}
fn default_reload_message() -> String {
    "Reload this page".to_string()
}
fn default_new_address_message() -> String {
    "Go to new address".to_string()
}

fn default_stream_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_port() -> u16 {
    8080
}
fn default_stream_max_fps() -> u32 {
    30
}

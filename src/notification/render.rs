use crate::config::NotificationConfig;
use crate::error::{FramecastError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Renders informational frames: background fill, logo, centred message
pub struct NotificationRenderer {
    config: NotificationConfig,
    logo: Option<RgbaImage>,
    font: Option<Font<'static>>,
}

impl NotificationRenderer {
    /// Prepare a renderer, scaling the logo once and loading the font
    pub fn new(config: NotificationConfig, logo: Option<DynamicImage>) -> Result<Self> {
        let font = match config.font_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Some(load_font(path)?),
            None => {
                warn!("No notification font configured, messages will not be drawn");
                None
            }
        };

        // Nearest-neighbour keeps the logo crisp at small sizes
        let logo = logo.map(|logo| {
            imageops::resize(
                &logo.to_rgba8(),
                config.logo_size,
                config.logo_size,
                FilterType::Nearest,
            )
        });

        Ok(Self { config, logo, font })
    }

    /// Open the logo configured in `logo_path`, if any. An unreadable logo
    /// is skipped.
    pub fn load_logo(config: &NotificationConfig) -> Option<DynamicImage> {
        let path = config.logo_path.as_deref().filter(|p| !p.is_empty())?;

        match image::open(Path::new(path)) {
            Ok(logo) => Some(logo),
            Err(e) => {
                warn!("Failed to open logo '{}', drawing without it: {}", path, e);
                None
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Compose the notification canvas for a message
    pub fn render(&self, message: &str) -> RgbaImage {
        let (r, g, b) = self.config.background;
        let mut canvas =
            RgbaImage::from_pixel(self.config.width, self.config.height, Rgba([r, g, b, 255]));

        if let Some(logo) = &self.logo {
            let (x, y) = self.config.logo_position;
            imageops::overlay(&mut canvas, logo, x as i64, y as i64);
        }

        if let Some(font) = &self.font {
            let scale = Scale::uniform(self.config.font_size);
            let (text_width, _) = text_size(scale, font, message);
            let ascent = font.v_metrics(scale).ascent;

            let x = ((self.config.width as i32 - text_width) / 2).max(0);
            let y = self.config.text_baseline as i32 - ascent.round() as i32;

            draw_text_mut(
                &mut canvas,
                Rgba([255, 255, 255, 255]),
                x,
                y,
                scale,
                font,
                message,
            );
        }

        canvas
    }

    /// Render a message and encode it as JPEG
    pub fn render_jpeg(&self, message: &str) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.render(message)).to_rgb8();

        let mut output = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut output, self.config.jpeg_quality);
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }

        debug!(
            "Rendered notification '{}' ({}x{}, {} bytes)",
            message,
            rgb.width(),
            rgb.height(),
            output.len()
        );
        Ok(output)
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }
}

fn load_font(path: &str) -> Result<Font<'static>> {
    let font_data = fs::read(path).map_err(|e| {
        FramecastError::component(
            "notification",
            format!("Failed to read font file '{}': {}", path, e),
        )
    })?;

    Font::try_from_vec(font_data).ok_or_else(|| {
        FramecastError::component(
            "notification",
            format!("Failed to parse font file '{}'", path),
        )
    })
}

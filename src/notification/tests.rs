use super::*;
use crate::config::NotificationConfig;
use crate::distribution::{frame_channel, FrameSink, OfferOutcome};
use crate::frame::Frame;
use image::{DynamicImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SYSTEM_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Records every offered frame
#[derive(Default)]
struct RecordingSink {
    offered: Mutex<Vec<Frame>>,
    closed: AtomicBool,
}

impl FrameSink for RecordingSink {
    fn offer(&self, frame: Frame) -> OfferOutcome {
        self.offered.lock().push(frame);
        OfferOutcome::Delivered
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn config_without_font() -> NotificationConfig {
    NotificationConfig {
        font_path: None,
        ..NotificationConfig::default()
    }
}

fn red_logo() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])))
}

#[test]
fn test_render_background_and_logo() {
    let renderer = NotificationRenderer::new(config_without_font(), Some(red_logo())).unwrap();
    assert!(!renderer.has_font());

    let canvas = renderer.render("ignored");
    assert_eq!(canvas.dimensions(), (500, 400));
    assert_eq!(*canvas.get_pixel(0, 0), Rgba([69, 90, 100, 255]));

    // Logo covers 154..346 x 16..208
    assert_eq!(*canvas.get_pixel(154, 16), Rgba([255, 0, 0, 255]));
    assert_eq!(*canvas.get_pixel(345, 207), Rgba([255, 0, 0, 255]));
    assert_eq!(*canvas.get_pixel(346, 208), Rgba([69, 90, 100, 255]));
    assert_eq!(*canvas.get_pixel(153, 16), Rgba([69, 90, 100, 255]));
}

#[test]
fn test_render_without_logo_is_plain_background() {
    let renderer = NotificationRenderer::new(config_without_font(), None).unwrap();
    let canvas = renderer.render("ignored");
    assert!(canvas.pixels().all(|p| *p == Rgba([69, 90, 100, 255])));
}

#[test]
fn test_render_jpeg_decodes_to_canvas_size() {
    let renderer = NotificationRenderer::new(config_without_font(), Some(red_logo())).unwrap();
    let jpeg = renderer.render_jpeg("hello").unwrap();

    let frame = Frame::new(0, jpeg.clone(), 500, 400);
    assert!(frame.is_valid_jpeg());

    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(decoded.width(), 500);
    assert_eq!(decoded.height(), 400);
}

#[test]
fn test_render_draws_centred_text() {
    if !Path::new(SYSTEM_FONT).exists() {
        return;
    }

    let config = NotificationConfig {
        font_path: Some(SYSTEM_FONT.to_string()),
        ..NotificationConfig::default()
    };
    let renderer = NotificationRenderer::new(config, None).unwrap();
    assert!(renderer.has_font());

    let canvas = renderer.render("Reload this page");
    let lit: Vec<u32> = canvas
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 200 && p[1] > 200 && p[2] > 200)
        .map(|(x, y, _)| {
            assert!(y > 270 && y <= 306, "text pixel outside baseline band: {}", y);
            x
        })
        .collect();
    assert!(!lit.is_empty());

    let left = *lit.iter().min().unwrap() as i64;
    let right = *lit.iter().max().unwrap() as i64;
    assert!((left - (500 - right)).abs() < 10);
}

#[test]
fn test_missing_font_is_an_error() {
    let config = NotificationConfig {
        font_path: Some("/nonexistent/font.ttf".to_string()),
        ..NotificationConfig::default()
    };
    assert!(NotificationRenderer::new(config, None).is_err());
}

#[test]
fn test_unparsable_font_is_an_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"not a font").unwrap();

    let config = NotificationConfig {
        font_path: Some(file.path().to_string_lossy().to_string()),
        ..NotificationConfig::default()
    };
    assert!(NotificationRenderer::new(config, None).is_err());
}

#[test]
fn test_empty_font_path_skips_text() {
    let config = NotificationConfig {
        font_path: Some(String::new()),
        ..NotificationConfig::default()
    };
    let renderer = NotificationRenderer::new(config, None).unwrap();
    assert!(!renderer.has_font());
}

#[test]
fn test_load_logo_from_file() {
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    red_logo().save(file.path()).unwrap();

    let config = NotificationConfig {
        logo_path: Some(file.path().to_string_lossy().to_string()),
        ..config_without_font()
    };
    let logo = NotificationRenderer::load_logo(&config).unwrap();
    assert_eq!((logo.width(), logo.height()), (8, 8));

    assert!(NotificationRenderer::load_logo(&config_without_font()).is_none());

    let missing = NotificationConfig {
        logo_path: Some("/nonexistent/logo.png".to_string()),
        ..config_without_font()
    };
    assert!(NotificationRenderer::load_logo(&missing).is_none());
}

#[test]
fn test_notification_messages() {
    let config = config_without_font();
    assert_eq!(NotificationType::Start.message(&config), "Press START on device");
    assert_eq!(NotificationType::ReloadPage.message(&config), "Reload this page");
    assert_eq!(NotificationType::NewAddress.message(&config), "Go to new address");
    assert_eq!(NotificationType::ReloadPage.to_string(), "reload_page");
}

#[tokio::test]
async fn test_publish_offers_three_copies() {
    let sink = Arc::new(RecordingSink::default());
    let generator =
        NotificationGenerator::new(config_without_font(), Some(red_logo()), sink.clone()).unwrap();

    let outcome = generator.publish(NotificationType::ReloadPage).await.unwrap();
    assert_eq!(outcome.offered, NOTIFICATION_REPEATS);
    assert_eq!(outcome.delivered, NOTIFICATION_REPEATS);
    assert!(generator.is_ready());

    let frames = sink.offered.lock();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.data == frames[0].data));
    assert!(frames[0].is_valid_jpeg());
    assert_eq!((frames[0].width, frames[0].height), (500, 400));
}

#[tokio::test]
async fn test_publish_to_closed_sink_is_noop() {
    let sink = Arc::new(RecordingSink::default());
    sink.closed.store(true, Ordering::SeqCst);
    let generator = NotificationGenerator::new(config_without_font(), None, sink.clone()).unwrap();

    let outcome = generator.publish(NotificationType::Start).await.unwrap();
    assert_eq!(outcome, PublishOutcome::default());
    assert!(sink.offered.lock().is_empty());
}

#[tokio::test]
async fn test_frames_are_rendered_once() {
    let sink = Arc::new(RecordingSink::default());
    let generator = NotificationGenerator::new(config_without_font(), None, sink.clone()).unwrap();

    generator.publish(NotificationType::Start).await.unwrap();
    generator.publish(NotificationType::Start).await.unwrap();

    let frames = sink.offered.lock();
    assert_eq!(frames.len(), 6);
    // Same cached payload, no re-encode
    assert_eq!(frames[0].data.as_ptr(), frames[5].data.as_ptr());

    let cached = generator.frames().await.unwrap();
    assert_ne!(
        cached.get(NotificationType::Start).id,
        cached.get(NotificationType::NewAddress).id
    );
}

#[tokio::test]
async fn test_publish_into_frame_channel() {
    let (sender, mut receiver) = frame_channel(2);
    let generator =
        NotificationGenerator::new(config_without_font(), None, Arc::new(sender)).unwrap();

    // Third copy is dropped by the full channel without blocking
    let outcome = generator.publish(NotificationType::NewAddress).await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome {
            offered: 3,
            delivered: 2
        }
    );
    assert!(receiver.try_recv().is_some());
    assert!(receiver.try_recv().is_some());
    assert!(receiver.try_recv().is_none());
}

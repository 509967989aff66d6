use crate::notification::NotificationType;
use axum::{
    extract::{ConnectInfo, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use super::server::ServerState;
use super::session::ClientSession;

/// Handler for MJPEG streaming endpoint
pub async fn mjpeg_stream_handler(
    State(state): State<ServerState>,
    ConnectInfo(address): ConnectInfo<SocketAddr>,
) -> Response {
    let (mut session, mut receiver) =
        match ClientSession::open(address, Arc::clone(&state.hub), state.statistics.clone()) {
            Ok(opened) => opened,
            Err(e) => {
                error!("Rejecting stream client {}: {}", address, e);
                return (StatusCode::SERVICE_UNAVAILABLE, "Statistics engine unavailable")
                    .into_response();
            }
        };

    if let Some(notifications) = state.notifications.clone() {
        tokio::spawn(async move {
            if let Err(e) = notifications.publish(NotificationType::Start).await {
                warn!("Failed to publish start notification: {}", e);
            }
        });
    }

    let stream = async_stream::stream! {
        let mut frame_interval = interval(state.target_frame_interval);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames_streamed = 0u64;

        while let Some(frame) = receiver.recv().await {
            frame_interval.tick().await;

            let part_header = format!(
                "--FRAME\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-Frame-ID: {}\r\n\r\n",
                frame.size(),
                frame.id,
            );
            let part_size = (part_header.len() + frame.size() + 2) as u64;

            yield Ok::<_, axum::Error>(Bytes::from(part_header));
            yield Ok(frame.data.clone());
            yield Ok(Bytes::from_static(b"\r\n"));

            // Counted only once the body has taken the whole part
            if let Err(e) = session.record_bytes(part_size) {
                error!("Stopping stream to {}: {}", session.address(), e);
                break;
            }
            frames_streamed += 1;
            trace!(
                "Streamed frame {} to {} ({} bytes)",
                frame.id,
                session.address(),
                part_size
            );
        }

        debug!(
            "Stream to {} ended after {} frames ({} bytes)",
            session.address(),
            frames_streamed,
            session.bytes_sent()
        );
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=FRAME",
        )
        .header(header::CACHE_CONTROL, "no-cache, private")
        .header(header::PRAGMA, "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET")
        .body(axum::body::Body::from_stream(stream));

    match response {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to build stream response for {}: {}", address, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Latest statistics snapshot and distribution counters
pub async fn stats_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let report = state.reports.borrow().clone();
    let distribution = state.hub.stats();

    let stats = serde_json::json!({
        "engine_active": state.statistics.is_active(),
        "queue_depth": state.statistics.queue_depth(),
        "connected_clients": report.connected_clients(),
        "slow_clients": report.slow_clients(),
        "clients": report.clients,
        "traffic": report.traffic,
        "distribution": {
            "active_channels": state.hub.client_count(),
            "frames_offered": distribution.frames_offered,
            "frames_delivered": distribution.frames_delivered,
            "frames_dropped": distribution.frames_dropped,
            "consumers_closed": distribution.consumers_closed,
            "drop_rate": distribution.drop_rate(),
        },
    });

    (StatusCode::OK, axum::Json(stats))
}

/// Simple HTML page embedding the MJPEG stream
pub async fn stream_page_handler() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Framecast Stream</title>
    <style>
        :root { color-scheme: dark; }
        body {
            margin: 0;
            background: #000;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
        }
        img.stream {
            display: block;
            max-width: 100vw;
            max-height: 100vh;
            object-fit: contain;
        }
    </style>
</head>
<body>
    <img class="stream" src="/stream.mjpg" alt="Framecast stream">
</body>
</html>
"#,
    )
}

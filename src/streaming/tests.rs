use super::{ClientSession, StreamServer, StreamServerBuilder};
use crate::clock::ManualClock;
use crate::config::{StatisticsConfig, StreamConfig};
use crate::distribution::{FrameHub, FrameSink};
use crate::frame::Frame;
use crate::statistics::{
    error_channel, StatisticEvent, StatisticsEngine, StatisticsEngineBuilder, StatisticsReport,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

fn test_stream_config() -> StreamConfig {
    StreamConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        max_fps: 30,
    }
}

async fn start_engine() -> (StatisticsEngine, watch::Receiver<StatisticsReport>) {
    let (report_tx, mut report_rx) = watch::channel(StatisticsReport::default());
    let (error_tx, _errors) = error_channel();
    let engine = StatisticsEngineBuilder::new()
        .config(StatisticsConfig {
            tick_interval_ms: 20_000,
            ..StatisticsConfig::default()
        })
        .observer(report_tx)
        .reporter(error_tx)
        .clock(ManualClock::new(1_700_000_000_000))
        .build()
        .unwrap();

    // Initial timer tick
    timeout(Duration::from_secs(5), report_rx.changed())
        .await
        .unwrap()
        .unwrap();
    (engine, report_rx)
}

async fn latest_report(
    engine: &StatisticsEngine,
    reports: &mut watch::Receiver<StatisticsReport>,
) -> StatisticsReport {
    reports.borrow_and_update();
    engine
        .handle()
        .submit(StatisticEvent::SendStatistic)
        .unwrap();
    timeout(Duration::from_secs(5), reports.changed())
        .await
        .unwrap()
        .unwrap();
    let report = reports.borrow().clone();
    report
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

async fn spawn_server(server: StreamServer) -> (SocketAddr, CancellationToken) {
    let listener = server.bind().await.unwrap();
    let address = listener.local_addr().unwrap();
    let token = CancellationToken::new();

    let serve_token = token.clone();
    tokio::spawn(async move {
        server.serve(listener, serve_token).await.unwrap();
    });

    (address, token)
}

#[tokio::test]
async fn test_stream_server_builder() {
    let (engine, reports) = start_engine().await;
    let hub = Arc::new(FrameHub::new(4));

    let server = StreamServerBuilder::new()
        .config(test_stream_config())
        .hub(Arc::clone(&hub))
        .statistics(engine.handle())
        .reports(reports.clone())
        .build()
        .unwrap();
    assert_eq!(server.config.ip, "127.0.0.1");

    let result = StreamServerBuilder::new()
        .config(test_stream_config())
        .statistics(engine.handle())
        .reports(reports.clone())
        .build();
    assert!(result.is_err());

    let result = StreamServerBuilder::new()
        .hub(hub)
        .statistics(engine.handle())
        .reports(reports)
        .build();
    assert!(result.is_err());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let (engine, reports) = start_engine().await;
    let server = StreamServer::new(
        StreamConfig {
            ip: "not-an-address".to_string(),
            ..test_stream_config()
        },
        Arc::new(FrameHub::new(4)),
        engine.handle(),
        reports,
        None,
    );

    assert!(server.bind().await.is_err());
    engine.shutdown().await;
}

#[tokio::test]
async fn test_client_session_reports_lifecycle() {
    let (engine, mut reports) = start_engine().await;
    let hub = Arc::new(FrameHub::new(4));
    let address: SocketAddr = "10.1.1.1:5000".parse().unwrap();

    let (mut session, _receiver) =
        ClientSession::open(address, Arc::clone(&hub), engine.handle()).unwrap();
    session.record_bytes(1000).unwrap();
    assert_eq!(session.bytes_sent(), 1000);
    assert_eq!(hub.client_count(), 1);

    let report = latest_report(&engine, &mut reports).await;
    assert_eq!(report.connected_clients(), 1);

    drop(session);
    assert_eq!(hub.client_count(), 0);

    let report = latest_report(&engine, &mut reports).await;
    assert_eq!(report.clients.len(), 1);
    assert!(report.clients[0].is_disconnected);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_session_refused_when_engine_stopped() {
    let (engine, _reports) = start_engine().await;
    let handle = engine.handle();
    engine.shutdown().await;

    let hub = Arc::new(FrameHub::new(4));
    let result = ClientSession::open("10.1.1.1:5000".parse().unwrap(), Arc::clone(&hub), handle);
    assert!(result.is_err());
    assert_eq!(hub.client_count(), 0);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (engine, reports) = start_engine().await;
    let hub = Arc::new(FrameHub::new(4));
    let server = StreamServer::new(test_stream_config(), hub, engine.handle(), reports, None);
    let (address, token) = spawn_server(server).await;

    let mut stream = TcpStream::connect(address).await.unwrap();
    stream
        .write_all(b"GET /stats HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    let response = String::from_utf8_lossy(&response);

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"distribution\""));
    assert!(response.contains("\"engine_active\":true"));

    token.cancel();
    engine.shutdown().await;
}

#[tokio::test]
async fn test_mjpeg_stream_delivers_frames_and_counts_bytes() {
    let (engine, mut reports) = start_engine().await;
    let hub = Arc::new(FrameHub::new(4).with_statistics(engine.handle()));
    let server = StreamServer::new(
        test_stream_config(),
        Arc::clone(&hub),
        engine.handle(),
        reports.clone(),
        None,
    );
    let (address, token) = spawn_server(server).await;

    let mut stream = TcpStream::connect(address).await.unwrap();
    stream
        .write_all(b"GET /stream.mjpg HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    timeout(Duration::from_secs(5), async {
        while hub.client_count() == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let jpeg = vec![0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9];
    hub.offer(Frame::new(42, jpeg.clone(), 2, 2));

    let mut received = Vec::new();
    timeout(Duration::from_secs(5), async {
        let mut buffer = [0u8; 4096];
        while !contains(&received, &jpeg) {
            let n = stream.read(&mut buffer).await.unwrap();
            assert!(n > 0, "connection closed early");
            received.extend_from_slice(&buffer[..n]);
        }
    })
    .await
    .unwrap();

    assert!(contains(&received, b"multipart/x-mixed-replace; boundary=FRAME"));
    assert!(contains(&received, b"--FRAME\r\nContent-Type: image/jpeg"));
    assert!(contains(&received, b"X-Frame-ID: 42"));

    // Bytes are counted once a part is fully handed to the body, which the
    // next part reaching the client proves
    let next = vec![0xFF, 0xD8, 0x04, 0x05, 0x06, 0xFF, 0xD9];
    hub.offer(Frame::new(43, next.clone(), 2, 2));
    timeout(Duration::from_secs(5), async {
        let mut buffer = [0u8; 4096];
        while !contains(&received, &next) {
            let n = stream.read(&mut buffer).await.unwrap();
            assert!(n > 0, "connection closed early");
            received.extend_from_slice(&buffer[..n]);
        }
    })
    .await
    .unwrap();

    let first_part = format!(
        "--FRAME\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-Frame-ID: 42\r\n\r\n",
        jpeg.len()
    )
    .len()
        + jpeg.len()
        + 2;

    engine
        .handle()
        .submit(StatisticEvent::CalculateTraffic)
        .unwrap();
    let report = latest_report(&engine, &mut reports).await;
    assert_eq!(report.connected_clients(), 1);
    assert!(report.latest_bytes() >= first_part as u64);

    token.cancel();
    engine.shutdown().await;
}

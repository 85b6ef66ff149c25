//! End-to-end tests: registry-built streams over real transports.
//!
//! These exercise real sockets, files and child processes, so they check the
//! whole path from configuration to bytes on the other side.

use devlink_core::config::{
    CustomConfig, FileConfig, PortReader, PortWriter, PushPort, QueuedConfig, TcpConfig,
};
use devlink_core::{DeviceConfig, DeviceSettings};
use devlink_hardware::mock::LoopbackTransport;
use devlink_hardware::{AnyTransport, HardwareError, Transport, TransportRegistry};
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::net::TcpListener;

/// Test a write-read round trip against a TCP peer built from a port string
#[tokio::test]
async fn test_tcp_stream_from_port_string() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 3];
        socket.read_exact(&mut request).await.unwrap();
        socket.write_all(b"\x12").await.unwrap();
        // Keep the socket open until the client is done.
        let mut rest = Vec::new();
        let _ = socket.read_to_end(&mut rest).await;
        request
    });

    let registry = TransportRegistry::new();
    let mut config = registry
        .config_for_port(&format!("tcp:{addr}"))
        .unwrap();
    config.settings_mut().set_port_control(false);
    let mut stream = registry.create(&config).unwrap();

    stream.open().await.unwrap();
    let answer = stream
        .write_read_with_delay(b"\x10\x04\x01", Duration::from_millis(100))
        .await
        .unwrap();
    stream.dispose().await;

    assert_eq!(answer, b"\x12");
    assert_eq!(&peer.await.unwrap(), b"\x10\x04\x01");
}

/// Test that automatic port control opens a fresh connection per operation
#[tokio::test]
async fn test_tcp_automatic_mode_reconnects_per_write() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let mut payloads = Vec::new();
        for _ in 0..2 {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut payload = Vec::new();
            socket.read_to_end(&mut payload).await.unwrap();
            payloads.push(payload);
        }
        payloads
    });

    let config = DeviceConfig::Tcp(TcpConfig::new("127.0.0.1", addr.port()));
    let mut stream = TransportRegistry::new().create(&config).unwrap();

    stream.write(b"first").await.unwrap();
    stream.write(b"second").await.unwrap();
    assert!(!stream.is_port_open());

    assert_eq!(
        peer.await.unwrap(),
        vec![b"first".to_vec(), b"second".to_vec()]
    );
}

/// Test that an unreachable peer surfaces as an open error
#[tokio::test]
async fn test_tcp_unreachable_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = DeviceConfig::Tcp(TcpConfig::new("127.0.0.1", port));
    let mut stream = TransportRegistry::new().create(&config).unwrap();

    assert!(matches!(
        stream.write(b"x").await,
        Err(HardwareError::Io(_))
    ));
}

/// Test that file streams append every job
#[tokio::test]
async fn test_file_stream_appends_jobs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("spool.prn");
    let config = DeviceConfig::File(
        FileConfig::new(path.display().to_string()).with_create_if_missing(true),
    );

    let mut stream = TransportRegistry::new().create(&config).unwrap();
    assert!(!stream.can_read());

    stream.write(b"job one\n").await.unwrap();
    stream.write(b"job two\n").await.unwrap();
    stream.dispose().await;

    assert_eq!(std::fs::read(&path).unwrap(), b"job one\njob two\n");
}

/// Test that a raw stream hands each job to the spooler command
#[cfg(unix)]
#[tokio::test]
async fn test_raw_stream_spools_each_job() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.bin");
    let config = DeviceConfig::from_json(&format!(
        r#"{{
            "transport": "raw",
            "printer": "kitchen",
            "spool_command": ["sh", "-c", "cat >> '{}'"]
        }}"#,
        path.display()
    ))
    .unwrap();

    let mut stream = TransportRegistry::new().create(&config).unwrap();
    stream.write(b"\x1b@").await.unwrap();
    stream.write(b"\x1dV\x00").await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"\x1b@\x1dV\x00");
}

#[derive(Debug)]
struct DuplexPort {
    end: Mutex<Option<DuplexStream>>,
}

impl PushPort for DuplexPort {
    fn connect(&self) -> io::Result<(PortReader, PortWriter)> {
        let stream = self
            .end
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| io::Error::other("port already taken"))?;
        let (reader, writer) = tokio::io::split(stream);
        Ok((Box::pin(reader), Box::pin(writer)))
    }
}

/// Test a persistent stream over a push-based port
#[tokio::test]
async fn test_queued_stream_over_push_port() {
    let (ours, mut device) = duplex(64);
    let port = Arc::new(DuplexPort {
        end: Mutex::new(Some(ours)),
    });
    let mut queued = QueuedConfig::new(port).with_queue_capacity(2);
    *queued.settings_mut() = DeviceSettings::new("Scale").with_port_control(false);

    let mut stream = TransportRegistry::new()
        .create(&DeviceConfig::Queued(queued))
        .unwrap();
    stream.open().await.unwrap();

    let responder = tokio::spawn(async move {
        let mut request = [0u8; 1];
        device.read_exact(&mut request).await.unwrap();
        device.write_all(b"\x02 1.250kg\x03").await.unwrap();
        device
    });

    let answer = stream
        .write_read_with_delay(b"\x05", Duration::from_millis(100))
        .await
        .unwrap();
    let _device = responder.await.unwrap();

    assert_eq!(answer, b"\x02 1.250kg\x03");
    stream.close().await.unwrap();
    assert!(!stream.is_port_open());
}

/// Test that runtime registrations participate in tag and port resolution
#[tokio::test]
async fn test_custom_registration_end_to_end() {
    let mut registry = TransportRegistry::new();
    registry
        .register("loopback", |config: &DeviceConfig| {
            assert_eq!(config.tag(), "loopback.display");
            Ok(AnyTransport::from(LoopbackTransport::new().0))
        })
        .unwrap();

    let mut custom = CustomConfig::new("loopback.display", json!({}));
    custom.settings = DeviceSettings::new("Display").with_port_control(false);
    let mut stream = registry.create(&DeviceConfig::Custom(custom)).unwrap();

    stream.open().await.unwrap();
    assert_eq!(stream.write_read(b"hello").await.unwrap(), b"hello");
    assert_eq!(Transport::tag(stream.transport()), "loopback");
}

//! Exercises `Session::open`/`handshake` against a minimal local RTSP responder, over real TCP
//! and UDP sockets rather than an in-memory duplex pair.

mod common;

use std::time::Duration;

use airtunes2::config::StreamConfig;
use airtunes2::metadata::Volume;
use airtunes2::rtsp::client::Credentials;
use airtunes2::session::Session;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Reads one RTSP request off `stream` (headers + any `Content-Length` body) and returns its
/// method name (`"OPTIONS"`, `"ANNOUNCE"`, ...).
async fn read_request_method(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.expect("read request");
        assert!(n > 0, "peer closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length: usize = head
        .lines()
        .find_map(|line| line.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body_have = buf.len() - header_end;
    while body_have < content_length {
        let n = stream.read(&mut chunk).await.expect("read body");
        assert!(n > 0, "peer closed mid-body");
        body_have += n;
    }

    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Drives the fake receiver side of one full handshake: OPTIONS, ANNOUNCE, SETUP (replying with
/// the given UDP ports), RECORD, SET_PARAMETER.
async fn run_fake_receiver(listener: TcpListener, control_port: u16, timing_port: u16, record_latency: u32) {
    let (mut stream, _) = listener.accept().await.expect("accept");

    let method = read_request_method(&mut stream).await;
    assert_eq!(method, "OPTIONS");
    stream
        .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nPublic: ANNOUNCE, SETUP, RECORD\r\n\r\n")
        .await
        .unwrap();

    let method = read_request_method(&mut stream).await;
    assert_eq!(method, "ANNOUNCE");
    stream.write_all(b"RTSP/1.0 200 OK\r\nCSeq: 2\r\n\r\n").await.unwrap();

    let method = read_request_method(&mut stream).await;
    assert_eq!(method, "SETUP");
    let body = format!(
        "RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: 1\r\nAudio-Jack-Status: connected; type=analog\r\n\
         Transport: RTP/AVP/UDP;unicast;server_port=6000;control_port={control_port};timing_port={timing_port}\r\n\r\n"
    );
    stream.write_all(body.as_bytes()).await.unwrap();

    let method = read_request_method(&mut stream).await;
    assert_eq!(method, "RECORD");
    let record_body = format!("RTSP/1.0 200 OK\r\nCSeq: 4\r\nSession: 1\r\nAudio-Latency: {record_latency}\r\n\r\n");
    stream.write_all(record_body.as_bytes()).await.unwrap();

    let method = read_request_method(&mut stream).await;
    assert_eq!(method, "SET_PARAMETER");
    stream.write_all(b"RTSP/1.0 200 OK\r\nCSeq: 5\r\n\r\n").await.unwrap();
}

#[tokio::test]
async fn full_handshake_against_a_local_responder() {
    common::init_logging();

    let rtsp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rtsp_addr = rtsp_listener.local_addr().unwrap();

    // Bind two throwaway UDP sockets just so the SETUP response can name real ports.
    let fake_control = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let fake_timing = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let control_port = fake_control.local_addr().unwrap().port();
    let timing_port = fake_timing.local_addr().unwrap().port();

    let server = tokio::spawn(run_fake_receiver(rtsp_listener, control_port, timing_port, 11_025));

    let config = StreamConfig::builder()
        .rtsp_request_timeout(Duration::from_secs(2))
        .build();

    let mut session = Session::open(rtsp_addr, "127.0.0.1".parse().unwrap(), &config, Credentials::default())
        .await
        .expect("session open");

    let (transport, speaker_type) = session
        .handshake("integration-test/1.0", None, 0, 0, Volume::MAX)
        .await
        .expect("handshake");

    assert_eq!(transport.control_port, control_port);
    assert_eq!(transport.timing_port, timing_port);
    assert_eq!(session.capabilities.audio_latency_frames, Some(11_025));
    assert_eq!(speaker_type, airtunes2::session::SpeakerType::Analog);

    server.await.expect("fake receiver task");
}

/// A RECORD response with a non-default `Audio-Latency` must reach the session's live
/// `SyncEngine`, not just its `Capabilities` snapshot: the next sync packet's `now_minus_latency`
/// field has to reflect it.
#[tokio::test]
async fn handshake_latency_propagates_into_the_live_sync_engine() {
    common::init_logging();

    let rtsp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rtsp_addr = rtsp_listener.local_addr().unwrap();

    let fake_control = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let fake_timing = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let control_port = fake_control.local_addr().unwrap().port();
    let timing_port = fake_timing.local_addr().unwrap().port();

    let server = tokio::spawn(run_fake_receiver(rtsp_listener, control_port, timing_port, 500));

    let config = StreamConfig::builder()
        .rtsp_request_timeout(Duration::from_secs(2))
        .build();

    let mut session = Session::open(rtsp_addr, "127.0.0.1".parse().unwrap(), &config, Credentials::default())
        .await
        .expect("session open");

    session
        .handshake("integration-test/1.0", None, 0, 0, Volume::MAX)
        .await
        .expect("handshake");

    assert_eq!(session.capabilities.audio_latency_frames, Some(500));

    let packet = session.sync.build_sync(10_000);
    let now_minus_latency = u32::from_be_bytes(packet[4..8].try_into().unwrap());
    assert_eq!(now_minus_latency, 10_000u32.wrapping_sub(500));

    server.await.expect("fake receiver task");
}

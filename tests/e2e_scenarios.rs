// ABOUTME: End-to-end session tests: a local mock WebSocket server drives a real Supervisor
// ABOUTME: through handshake, buffering/playback, volume echo, stream clear, and reconnect

use futures_util::{SinkExt, StreamExt};
use sendspin::audio::decode::{Decoder, PcmDecoder};
use sendspin::audio::output::NullSink;
use sendspin::discovery::NullDiscovery;
use sendspin::protocol::messages::{
    ClientState, Message, PlayerCommand, ServerCommand, ServerHello, ServerTime, StreamClear,
    StreamPlayerConfig, StreamStart,
};
use sendspin::{Config, Observer, Supervisor};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

#[derive(Default)]
struct RecordingObserver {
    connected: AtomicBool,
    stream_clears: AtomicU32,
}

impl Observer for RecordingObserver {
    fn on_connection_state_change(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn on_stream_clear(&self) {
        self.stream_clears.fetch_add(1, Ordering::SeqCst);
    }
}

fn audio_frame(timestamp_us: i64, pcm: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(9 + pcm.len());
    frame.push(0x04);
    frame.extend_from_slice(&timestamp_us.to_be_bytes());
    frame.extend_from_slice(pcm);
    frame
}

async fn send_message(ws: &mut WebSocketStream<TcpStream>, message: &Message) {
    let text = serde_json::to_string(message).expect("message serializes");
    ws.send(WsMessage::Text(text.into()))
        .await
        .expect("mock server send");
}

async fn recv_message(ws: &mut WebSocketStream<TcpStream>) -> Message {
    loop {
        match ws
            .next()
            .await
            .expect("stream ended before a message arrived")
            .expect("websocket error")
        {
            WsMessage::Text(text) => {
                return serde_json::from_str(&text).expect("valid protocol message")
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame from client: {other:?}"),
        }
    }
}

/// Consumes `rounds` `client/time` requests, acking each with a fixed
/// (server_received=0, server_transmitted=0) reply, and returns how long the
/// whole burst took.
async fn ack_sync_burst(ws: &mut WebSocketStream<TcpStream>, rounds: usize) -> Duration {
    let start = std::time::Instant::now();
    for _ in 0..rounds {
        match recv_message(ws).await {
            Message::ClientTime(ct) => {
                send_message(
                    ws,
                    &Message::ServerTime(ServerTime {
                        client_transmitted: ct.client_transmitted,
                        server_received: 0,
                        server_transmitted: 0,
                    }),
                )
                .await;
            }
            other => panic!("expected client/time, got {other:?}"),
        }
    }
    start.elapsed()
}

/// Reads messages, transparently acking any `client/time` pings along the
/// way, until one matches `pred` or `timeout` elapses.
async fn recv_matching(
    ws: &mut WebSocketStream<TcpStream>,
    mut pred: impl FnMut(&Message) -> bool,
    timeout: Duration,
) -> Message {
    tokio::time::timeout(timeout, async {
        loop {
            let message = recv_message(ws).await;
            if let Message::ClientTime(ct) = &message {
                send_message(
                    ws,
                    &Message::ServerTime(ServerTime {
                        client_transmitted: ct.client_transmitted,
                        server_received: 0,
                        server_transmitted: 0,
                    }),
                )
                .await;
                continue;
            }
            if pred(&message) {
                return message;
            }
        }
    })
    .await
    .expect("timed out waiting for a matching message")
}

fn decoder_factory() -> Box<dyn Fn() -> Box<dyn Decoder> + Send + Sync> {
    Box::new(|| Box::new(PcmDecoder::new(16)) as Box<dyn Decoder>)
}

/// Drives a Supervisor through S1 (handshake + buffering-then-playback), S2
/// (a too-late chunk dropped at ingress), S3 (a volume command round-trips
/// as an echoed `client/state`), S4 (`stream/clear` notifies the observer),
/// and S6 (closing the socket tears the session down and a reconnect
/// attempt opens a fresh connection).
#[tokio::test]
async fn supervisor_drives_the_full_session_lifecycle_against_a_mock_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = Config::new("mock-test-player");
    config.server_addr = Some(addr.to_string());
    config.buffer_ms = 100; // buffer_target_chunks = 5, keeps the test's real-time waits short

    let observer = Arc::new(RecordingObserver::default());
    let supervisor = Supervisor::new(
        config,
        Arc::new(NullDiscovery::new()),
        Arc::new(NullSink::new()),
        decoder_factory(),
        observer.clone(),
    );

    let start_handle = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.start().await })
    };

    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(tcp).await.unwrap();
    start_handle.await.unwrap().expect("initial connect succeeds");

    // --- Handshake (S1) ---
    let hello = match tokio::time::timeout(Duration::from_secs(5), recv_message(&mut ws))
        .await
        .expect("client/hello did not arrive")
    {
        Message::ClientHello(hello) => hello,
        other => panic!("expected client/hello, got {other:?}"),
    };
    assert!(hello.supported_roles.iter().any(|r| r == "player@v1"));

    send_message(
        &mut ws,
        &Message::ServerHello(ServerHello {
            server_id: "mock-server".to_string(),
            name: "Mock Server".to_string(),
            version: 1,
            active_roles: vec![
                "player@v1".to_string(),
                "artwork@v1".to_string(),
                "visualizer@v1".to_string(),
            ],
        }),
    )
    .await;

    // Initial client/state, sent once right after the handshake.
    let initial_state = tokio::time::timeout(Duration::from_secs(5), recv_message(&mut ws))
        .await
        .expect("initial client/state did not arrive");
    assert!(matches!(initial_state, Message::ClientState(_)));

    // Five-round initial sync burst, spaced 100ms apart per the spec.
    let burst_elapsed = tokio::time::timeout(Duration::from_secs(5), ack_sync_burst(&mut ws, 5))
        .await
        .expect("sync burst did not complete");
    assert!(
        burst_elapsed < Duration::from_millis(900),
        "sync burst took {burst_elapsed:?}, expected well under a second"
    );

    send_message(
        &mut ws,
        &Message::StreamStart(StreamStart {
            player: StreamPlayerConfig {
                codec: "pcm".to_string(),
                sample_rate: 48_000,
                channels: 2,
                bit_depth: 16,
                codec_header: None,
            },
        }),
    )
    .await;

    // --- S2: a chunk far enough in the past to be dropped at ingress. ---
    ws.send(WsMessage::Binary(
        audio_frame(-1_000_000, &[0u8; 4]).into(),
    ))
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let (received, played, dropped) = supervisor
        .scheduler_stats()
        .await
        .expect("scheduler running after stream/start");
    assert_eq!((received, played, dropped), (1, 0, 1));

    // --- S1 continued: on-time chunks accumulate past the buffer target,
    // then play once real time catches up to their play instant. ---
    let silence = vec![0u8; 64];
    for i in 0..10i64 {
        let ts = 1_000_000 + i * 20_000;
        ws.send(WsMessage::Binary(audio_frame(ts, &silence).into()))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(900)).await;
    let (received, played, dropped) = supervisor.scheduler_stats().await.unwrap();
    assert_eq!(received, 11);
    assert_eq!(dropped, 1);
    assert!(
        played >= 8,
        "expected most of the 10 on-time chunks to have played, got {played}"
    );

    // --- S3: a volume command round-trips as an echoed client/state. ---
    send_message(
        &mut ws,
        &Message::ServerCommand(ServerCommand {
            player: Some(PlayerCommand {
                command: "volume".to_string(),
                volume: Some(37),
                mute: None,
            }),
        }),
    )
    .await;
    let echoed = recv_matching(
        &mut ws,
        |m| matches!(m, Message::ClientState(_)),
        Duration::from_millis(500),
    )
    .await;
    match echoed {
        Message::ClientState(ClientState { player: Some(p) }) => assert_eq!(p.volume, Some(37)),
        other => panic!("expected client/state with the echoed volume, got {other:?}"),
    }
    assert_eq!(supervisor.volume().await, 37);

    // --- S4: stream/clear notifies the observer. ---
    send_message(&mut ws, &Message::StreamClear(StreamClear {})).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(observer.stream_clears.load(Ordering::SeqCst), 1);

    // --- S6: closing the socket tears the session down and a reconnect
    // attempt opens a fresh connection. ---
    ws.close().await.ok();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!observer.connected.load(Ordering::SeqCst));

    let reconnect = tokio::time::timeout(Duration::from_secs(5), listener.accept()).await;
    assert!(
        reconnect.is_ok(),
        "expected a reconnect attempt to open a new connection"
    );

    supervisor.stop().await;
}

// ABOUTME: The session supervisor: owns the clock filter, scheduler, and protocol state machine
// ABOUTME: Wires the external collaborators (discovery, decoder, sink) and drives reconnection

use crate::audio::decode::Decoder;
use crate::audio::output::Sink;
use crate::audio::{AudioFormat, Codec};
use crate::config::Config;
use crate::connection::{Connection, ConnectionEvent, ReconnectPolicy, ServerAddress};
use crate::discovery::Discovery;
use crate::error::Error;
use crate::protocol::binary::AudioChunk;
use crate::protocol::messages::{
    ArtworkV1Support, ClientGoodbye, ClientHello, ClientState, ClientTime, ControllerState,
    DeviceInfo, GoodbyeReason, MetadataState, PlaybackState, PlayerState, PlayerSyncState,
    PlayerV1Support, ServerCommand, ServerState, ServerTime, StreamPlayerConfig,
    VisualizerV1Support,
};
use crate::protocol::{BinaryFrame, Message};
use crate::scheduler::Scheduler;
use crate::state::{PlaybackStateMirror, SessionState};
use crate::sync::{now_unix_us, ClockFilter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

const DECODE_TIMEOUT: Duration = Duration::from_secs(1);
const ADVERTISE_PERIOD: Duration = Duration::from_secs(10);
const SYNC_PERIOD: Duration = Duration::from_secs(1);
const INITIAL_SYNC_SPACING: Duration = Duration::from_millis(100);
const INITIAL_SYNC_SETTLE: Duration = Duration::from_millis(500);
const INITIAL_SYNC_ROUNDS: u32 = 5;

/// Host-facing event hooks. Every method has a no-op default so an embedder
/// only overrides what it cares about.
pub trait Observer: Send + Sync {
    fn on_stream_start(&self, _format: &AudioFormat) {}
    fn on_stream_end(&self) {}
    fn on_stream_clear(&self) {}
    /// Called from the scheduler's release path, once per chunk actually
    /// handed to the sink (not once per chunk received).
    fn on_audio_chunk(&self, _pcm: &[u8], _format: &AudioFormat) {}
    fn on_artwork_chunk(&self, _channel: u8, _data: &[u8]) {}
    fn on_visualizer_chunk(&self, _data: &[u8]) {}
    fn on_metadata(&self, _metadata: &MetadataState) {}
    fn on_playback_state_change(&self, _state: PlaybackStateMirror) {}
    fn on_connection_state_change(&self, _connected: bool) {}
}

/// An `Observer` that does nothing; the default when the host doesn't need
/// to watch every hook.
#[derive(Default)]
pub struct NullObserver;
impl Observer for NullObserver {}

/// Wraps the host's `Sink` so that every chunk actually released by the
/// scheduler also reaches `Observer::on_audio_chunk`, without the scheduler
/// itself needing to know about observers.
struct ObservingSink {
    inner: Arc<dyn Sink>,
    observer: Arc<dyn Observer>,
    format: StdMutex<Option<AudioFormat>>,
}

impl ObservingSink {
    fn new(inner: Arc<dyn Sink>, observer: Arc<dyn Observer>) -> Self {
        Self {
            inner,
            observer,
            format: StdMutex::new(None),
        }
    }
}

impl Sink for ObservingSink {
    fn start(&self, format: &AudioFormat) -> Result<(), Error> {
        *self.format.lock().unwrap() = Some(format.clone());
        self.inner.start(format)
    }

    fn play(&self, pcm: &[u8]) -> Result<(), Error> {
        let result = self.inner.play(pcm);
        if let Some(format) = self.format.lock().unwrap().clone() {
            self.observer.on_audio_chunk(pcm, &format);
        }
        result
    }

    fn clear_buffer(&self) {
        self.inner.clear_buffer();
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

fn map_playback_state(state: PlaybackState) -> PlaybackStateMirror {
    match state {
        PlaybackState::Playing => PlaybackStateMirror::Playing,
        PlaybackState::Paused => PlaybackStateMirror::Paused,
        PlaybackState::Stopped => PlaybackStateMirror::Stopped,
    }
}

/// Supported PCM formats, highest-quality-first, followed by Opus 48kHz/16.
fn capability_formats() -> Vec<crate::protocol::messages::AudioFormatSpec> {
    use crate::protocol::messages::AudioFormatSpec;
    let mut formats: Vec<AudioFormatSpec> = crate::audio::supported_pcm_formats()
        .into_iter()
        .map(|(sample_rate, bit_depth)| AudioFormatSpec {
            codec: "pcm".to_string(),
            channels: 2,
            sample_rate,
            bit_depth,
        })
        .collect();
    formats.push(AudioFormatSpec {
        codec: "opus".to_string(),
        channels: 2,
        sample_rate: 48_000,
        bit_depth: 16,
    });
    formats
}

/// Builds a fresh decoder for a newly started stream.
pub type DecoderFactory = Box<dyn Fn() -> Box<dyn Decoder> + Send + Sync>;

/// Owns the whole session: clock filter, scheduler, pending-sync table,
/// stream format, playback-state mirror, metadata, and the connection
/// lifecycle. Everything else in the core is a leaf this wires together.
pub struct Supervisor {
    config: Config,
    discovery: Arc<dyn Discovery>,
    sink: Arc<dyn Sink>,
    decoder_factory: DecoderFactory,
    observer: Arc<dyn Observer>,

    clock: AsyncMutex<ClockFilter>,
    pending_sync: AsyncMutex<HashMap<i64, i64>>,
    scheduler: AsyncMutex<Option<Arc<Scheduler>>>,
    active_sink: AsyncMutex<Option<Arc<dyn Sink>>>,
    decoder: AsyncMutex<Option<Box<dyn Decoder>>>,
    stream_format: AsyncMutex<Option<AudioFormat>>,
    metadata: AsyncMutex<MetadataState>,
    playback_state: AsyncMutex<PlaybackStateMirror>,
    state: AsyncMutex<SessionState>,
    connection: AsyncMutex<Option<Connection>>,
    sticky_address: AsyncMutex<Option<ServerAddress>>,
    reconnect_policy: AsyncMutex<ReconnectPolicy>,

    should_reconnect: AtomicBool,
    volume: AtomicU8,
    muted: AtomicBool,
    artwork_negotiated: AtomicBool,
    visualizer_negotiated: AtomicBool,

    session_task: StdMutex<Option<JoinHandle<()>>>,
    reconnect_task: StdMutex<Option<JoinHandle<()>>>,
    advertise_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(
        config: Config,
        discovery: Arc<dyn Discovery>,
        sink: Arc<dyn Sink>,
        decoder_factory: DecoderFactory,
        observer: Arc<dyn Observer>,
    ) -> Arc<Self> {
        let volume = config.initial_volume;
        let muted = config.initial_muted;

        Arc::new(Self {
            config,
            discovery,
            sink,
            decoder_factory,
            observer,
            clock: AsyncMutex::new(ClockFilter::new()),
            pending_sync: AsyncMutex::new(HashMap::new()),
            scheduler: AsyncMutex::new(None),
            active_sink: AsyncMutex::new(None),
            decoder: AsyncMutex::new(None),
            stream_format: AsyncMutex::new(None),
            metadata: AsyncMutex::new(MetadataState::default()),
            playback_state: AsyncMutex::new(PlaybackStateMirror::default()),
            state: AsyncMutex::new(SessionState::Disconnected),
            connection: AsyncMutex::new(None),
            sticky_address: AsyncMutex::new(None),
            reconnect_policy: AsyncMutex::new(ReconnectPolicy::new()),
            should_reconnect: AtomicBool::new(false),
            volume: AtomicU8::new(volume),
            muted: AtomicBool::new(muted),
            artwork_negotiated: AtomicBool::new(false),
            visualizer_negotiated: AtomicBool::new(false),
            session_task: StdMutex::new(None),
            reconnect_task: StdMutex::new(None),
            advertise_task: StdMutex::new(None),
        })
    }

    /// Resolve the server address, connect, and start the session. On
    /// failure with no configured address, fails fast with
    /// `DiscoveryTimeout`/`ConnectTimeout`; either way a reconnect is
    /// scheduled so the caller never has to retry manually.
    pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
        self.should_reconnect.store(true, Ordering::SeqCst);
        self.spawn_advertiser();

        let resolved = self.resolve_address().await?;
        *self.sticky_address.lock().await = Some(resolved);

        match Connection::connect(resolved.socket_addr()).await {
            Ok((connection, events)) => {
                self.reconnect_policy.lock().await.reset();
                self.spawn_session(connection, events);
                Ok(())
            }
            Err(e) => {
                log::warn!("initial connect failed: {e}");
                self.schedule_reconnect();
                Err(e)
            }
        }
    }

    /// Clears the reconnect flag, cancels all timers, attempts a clean
    /// goodbye, closes the socket, and tears down any active stream.
    pub async fn stop(self: &Arc<Self>) {
        self.should_reconnect.store(false, Ordering::SeqCst);

        if let Some(h) = self.reconnect_task.lock().unwrap().take() {
            h.abort();
        }
        if let Some(h) = self.advertise_task.lock().unwrap().take() {
            h.abort();
        }

        let connection = self.connection.lock().await.clone();
        if let Some(connection) = connection {
            connection
                .send_goodbye(&Message::ClientGoodbye(ClientGoodbye {
                    reason: GoodbyeReason::Shutdown,
                }))
                .await;
            connection.close().await;
        }

        if let Some(h) = self.session_task.lock().unwrap().take() {
            h.abort();
        }

        self.teardown_stream().await;
        *self.connection.lock().await = None;
        *self.state.lock().await = SessionState::Disconnected;
    }

    pub async fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    pub async fn muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub async fn playback_state(&self) -> PlaybackStateMirror {
        *self.playback_state.lock().await
    }

    /// `(received, played, dropped)` from the active stream's scheduler, or
    /// `None` when no stream has started yet.
    pub async fn scheduler_stats(&self) -> Option<(u64, u64, u64)> {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .map(|s| s.stats_snapshot())
    }

    async fn resolve_address(&self) -> Result<ServerAddress, Error> {
        if let Some(addr) = &self.config.server_addr {
            let parsed = addr
                .parse()
                .map_err(|_| Error::Config(format!("invalid server_addr: {addr}")))?;
            return Ok(ServerAddress::Configured(parsed));
        }
        let timeout = Duration::from_millis(self.config.discovery_timeout_ms);
        match self.discovery.discover(timeout).await? {
            Some(addr) => Ok(ServerAddress::Discovered(addr)),
            None => Err(Error::DiscoveryTimeout),
        }
    }

    fn spawn_advertiser(self: &Arc<Self>) {
        let discovery = Arc::clone(&self.discovery);
        let name = self.config.player_name.clone();
        let port = self.config.advertise_port;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ADVERTISE_PERIOD);
            loop {
                ticker.tick().await;
                discovery.advertise(&name, port).await;
            }
        });
        *self.advertise_task.lock().unwrap() = Some(handle);
    }

    fn spawn_session(
        self: &Arc<Self>,
        connection: Connection,
        events: UnboundedReceiver<ConnectionEvent>,
    ) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Err(e) = this.run_session(connection, events).await {
                log::warn!("session ended: {e}");
            }
            if this.should_reconnect.load(Ordering::SeqCst) {
                this.schedule_reconnect();
            }
        });
        *self.session_task.lock().unwrap() = Some(handle);
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if !self.should_reconnect.load(Ordering::SeqCst) {
            return;
        }
        self.observer.on_connection_state_change(false);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let delay = this.reconnect_policy.lock().await.next_delay();
            log::info!(
                "reconnect attempt #{} in {}ms",
                this.reconnect_policy.lock().await.attempt(),
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            if !this.should_reconnect.load(Ordering::SeqCst) {
                return;
            }
            this.attempt_reconnect().await;
        });
        *self.reconnect_task.lock().unwrap() = Some(handle);
    }

    async fn attempt_reconnect(self: &Arc<Self>) {
        let sticky = *self.sticky_address.lock().await;
        let resolved = match sticky {
            Some(ServerAddress::Configured(_)) => sticky.unwrap(),
            _ => match self.resolve_address().await {
                Ok(addr) => addr,
                Err(e) => {
                    log::warn!("rediscovery failed: {e}");
                    self.schedule_reconnect();
                    return;
                }
            },
        };
        *self.sticky_address.lock().await = Some(resolved);

        match Connection::connect(resolved.socket_addr()).await {
            Ok((connection, events)) => {
                self.reconnect_policy.lock().await.reset();
                self.spawn_session(connection, events);
            }
            Err(e) => {
                log::warn!("reconnect attempt failed: {e}");
                self.schedule_reconnect();
            }
        }
    }

    async fn run_session(
        self: &Arc<Self>,
        connection: Connection,
        mut events: UnboundedReceiver<ConnectionEvent>,
    ) -> Result<(), Error> {
        *self.state.lock().await = SessionState::HandshakePending;
        connection.send(&self.build_hello()).await?;

        loop {
            match events.recv().await {
                Some(ConnectionEvent::Text(Message::ServerHello(hello))) => {
                    log::info!("connected to {} ({})", hello.name, hello.server_id);
                    self.artwork_negotiated.store(
                        hello.active_roles.iter().any(|r| r == "artwork@v1"),
                        Ordering::SeqCst,
                    );
                    self.visualizer_negotiated.store(
                        hello.active_roles.iter().any(|r| r == "visualizer@v1"),
                        Ordering::SeqCst,
                    );
                    break;
                }
                Some(ConnectionEvent::Closed(reason)) => {
                    return Err(Error::Connection(reason.unwrap_or_default()));
                }
                Some(_) => continue,
                None => return Err(Error::Connection("closed before handshake".to_string())),
            }
        }

        *self.state.lock().await = SessionState::SyncBootstrapping;
        *self.connection.lock().await = Some(connection.clone());
        self.observer.on_connection_state_change(true);

        connection.send(&self.initial_client_state()).await?;
        self.run_initial_sync(&connection).await;

        *self.state.lock().await = SessionState::Idle;
        let sync_task = self.spawn_sync_loop(connection.clone());

        let result = self.message_loop(&connection, &mut events).await;

        sync_task.abort();
        self.teardown_stream().await;
        self.observer.on_connection_state_change(false);
        *self.connection.lock().await = None;

        result
    }

    fn build_hello(&self) -> Message {
        let player_support = PlayerV1Support {
            supported_formats: capability_formats(),
            buffer_capacity: 1_048_576,
            supported_commands: vec!["volume".to_string(), "mute".to_string()],
        };
        let artwork_support = ArtworkV1Support {
            channels: vec![0, 1, 2, 3],
        };
        let visualizer_support = VisualizerV1Support {
            buffer_capacity: 1_048_576,
        };

        Message::ClientHello(ClientHello {
            client_id: self.config.persistent_client_id.to_string(),
            name: self.config.player_name.clone(),
            version: 1,
            supported_roles: vec![
                "player@v1".to_string(),
                "metadata@v1".to_string(),
                "artwork@v1".to_string(),
                "visualizer@v1".to_string(),
            ],
            device_info: Some(DeviceInfo {
                product_name: Some(self.config.player_name.clone()),
                manufacturer: Some("Sendspin".to_string()),
                software_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            player_v1_support: Some(player_support.clone()),
            artwork_v1_support: Some(artwork_support.clone()),
            visualizer_v1_support: Some(visualizer_support.clone()),
            player_support: Some(player_support),
            metadata_support: Some(serde_json::json!({})),
            artwork_support: Some(artwork_support),
            visualizer_support: Some(visualizer_support),
        })
    }

    fn initial_client_state(&self) -> Message {
        Message::ClientState(ClientState {
            player: Some(PlayerState {
                state: PlayerSyncState::Synchronized,
                volume: Some(self.volume.load(Ordering::SeqCst)),
                muted: Some(false),
            }),
        })
    }

    async fn run_initial_sync(&self, connection: &Connection) {
        for round in 0..INITIAL_SYNC_ROUNDS {
            self.send_client_time(connection).await;
            if round + 1 < INITIAL_SYNC_ROUNDS {
                tokio::time::sleep(INITIAL_SYNC_SPACING).await;
            }
        }
        tokio::time::sleep(INITIAL_SYNC_SETTLE).await;
        self.purge_stale_pending().await;
    }

    async fn send_client_time(&self, connection: &Connection) {
        let t1 = now_unix_us();
        self.pending_sync.lock().await.insert(t1, t1);
        if let Err(e) = connection
            .send(&Message::ClientTime(ClientTime { client_transmitted: t1 }))
            .await
        {
            log::warn!("failed to send client/time: {e}");
        }
    }

    async fn purge_stale_pending(&self) {
        let now = now_unix_us();
        self.pending_sync
            .lock()
            .await
            .retain(|_, sent_at| now - *sent_at <= 2_000_000);
    }

    fn spawn_sync_loop(self: &Arc<Self>, connection: Connection) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SYNC_PERIOD);
            loop {
                ticker.tick().await;
                this.purge_stale_pending().await;
                this.send_client_time(&connection).await;
                this.clock.lock().await.tick();
            }
        })
    }

    async fn message_loop(
        self: &Arc<Self>,
        connection: &Connection,
        events: &mut UnboundedReceiver<ConnectionEvent>,
    ) -> Result<(), Error> {
        loop {
            match events.recv().await {
                Some(ConnectionEvent::Text(message)) => self.handle_text(connection, message).await,
                Some(ConnectionEvent::Binary(frame)) => self.handle_binary(frame).await,
                Some(ConnectionEvent::Closed(reason)) => {
                    return Err(Error::SocketClosed(reason.unwrap_or_default()));
                }
                None => return Err(Error::SocketClosed("event channel dropped".to_string())),
            }
        }
    }

    async fn handle_text(self: &Arc<Self>, connection: &Connection, message: Message) {
        match message {
            Message::ServerTime(st) => self.handle_server_time(st).await,
            Message::ServerCommand(cmd) => self.handle_server_command(connection, cmd).await,
            Message::ServerState(state) => self.handle_server_state(state).await,
            Message::StreamStart(ss) => self.start_stream(ss.player).await,
            Message::StreamEnd(_) => self.end_stream().await,
            Message::StreamClear(_) => self.clear_stream().await,
            Message::GroupUpdate(u) => self.handle_playback_update(u.playback_state).await,
            Message::SessionUpdate(u) => self.handle_playback_update(u.playback_state).await,
            other => log::trace!("no mid-session handler for {other:?}"),
        }
    }

    async fn handle_server_time(&self, st: ServerTime) {
        let t4 = now_unix_us();
        let had_pending = self
            .pending_sync
            .lock()
            .await
            .remove(&st.client_transmitted)
            .is_some();
        if !had_pending {
            log::debug!("stale server/time response for t1={}", st.client_transmitted);
            return;
        }
        let rtt = self.clock.lock().await.submit_sample(
            st.client_transmitted,
            st.server_received,
            st.server_transmitted,
            t4,
        );
        log::trace!("sync sample accepted rtt={rtt}us");
    }

    async fn handle_server_command(&self, connection: &Connection, cmd: ServerCommand) {
        let Some(player) = cmd.player else { return };
        match player.command.as_str() {
            "volume" => {
                if let Some(v) = player.volume {
                    self.volume.store(v, Ordering::SeqCst);
                }
            }
            "mute" => {
                if let Some(m) = player.mute {
                    self.muted.store(m, Ordering::SeqCst);
                }
            }
            other => {
                log::debug!("ignoring unknown player command: {other}");
                return;
            }
        }

        let echo = Message::ClientState(ClientState {
            player: Some(PlayerState {
                state: PlayerSyncState::Synchronized,
                volume: Some(self.volume.load(Ordering::SeqCst)),
                muted: Some(self.muted.load(Ordering::SeqCst)),
            }),
        });
        if let Err(e) = connection.send(&echo).await {
            log::warn!("failed to echo client/state: {e}");
        }
    }

    async fn handle_server_state(&self, state: ServerState) {
        if let Some(metadata) = state.metadata {
            *self.metadata.lock().await = metadata.clone();
            self.observer.on_metadata(&metadata);
        }
        if let Some(ControllerState { playback_state: Some(ps), .. }) = state.controller {
            self.handle_playback_update(Some(ps)).await;
        }
    }

    async fn handle_playback_update(&self, state: Option<PlaybackState>) {
        if let Some(state) = state {
            let mirrored = map_playback_state(state);
            *self.playback_state.lock().await = mirrored;
            self.observer.on_playback_state_change(mirrored);
        }
    }

    async fn handle_binary(self: &Arc<Self>, frame: BinaryFrame) {
        match frame {
            BinaryFrame::Audio(chunk) => self.handle_audio_chunk(chunk).await,
            BinaryFrame::Artwork(a) => {
                if self.artwork_negotiated.load(Ordering::SeqCst) {
                    self.observer.on_artwork_chunk(a.channel, &a.data);
                } else {
                    log::trace!("discarding artwork chunk, artwork@v1 not negotiated");
                }
            }
            BinaryFrame::Visualizer(v) => {
                if self.visualizer_negotiated.load(Ordering::SeqCst) {
                    self.observer.on_visualizer_chunk(&v.data);
                } else {
                    log::trace!("discarding visualizer chunk, visualizer@v1 not negotiated");
                }
            }
            BinaryFrame::Unknown { type_id, .. } => {
                log::trace!("discarding unknown binary frame kind {type_id}")
            }
        }
    }

    async fn handle_audio_chunk(&self, chunk: AudioChunk) {
        let scheduler = match self.scheduler.lock().await.as_ref() {
            Some(s) => Arc::clone(s),
            None => return,
        };
        let play_at = self.clock.lock().await.server_to_unix_us(chunk.timestamp);

        let mut decoder_guard = self.decoder.lock().await;
        let Some(decoder) = decoder_guard.as_mut() else {
            return;
        };
        let decode_result =
            tokio::time::timeout(DECODE_TIMEOUT, async { decoder.decode(&chunk.data) }).await;
        drop(decoder_guard);

        let decoded = match decode_result {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                log::warn!("decode failed: {e}");
                return;
            }
            Err(_) => {
                log::warn!("decode timed out");
                return;
            }
        };

        scheduler.enqueue(play_at, Arc::from(decoded), chunk.timestamp);
    }

    async fn start_stream(self: &Arc<Self>, player: StreamPlayerConfig) {
        let format = AudioFormat {
            codec: Codec::from_wire_name(&player.codec).unwrap_or(Codec::Pcm),
            sample_rate: player.sample_rate,
            channels: player.channels,
            bit_depth: player.bit_depth,
            codec_header: player.codec_header,
        };
        *self.stream_format.lock().await = Some(format.clone());

        let mut decoder = (self.decoder_factory)();
        if let Err(e) = decoder.initialize(&format) {
            log::warn!("decoder initialize failed: {e}");
        }
        *self.decoder.lock().await = Some(decoder);

        let observing_sink: Arc<dyn Sink> = Arc::new(ObservingSink::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.observer),
        ));
        if let Err(e) = observing_sink.start(&format) {
            log::warn!("sink start failed: {e}");
        }
        *self.active_sink.lock().await = Some(Arc::clone(&observing_sink));

        let scheduler = Scheduler::new(self.config.buffer_ms, observing_sink);
        scheduler.start();
        *self.scheduler.lock().await = Some(scheduler);

        *self.state.lock().await = SessionState::Streaming;
        self.observer.on_stream_start(&format);
    }

    async fn clear_stream(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.as_ref() {
            scheduler.clear();
        }
        if let Some(sink) = self.active_sink.lock().await.as_ref() {
            sink.clear_buffer();
        }
        self.observer.on_stream_clear();
    }

    async fn end_stream(&self) {
        self.teardown_stream().await;
        *self.state.lock().await = SessionState::Idle;
        self.observer.on_stream_end();
    }

    async fn teardown_stream(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop();
        }
        if let Some(sink) = self.active_sink.lock().await.take() {
            sink.stop();
        }
        if let Some(mut decoder) = self.decoder.lock().await.take() {
            decoder.cleanup();
        }
        *self.stream_format.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_formats_list_pcm_then_opus() {
        let formats = capability_formats();
        assert_eq!(formats.last().unwrap().codec, "opus");
        assert_eq!(formats[0].codec, "pcm");
        assert_eq!(formats[0].sample_rate, 192_000);
    }

    #[test]
    fn map_playback_state_preserves_variant() {
        assert_eq!(
            map_playback_state(PlaybackState::Playing),
            PlaybackStateMirror::Playing
        );
        assert_eq!(
            map_playback_state(PlaybackState::Stopped),
            PlaybackStateMirror::Stopped
        );
    }
}

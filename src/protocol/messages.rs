// ABOUTME: Protocol text message type definitions and serialization
// ABOUTME: Supports all Sendspin protocol messages per spec

use serde::{Deserialize, Serialize};

/// Top-level protocol message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    // === Handshake messages ===
    /// Client hello handshake message.
    #[serde(rename = "client/hello")]
    ClientHello(ClientHello),

    /// Server hello handshake response.
    #[serde(rename = "server/hello")]
    ServerHello(ServerHello),

    // === Time synchronization ===
    /// Client time synchronization request.
    #[serde(rename = "client/time")]
    ClientTime(ClientTime),

    /// Server time synchronization response.
    #[serde(rename = "server/time")]
    ServerTime(ServerTime),

    // === State messages ===
    /// Client state update.
    #[serde(rename = "client/state")]
    ClientState(ClientState),

    /// Server state update (metadata, controller info).
    #[serde(rename = "server/state")]
    ServerState(ServerState),

    // === Command messages ===
    /// Server command to client (player commands).
    #[serde(rename = "server/command")]
    ServerCommand(ServerCommand),

    /// Client command to server (controller commands). Parsed for protocol
    /// completeness; this player endpoint never constructs one of its own.
    #[serde(rename = "client/command")]
    ClientCommand(ClientCommand),

    // === Stream control messages ===
    /// Stream start notification.
    #[serde(rename = "stream/start")]
    StreamStart(StreamStart),

    /// Stream end notification.
    #[serde(rename = "stream/end")]
    StreamEnd(StreamEnd),

    /// Stream clear notification (seek).
    #[serde(rename = "stream/clear")]
    StreamClear(StreamClear),

    // === Group / session messages ===
    /// Group update notification.
    #[serde(rename = "group/update")]
    GroupUpdate(GroupUpdate),

    /// Session update notification (alternate carrier of playback state).
    #[serde(rename = "session/update")]
    SessionUpdate(SessionUpdate),

    // === Connection lifecycle ===
    /// Client goodbye message.
    #[serde(rename = "client/goodbye")]
    ClientGoodbye(ClientGoodbye),
}

// =============================================================================
// Handshake Messages
// =============================================================================

/// Client hello message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientHello {
    pub client_id: String,
    pub name: String,
    pub version: u32,
    /// e.g. `["player@v1", "metadata@v1", "artwork@v1", "visualizer@v1"]`.
    pub supported_roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,

    #[serde(rename = "player@v1_support", skip_serializing_if = "Option::is_none")]
    pub player_v1_support: Option<PlayerV1Support>,
    #[serde(rename = "artwork@v1_support", skip_serializing_if = "Option::is_none")]
    pub artwork_v1_support: Option<ArtworkV1Support>,
    #[serde(rename = "visualizer@v1_support", skip_serializing_if = "Option::is_none")]
    pub visualizer_v1_support: Option<VisualizerV1Support>,

    /// Legacy unversioned duplicate of `player@v1_support`, carried for
    /// servers that predate the `@v1` role-versioning scheme.
    #[serde(rename = "player_support", skip_serializing_if = "Option::is_none")]
    pub player_support: Option<PlayerV1Support>,
    /// Legacy unversioned duplicate of the `metadata@v1` role, carried as an
    /// empty marker object since metadata capability has no parameters.
    #[serde(rename = "metadata_support", skip_serializing_if = "Option::is_none")]
    pub metadata_support: Option<serde_json::Value>,
    #[serde(rename = "artwork_support", skip_serializing_if = "Option::is_none")]
    pub artwork_support: Option<ArtworkV1Support>,
    #[serde(rename = "visualizer_support", skip_serializing_if = "Option::is_none")]
    pub visualizer_support: Option<VisualizerV1Support>,
}

/// Device information; all fields optional per spec.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
}

/// Player@v1 capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerV1Support {
    /// Supported formats, highest-quality-first.
    pub supported_formats: Vec<AudioFormatSpec>,
    /// Buffer capacity in bytes.
    pub buffer_capacity: u32,
    /// Supported playback commands, e.g. `["volume", "mute"]`.
    pub supported_commands: Vec<String>,
}

/// Audio format specification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormatSpec {
    pub codec: String,
    pub channels: u8,
    pub sample_rate: u32,
    pub bit_depth: u8,
}

/// Artwork@v1 capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtworkV1Support {
    /// Supported artwork channels (0-3).
    pub channels: Vec<u8>,
}

/// Visualizer@v1 capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizerV1Support {
    pub buffer_capacity: u32,
}

/// Server hello message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerHello {
    pub server_id: String,
    pub name: String,
    pub version: u32,
    pub active_roles: Vec<String>,
}

// =============================================================================
// Time Synchronization
// =============================================================================

/// Client time sync request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClientTime {
    /// Client transmission timestamp, Unix microseconds.
    pub client_transmitted: i64,
}

/// Server time sync response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServerTime {
    /// Echoed client transmission timestamp (t1), Unix microseconds.
    pub client_transmitted: i64,
    /// Server reception timestamp (t2), server-loop microseconds.
    pub server_received: i64,
    /// Server transmission timestamp (t3), server-loop microseconds.
    pub server_transmitted: i64,
}

// =============================================================================
// State Messages
// =============================================================================

/// Client state update (wraps role-specific state).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerState>,
}

/// Player state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerState {
    pub state: PlayerSyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

/// Player synchronization state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSyncState {
    Synchronized,
    Error,
}

/// Server state update (metadata and controller info).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<ControllerState>,
}

/// Metadata state from the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetadataState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<TrackProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
}

/// Track progress information.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackProgress {
    /// Current position, microseconds.
    pub position: i64,
    /// Total duration, microseconds.
    pub duration: i64,
}

/// Repeat mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    Off,
    One,
    All,
}

/// Controller state from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerState {
    pub supported_commands: Vec<String>,
    pub volume: u8,
    pub muted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_state: Option<PlaybackState>,
}

// =============================================================================
// Command Messages
// =============================================================================

/// Server command (wraps role-specific commands).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerCommand>,
}

/// Player-specific command from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerCommand {
    /// `"volume"` or `"mute"`.
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
}

/// Client command (controller commands to server). Parsed only; never sent
/// by this player endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<ControllerCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerCommand {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
}

// =============================================================================
// Stream Control Messages
// =============================================================================

/// Stream start message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamStart {
    pub player: StreamPlayerConfig,
}

/// Stream player configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamPlayerConfig {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_header: Option<String>,
}

/// Stream end message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamEnd {}

/// Stream clear message (seek).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamClear {}

// =============================================================================
// Group / Session Messages
// =============================================================================

/// Group update notification.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_state: Option<PlaybackState>,
}

/// Session update notification; an alternate carrier of `playback_state`
/// alongside `group/update`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_state: Option<PlaybackState>,
}

/// Playback state as reported by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

// =============================================================================
// Connection Lifecycle
// =============================================================================

/// Client goodbye message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientGoodbye {
    pub reason: GoodbyeReason,
}

/// Goodbye reason.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoodbyeReason {
    Shutdown,
    UserRequest,
}

// ABOUTME: Player configuration: load/save the JSON config file, persistent client id
// ABOUTME: Mirrors the fields consumed by the Supervisor in the protocol spec

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn default_buffer_ms() -> u64 {
    11_000
}

fn default_initial_volume() -> u8 {
    100
}

fn default_discovery_timeout_ms() -> u64 {
    10_000
}

fn default_advertise_port() -> u16 {
    8927
}

/// Configuration consumed by the Supervisor.
///
/// `persistent_client_id` is generated once on first run and then kept
/// across restarts; everything else may be edited between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// "host:port" if configured; `None` means rely on discovery.
    #[serde(default)]
    pub server_addr: Option<String>,

    /// Human-readable player name, typically the host name.
    pub player_name: String,

    /// Jitter buffer target, in milliseconds of audio.
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u64,

    /// Initial volume, 0..=100.
    #[serde(default = "default_initial_volume")]
    pub initial_volume: u8,

    /// Initial mute state.
    #[serde(default)]
    pub initial_muted: bool,

    /// How long to browse for a server before giving up, in milliseconds.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// Port this player advertises itself on via mDNS.
    #[serde(default = "default_advertise_port")]
    pub advertise_port: u16,

    /// Persistent 128-bit client identifier, generated once.
    pub persistent_client_id: Uuid,
}

impl Config {
    /// Build a config with the given player name and a freshly generated
    /// client id, all other fields at their documented defaults.
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            server_addr: None,
            player_name: player_name.into(),
            buffer_ms: default_buffer_ms(),
            initial_volume: default_initial_volume(),
            initial_muted: false,
            discovery_timeout_ms: default_discovery_timeout_ms(),
            advertise_port: default_advertise_port(),
            persistent_client_id: Uuid::new_v4(),
        }
    }

    /// Default config file path: `<config dir>/sendspin/player.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sendspin").join("player.json"))
    }

    /// Load config from `path`, creating it with defaults (and a fresh
    /// persistent client id) if it does not exist yet.
    pub fn load_or_init(path: &Path, default_player_name: impl Into<String>) -> Result<Self, Error> {
        if path.exists() {
            let bytes = std::fs::read(path)?;
            let config: Config = serde_json::from_slice(&bytes)?;
            Ok(config)
        } else {
            let config = Config::new(default_player_name);
            config.save(path)?;
            Ok(config)
        }
    }

    /// Persist this config to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

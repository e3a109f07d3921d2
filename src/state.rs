// ABOUTME: Session state machine states and the playback-state mirror
// ABOUTME: The Supervisor is what actually drives transitions; this module is the vocabulary

use serde::{Deserialize, Serialize};

/// Session lifecycle states.
///
/// `Disconnected -> Connecting -> HandshakePending -> SyncBootstrapping ->
/// Streaming <-> Idle -> Closing -> Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    HandshakePending,
    SyncBootstrapping,
    Idle,
    Streaming,
    Closing,
}

impl SessionState {
    /// True once the session has passed the initial sync bootstrap and can
    /// legitimately receive `stream/start`/`stream/end`.
    pub fn accepts_stream_lifecycle(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Streaming)
    }
}

/// Playback state mirror, reflecting the server's last reported transport
/// state. Gates whether the sink should be considered actively rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStateMirror {
    Playing,
    Paused,
    Idle,
    Stopped,
}

impl Default for PlaybackStateMirror {
    fn default() -> Self {
        PlaybackStateMirror::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_idle_and_streaming_accept_stream_lifecycle_messages() {
        assert!(SessionState::Idle.accepts_stream_lifecycle());
        assert!(SessionState::Streaming.accepts_stream_lifecycle());
        assert!(!SessionState::Connecting.accepts_stream_lifecycle());
        assert!(!SessionState::SyncBootstrapping.accepts_stream_lifecycle());
    }
}

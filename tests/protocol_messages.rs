use sendspin::protocol::messages::{
    ArtworkV1Support, AudioFormatSpec, ClientCommand, ClientGoodbye, ClientHello, ClientState,
    ControllerCommand, ControllerState, DeviceInfo, GoodbyeReason, GroupUpdate, Message,
    MetadataState, PlaybackState, PlayerState, PlayerSyncState, PlayerV1Support, RepeatMode,
    ServerState, StreamClear, StreamEnd, TrackProgress, VisualizerV1Support,
};

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn client_hello_serialization_carries_versioned_and_legacy_support() {
    let player_support = PlayerV1Support {
        supported_formats: vec![AudioFormatSpec {
            codec: "pcm".to_string(),
            channels: 2,
            sample_rate: 48000,
            bit_depth: 24,
        }],
        buffer_capacity: 100,
        supported_commands: vec!["volume".to_string(), "mute".to_string()],
    };
    let artwork_support = ArtworkV1Support { channels: vec![0, 1, 2, 3] };
    let visualizer_support = VisualizerV1Support { buffer_capacity: 1024 };

    let hello = ClientHello {
        client_id: "test-client-123".to_string(),
        name: "Test Player".to_string(),
        version: 1,
        supported_roles: vec!["player@v1".to_string()],
        device_info: Some(DeviceInfo {
            product_name: Some("Sendspin Player".to_string()),
            manufacturer: Some("Sendspin".to_string()),
            software_version: Some("0.1.0".to_string()),
        }),
        player_v1_support: Some(player_support.clone()),
        artwork_v1_support: Some(artwork_support.clone()),
        visualizer_v1_support: Some(visualizer_support.clone()),
        player_support: Some(player_support),
        metadata_support: Some(serde_json::json!({})),
        artwork_support: Some(artwork_support),
        visualizer_support: Some(visualizer_support),
    };

    let message = Message::ClientHello(hello);
    let json = serde_json::to_string(&message).unwrap();

    assert!(json.contains("\"type\":\"client/hello\""));
    assert!(json.contains("\"client_id\":\"test-client-123\""));
    assert!(json.contains("\"player@v1_support\""));
    assert!(json.contains("\"player_support\""));
}

#[test]
fn server_hello_deserialization() {
    let json = r#"{
        "type": "server/hello",
        "payload": {
            "server_id": "server-456",
            "name": "Test Server",
            "version": 1,
            "active_roles": ["player@v1"]
        }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();

    match message {
        Message::ServerHello(hello) => {
            assert_eq!(hello.server_id, "server-456");
            assert_eq!(hello.name, "Test Server");
            assert_eq!(hello.version, 1);
            assert_eq!(hello.active_roles, vec!["player@v1"]);
        }
        _ => panic!("expected ServerHello"),
    }
}

// =============================================================================
// State Tests
// =============================================================================

#[test]
fn client_state_serialization() {
    let state = ClientState {
        player: Some(PlayerState {
            state: PlayerSyncState::Synchronized,
            volume: Some(100),
            muted: Some(false),
        }),
    };

    let message = Message::ClientState(state);
    let json = serde_json::to_string(&message).unwrap();

    assert!(json.contains("\"type\":\"client/state\""));
    assert!(json.contains("\"state\":\"synchronized\""));
    assert!(json.contains("\"volume\":100"));
}

#[test]
fn player_sync_state_error_serializes_lowercase() {
    let state = ClientState {
        player: Some(PlayerState {
            state: PlayerSyncState::Error,
            volume: None,
            muted: None,
        }),
    };

    let message = Message::ClientState(state);
    let json = serde_json::to_string(&message).unwrap();

    assert!(json.contains("\"state\":\"error\""));
    assert!(!json.contains("volume"));
}

#[test]
fn server_state_metadata_deserialization() {
    let json = r#"{
        "type": "server/state",
        "payload": {
            "metadata": {
                "title": "Test Song",
                "artist": "Test Artist",
                "album": "Test Album",
                "year": 2024,
                "progress": {
                    "position": 60000000,
                    "duration": 180000000
                },
                "repeat": "off",
                "shuffle": false
            }
        }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();

    match message {
        Message::ServerState(state) => {
            let metadata: MetadataState = state.metadata.expect("expected metadata");
            assert_eq!(metadata.title, Some("Test Song".to_string()));
            assert_eq!(metadata.artist, Some("Test Artist".to_string()));
            assert_eq!(metadata.album, Some("Test Album".to_string()));
            assert_eq!(metadata.year, Some(2024));

            let progress: TrackProgress = metadata.progress.expect("expected progress");
            assert_eq!(progress.position, 60000000);
            assert_eq!(progress.duration, 180000000);

            assert_eq!(metadata.repeat, Some(RepeatMode::Off));
            assert_eq!(metadata.shuffle, Some(false));
        }
        _ => panic!("expected ServerState"),
    }
}

#[test]
fn server_state_controller_deserialization_carries_playback_state() {
    let json = r#"{
        "type": "server/state",
        "payload": {
            "controller": {
                "supported_commands": ["volume", "mute"],
                "volume": 75,
                "muted": false,
                "playback_state": "playing"
            }
        }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();

    match message {
        Message::ServerState(state) => {
            let controller: ControllerState = state.controller.expect("expected controller");
            assert_eq!(controller.volume, 75);
            assert!(!controller.muted);
            assert!(controller.supported_commands.contains(&"volume".to_string()));
            assert_eq!(controller.playback_state, Some(PlaybackState::Playing));
        }
        _ => panic!("expected ServerState"),
    }
}

// =============================================================================
// Command Tests (parsed only; never sent by this player endpoint)
// =============================================================================

#[test]
fn client_command_deserialization() {
    let json = r#"{
        "type": "client/command",
        "payload": {
            "controller": {
                "command": "play"
            }
        }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();
    match message {
        Message::ClientCommand(ClientCommand { controller: Some(ControllerCommand { command, .. }) }) => {
            assert_eq!(command, "play");
        }
        _ => panic!("expected ClientCommand with a controller command"),
    }
}

// =============================================================================
// Stream Control Tests
// =============================================================================

#[test]
fn stream_end_deserialization() {
    let json = r#"{"type": "stream/end", "payload": {}}"#;
    let message: Message = serde_json::from_str(json).unwrap();
    assert!(matches!(message, Message::StreamEnd(StreamEnd {})));
}

#[test]
fn stream_clear_deserialization() {
    let json = r#"{"type": "stream/clear", "payload": {}}"#;
    let message: Message = serde_json::from_str(json).unwrap();
    assert!(matches!(message, Message::StreamClear(StreamClear {})));
}

// =============================================================================
// Group / Session Tests
// =============================================================================

#[test]
fn group_update_deserialization() {
    let json = r#"{
        "type": "group/update",
        "payload": { "playback_state": "playing" }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();

    match message {
        Message::GroupUpdate(GroupUpdate { playback_state }) => {
            assert_eq!(playback_state, Some(PlaybackState::Playing));
        }
        _ => panic!("expected GroupUpdate"),
    }
}

#[test]
fn playback_state_variants_roundtrip() {
    let states = [
        (r#""playing""#, PlaybackState::Playing),
        (r#""paused""#, PlaybackState::Paused),
        (r#""stopped""#, PlaybackState::Stopped),
    ];

    for (json_val, expected) in states {
        let parsed: PlaybackState = serde_json::from_str(json_val).unwrap();
        assert_eq!(parsed, expected);
    }
}

// =============================================================================
// Goodbye Tests
// =============================================================================

#[test]
fn client_goodbye_serialization() {
    let goodbye = ClientGoodbye { reason: GoodbyeReason::Shutdown };
    let message = Message::ClientGoodbye(goodbye);
    let json = serde_json::to_string(&message).unwrap();

    assert!(json.contains("\"type\":\"client/goodbye\""));
    assert!(json.contains("\"reason\":\"shutdown\""));
}

#[test]
fn goodbye_reason_variants_roundtrip() {
    let reasons = [
        (r#""shutdown""#, GoodbyeReason::Shutdown),
        (r#""user_request""#, GoodbyeReason::UserRequest),
    ];

    for (json_val, expected) in reasons {
        let parsed: GoodbyeReason = serde_json::from_str(json_val).unwrap();
        assert_eq!(parsed, expected);
    }
}

// =============================================================================
// Repeat Mode Tests
// =============================================================================

#[test]
fn repeat_mode_variants_roundtrip() {
    let modes = [
        (r#""off""#, RepeatMode::Off),
        (r#""one""#, RepeatMode::One),
        (r#""all""#, RepeatMode::All),
    ];

    for (json_val, expected) in modes {
        let parsed: RepeatMode = serde_json::from_str(json_val).unwrap();
        assert_eq!(parsed, expected);
    }
}

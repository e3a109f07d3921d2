// ABOUTME: Centralized error type for the Sendspin player core
// ABOUTME: Every failure kind named in the protocol spec is a variant here

use thiserror::Error;

/// Errors produced by the Sendspin player core.
///
/// Per the propagation policy: only `ConnectTimeout` at initial start with
/// reconnect disabled is meant to escape the core. Every other variant is
/// recovered locally by the component that produced it (dropped chunk,
/// scheduled reconnect, logged-and-ignored frame); this enum exists so each
/// of those components has a precise thing to log and match on, not because
/// callers are expected to propagate all of it with `?`.
///
/// Sync-quality degradation and scheduler drop/reject classification are
/// deliberately *not* variants here: `ClockFilter` reports the former as
/// `SyncQuality` and `Scheduler` reports the latter as counters in
/// `SchedulerStats`, both read continuously rather than raised once, which
/// fits a stats/quality accumulator better than a one-shot `Error`.
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket connect attempt did not complete within the connect timeout.
    #[error("connect timed out")]
    ConnectTimeout,

    /// The socket closed, expectedly or not, while a send/receive was in flight.
    #[error("socket closed: {0}")]
    SocketClosed(String),

    /// A transport-level WebSocket error.
    #[error("socket error: {0}")]
    SocketError(String),

    /// A binary frame was too short to contain its required header.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A text message's `type` field did not match any known message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The decoder returned an error for a chunk.
    #[error("decode failed: {0}")]
    DecodeFailure(String),

    /// `discover()` did not resolve an address within the discovery timeout.
    #[error("discovery timed out")]
    DiscoveryTimeout,

    /// JSON (de)serialization failure in the protocol codec.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failure establishing or using the WebSocket connection itself.
    #[error("connection error: {0}")]
    Connection(String),

    /// Audio sink failure.
    #[error("output error: {0}")]
    Output(String),

    /// Configuration load/save failure.
    #[error("config error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::SocketError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Config(e.to_string())
    }
}

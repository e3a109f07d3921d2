// ABOUTME: Sendspin player core: protocol codec, clock sync, jitter scheduler, session supervisor
// ABOUTME: Host applications provide a Sink/Discovery/Decoder and an Observer; this crate does the rest

pub mod audio;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod state;
pub mod supervisor;
pub mod sync;

pub use config::Config;
pub use error::Error;
pub use supervisor::{NullObserver, Observer, Supervisor};

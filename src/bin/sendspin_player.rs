// ABOUTME: Sendspin player CLI: loads config, wires collaborators, runs the supervisor until Ctrl-C
// ABOUTME: Device/discovery collaborators are chosen by Cargo feature; NullSink/NullDiscovery otherwise

use clap::Parser;
use sendspin::audio::decode::PcmDecoder;
use sendspin::{Config, NullObserver, Supervisor};
use std::sync::Arc;

#[cfg(feature = "cpal-sink")]
use sendspin::audio::output::CpalSink;
#[cfg(not(feature = "cpal-sink"))]
use sendspin::audio::output::NullSink;
#[cfg(feature = "mdns-discovery")]
use sendspin::discovery::MdnsDiscovery;
#[cfg(not(feature = "mdns-discovery"))]
use sendspin::discovery::NullDiscovery;

/// Sendspin player endpoint.
#[derive(Parser, Debug)]
#[command(name = "sendspin-player")]
#[command(about = "Connect to a Sendspin server and play the synchronized audio stream")]
struct Args {
    /// Server address as "host:port"; omit to discover one via mDNS.
    #[arg(short, long)]
    server: Option<String>,

    /// Player name advertised in the handshake and over mDNS.
    #[arg(short, long)]
    name: Option<String>,

    /// Jitter buffer depth, in milliseconds of audio.
    #[arg(long)]
    buffer_ms: Option<u64>,

    /// Path to the config file; defaults to the platform config directory.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let hostname = sendspin_hostname();
    let config_path = args
        .config
        .or_else(Config::default_path)
        .ok_or("could not determine a config file path; pass --config explicitly")?;
    let mut config = Config::load_or_init(&config_path, hostname)?;

    if let Some(server) = args.server {
        config.server_addr = Some(server);
    }
    if let Some(name) = args.name {
        config.player_name = name;
    }
    if let Some(buffer_ms) = args.buffer_ms {
        config.buffer_ms = buffer_ms;
    }
    config.save(&config_path)?;

    log::info!(
        "starting {} (buffer={}ms, config={})",
        config.player_name,
        config.buffer_ms,
        config_path.display()
    );

    let discovery = build_discovery()?;
    let sink = build_sink();

    let supervisor = Supervisor::new(
        config,
        discovery,
        sink,
        Box::new(|| Box::new(PcmDecoder::new(16)) as Box<dyn sendspin::audio::decode::Decoder>),
        Arc::new(NullObserver),
    );

    supervisor.start().await?;

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    supervisor.stop().await;

    Ok(())
}

fn sendspin_hostname() -> String {
    hostname_from_env().unwrap_or_else(|| "Sendspin Player".to_string())
}

fn hostname_from_env() -> Option<String> {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
}

#[cfg(feature = "mdns-discovery")]
fn build_discovery() -> Result<Arc<dyn sendspin::discovery::Discovery>, sendspin::Error> {
    Ok(Arc::new(MdnsDiscovery::new()?))
}

#[cfg(not(feature = "mdns-discovery"))]
fn build_discovery() -> Result<Arc<dyn sendspin::discovery::Discovery>, sendspin::Error> {
    Ok(Arc::new(NullDiscovery::new()))
}

#[cfg(feature = "cpal-sink")]
fn build_sink() -> Arc<dyn sendspin::audio::output::Sink> {
    Arc::new(CpalSink::new())
}

#[cfg(not(feature = "cpal-sink"))]
fn build_sink() -> Arc<dyn sendspin::audio::output::Sink> {
    Arc::new(NullSink::new())
}

// ABOUTME: The `Discovery` collaborator contract plus mDNS-backed and no-op implementations
// ABOUTME: The mDNS wire format itself is out of scope; only the address-yielding function is core

use crate::error::Error;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

/// Service type a Sendspin server advertises; browsed for by players.
pub const SERVER_SERVICE_TYPE: &str = "_sendspin-server._tcp.local.";

/// Service type this player advertises itself as, so controllers and
/// servers can find it.
pub const PLAYER_SERVICE_TYPE: &str = "_sendspin._tcp.local.";

/// A browsing agent for Sendspin servers on the local network.
///
/// The core depends only on `discover` returning an optional address;
/// advertising this player is fire-and-forget and has no return value the
/// core acts on.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self, timeout: Duration) -> Result<Option<SocketAddr>, Error>;

    /// Announces this player. Fire-and-forget: failures are logged, not
    /// surfaced, since nothing downstream depends on the announcement
    /// succeeding.
    async fn advertise(&self, player_name: &str, port: u16);
}

/// A `Discovery` that never finds anything and never advertises. The
/// default when no discovery feature is enabled, and used throughout the
/// test suite in place of real mDNS.
#[derive(Debug, Default)]
pub struct NullDiscovery;

impl NullDiscovery {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Discovery for NullDiscovery {
    async fn discover(&self, _timeout: Duration) -> Result<Option<SocketAddr>, Error> {
        Ok(None)
    }

    async fn advertise(&self, _player_name: &str, _port: u16) {}
}

#[cfg(feature = "mdns-discovery")]
pub use mdns::MdnsDiscovery;

#[cfg(feature = "mdns-discovery")]
mod mdns {
    use super::*;
    use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
    use std::collections::HashMap;
    use tokio::time::timeout as tokio_timeout;

    /// Browses for `_sendspin-server._tcp.local` and advertises this player
    /// as `_sendspin._tcp.local`, both via `mdns-sd`.
    ///
    /// One `ServiceDaemon` is reused across calls; it owns its own
    /// background thread, per the mdns-sd API.
    pub struct MdnsDiscovery {
        daemon: ServiceDaemon,
    }

    impl MdnsDiscovery {
        pub fn new() -> Result<Self, Error> {
            let daemon =
                ServiceDaemon::new().map_err(|e| Error::Connection(format!("mdns daemon: {e}")))?;
            Ok(Self { daemon })
        }
    }

    #[async_trait]
    impl Discovery for MdnsDiscovery {
        async fn discover(&self, deadline: Duration) -> Result<Option<SocketAddr>, Error> {
            let receiver = self
                .daemon
                .browse(SERVER_SERVICE_TYPE)
                .map_err(|e| Error::Connection(format!("mdns browse: {e}")))?;

            let mut found: HashMap<String, SocketAddr> = HashMap::new();
            let start = std::time::Instant::now();

            while start.elapsed() < deadline {
                let remaining = deadline.saturating_sub(start.elapsed());
                match tokio_timeout(remaining, async { receiver.recv_async().await }).await {
                    Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                        if let Some(addr) = first_socket_addr(&info) {
                            found.insert(info.fullname.clone(), addr);
                            break;
                        }
                    }
                    Ok(Ok(_)) => continue,
                    Ok(Err(_)) => break,
                    Err(_) => break,
                }
            }

            let _ = self.daemon.stop_browse(SERVER_SERVICE_TYPE);
            Ok(found.into_values().next())
        }

        async fn advertise(&self, player_name: &str, port: u16) {
            let hostname = format!("{player_name}.local.");
            let instance = format!("{player_name}._sendspin._tcp.local.");
            let info = match ServiceInfo::new(
                PLAYER_SERVICE_TYPE,
                player_name,
                &hostname,
                "",
                port,
                &[][..],
            ) {
                Ok(info) => info.enable_addr_auto(),
                Err(e) => {
                    log::warn!("failed to build mDNS advertisement for {instance}: {e}");
                    return;
                }
            };
            if let Err(e) = self.daemon.register(info) {
                log::warn!("failed to register mDNS advertisement: {e}");
            }
        }
    }

    fn first_socket_addr(info: &mdns_sd::ResolvedService) -> Option<SocketAddr> {
        info.addresses
            .iter()
            .next()
            .map(|addr| SocketAddr::new(addr.to_ip_addr(), info.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_discovery_never_finds_a_server() {
        let discovery = NullDiscovery::new();
        let result = discovery.discover(Duration::from_millis(10)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn null_discovery_advertise_is_a_no_op() {
        let discovery = NullDiscovery::new();
        discovery.advertise("test-player", 8927).await;
    }
}

//! Configuration for the event handler engine.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default port the listener binds to.
pub const DEFAULT_BINDING_PORT: u16 = 1400;

/// Default number of runtime worker threads serving connections.
pub const DEFAULT_WORKER_THREADS: usize = 10;

/// Default time open connections get to finish once a stop is requested.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for an [`EventHandlerThread`](crate::EventHandlerThread)
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandlerConfig {
    /// Port to bind; `0` lets the OS choose
    /// Default: 1400
    pub binding_port: u16,

    /// Local address to bind
    /// Default: 0.0.0.0
    pub bind_address: IpAddr,

    /// Address advertised to devices through `address()`.
    /// Detected from the outbound route when `None`
    /// Default: None
    pub listener_address: Option<IpAddr>,

    /// Worker threads of the listener runtime
    /// Default: 10
    pub worker_threads: usize,

    /// How long `stop()` lets open connections drain before closing them
    /// Default: 1 second
    pub shutdown_timeout: Duration,
}

impl Default for EventHandlerConfig {
    fn default() -> Self {
        Self {
            binding_port: DEFAULT_BINDING_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listener_address: None,
            worker_threads: DEFAULT_WORKER_THREADS,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl EventHandlerConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the binding port
    pub fn with_binding_port(mut self, port: u16) -> Self {
        self.binding_port = port;
        self
    }

    /// Set the local bind address
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Set the advertised listener address
    pub fn with_listener_address(mut self, address: IpAddr) -> Self {
        self.listener_address = Some(address);
        self
    }

    /// Set the number of worker threads (at least one is always used)
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the connection drain timeout used by `stop()`
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Address to advertise: the configured one, else the detected local
    /// address, else loopback.
    pub fn resolve_listener_address(&self) -> IpAddr {
        if let Some(address) = self.listener_address {
            return address;
        }
        if !self.bind_address.is_unspecified() {
            return self.bind_address;
        }
        detect_local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

/// Detect the local IP address used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick a route.
fn detect_local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let local_addr = socket.local_addr().ok()?;
    Some(local_addr.ip())
}

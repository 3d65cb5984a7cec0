//! ---
//! snp_section: "03-harness"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "UDP emitters, station peer and endpoint loop."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::transport::{Transport, UdpTransport};
use crate::Result;

/// Largest datagram read in one callback.
pub const MAX_DATAGRAM: usize = 1024;

/// Callbacks delivered to a socket owner.
///
/// `on_ready` and `on_timer` return the delay until the next timer callback;
/// `None` leaves the timer disarmed.
pub trait DatagramHandler {
    /// Name used in log records.
    fn name(&self) -> &'static str;

    /// The socket is bound and writable.
    fn on_ready(&mut self, transport: &dyn Transport) -> Result<Option<Duration>>;

    /// A previously requested timer fired.
    fn on_timer(&mut self, _transport: &dyn Transport) -> Result<Option<Duration>> {
        Ok(None)
    }

    /// A datagram arrived from `source`.
    fn on_datagram(
        &mut self,
        payload: &[u8],
        source: SocketAddr,
        transport: &dyn Transport,
    ) -> Result<()>;
}

/// Snapshot of endpoint counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EndpointStatsSnapshot {
    /// Datagrams handed to the socket.
    pub sent: u64,
    /// Datagrams read from the socket.
    pub received: u64,
    /// Callbacks or receives that returned an error.
    pub failed: u64,
}

/// Live endpoint counters.
#[derive(Debug, Default)]
pub struct EndpointStats {
    sent: AtomicU64,
    received: AtomicU64,
    failed: AtomicU64,
}

impl EndpointStats {
    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> EndpointStatsSnapshot {
        EndpointStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// One UDP socket driving one handler.
pub struct Endpoint<H> {
    socket: Arc<UdpSocket>,
    transport: UdpTransport,
    stats: Arc<EndpointStats>,
    handler: H,
}

impl<H: DatagramHandler> Endpoint<H> {
    /// Bind `addr` and attach `handler`.
    pub async fn bind(addr: SocketAddr, handler: H) -> Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let stats = Arc::new(EndpointStats::default());
        let transport = UdpTransport::new(socket.clone(), stats.clone());
        Ok(Self {
            socket,
            transport,
            stats,
            handler,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Shared counters, readable while the endpoint runs.
    pub fn stats(&self) -> Arc<EndpointStats> {
        self.stats.clone()
    }

    /// Drive the handler until `shutdown` resolves, then hand it back.
    ///
    /// Callback errors are logged and counted; the loop keeps running.
    pub async fn run<F>(mut self, shutdown: F) -> Result<H>
    where
        F: Future<Output = ()>,
    {
        self.socket.writable().await?;
        let local_addr = self.socket.local_addr()?;
        info!(endpoint = self.handler.name(), %local_addr, "UDP endpoint is now up");

        let next = self.handler.on_ready(&self.transport);
        let mut deadline = self.arm(next);

        tokio::pin!(shutdown);
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(endpoint = self.handler.name(), "endpoint shutting down");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, source)) => {
                            self.stats.record_received();
                            if let Err(err) = self.handler.on_datagram(&buf[..len], source, &self.transport) {
                                self.stats.record_failed();
                                warn!(endpoint = self.handler.name(), %source, error = %err, "datagram callback failed");
                            }
                        }
                        Err(err) => {
                            self.stats.record_failed();
                            warn!(endpoint = self.handler.name(), error = %err, "receive failed");
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let next = self.handler.on_timer(&self.transport);
                    deadline = self.arm(next);
                }
            }
        }

        Ok(self.handler)
    }

    fn arm(&self, next: Result<Option<Duration>>) -> Option<Instant> {
        match next {
            Ok(delay) => delay.map(|delay| Instant::now() + delay),
            Err(err) => {
                self.stats.record_failed();
                warn!(endpoint = self.handler.name(), error = %err, "callback failed");
                None
            }
        }
    }
}

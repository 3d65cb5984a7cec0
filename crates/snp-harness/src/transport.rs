//! ---
//! snp_section: "03-harness"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "UDP emitters, station peer and endpoint loop."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;

use crate::endpoint::EndpointStats;
use crate::{HarnessError, Result};

/// Datagram sink handed to handler callbacks.
///
/// `send_to` never suspends; a send that cannot complete immediately fails.
pub trait Transport {
    /// Send one datagram to `destination`.
    fn send_to(&self, payload: &[u8], destination: SocketAddr) -> Result<()>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

/// Non-blocking sender over a tokio UDP socket.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    stats: Arc<EndpointStats>,
}

impl UdpTransport {
    pub(crate) fn new(socket: Arc<UdpSocket>, stats: Arc<EndpointStats>) -> Self {
        Self { socket, stats }
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, payload: &[u8], destination: SocketAddr) -> Result<()> {
        self.socket.try_send_to(payload, destination)?;
        self.stats.record_sent();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

/// Datagram captured by [`InMemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    /// Address the datagram was addressed to.
    pub destination: SocketAddr,
    /// Encoded bytes.
    pub payload: Vec<u8>,
}

/// Recording transport, primarily for tests.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    sent: Arc<Mutex<Vec<SentDatagram>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryTransport {
    /// Create an empty recording transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of every datagram sent so far, in order.
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.sent.lock().clone()
    }

    /// Remove and return every datagram sent so far.
    pub fn drain(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Transport for InMemoryTransport {
    fn send_to(&self, payload: &[u8], destination: SocketAddr) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HarnessError::TransportUnavailable("in_memory"));
        }
        self.sent.lock().push(SentDatagram {
            destination,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn in_memory_transport_records_in_order() {
        let transport = InMemoryTransport::new();
        transport.send_to(&[1, 2], addr()).expect("send");
        transport.send_to(&[3], addr()).expect("send");
        let sent = transport.drain();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].payload, vec![1, 2]);
        assert_eq!(sent[1].payload, vec![3]);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn failing_transport_rejects_sends() {
        let transport = InMemoryTransport::new();
        transport.set_failing(true);
        assert!(matches!(
            transport.send_to(&[0], addr()),
            Err(HarnessError::TransportUnavailable("in_memory"))
        ));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn udp_transport_delivers_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.expect("bind receiver");
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.expect("bind sender"));
        sender.writable().await.expect("writable");
        let stats = Arc::new(EndpointStats::default());
        let transport = UdpTransport::new(sender, stats.clone());

        transport
            .send_to(&[7, 7], receiver.local_addr().unwrap())
            .expect("send");
        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).await.expect("recv");
        assert_eq!(&buf[..len], &[7, 7]);
        assert_eq!(stats.snapshot().sent, 1);
    }
}

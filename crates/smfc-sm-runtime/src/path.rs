use async_trait::async_trait;
use bytes::Bytes;
use smfc_core::{PathLayer, Result};
use smfc_shared::{NodeId, Protocol};
use smfc_sm_core::SmfEvent;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MAX_DATAGRAM: usize = 8192;
const RECV_BACKOFF_MIN: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after consecutive receive errors, doubling up to a cap
fn next_backoff(current: Option<Duration>) -> Duration {
    current.map_or(RECV_BACKOFF_MIN, |d| (d * 2).min(RECV_BACKOFF_MAX))
}

/// UDP path for one protocol leg. Received datagrams are queued as
/// events tagged with the sender address.
pub struct UdpPath {
    protocol: Protocol,
    bind_addr: SocketAddr,
    events: mpsc::Sender<SmfEvent>,
    socket: Option<Arc<UdpSocket>>,
    recv_task: Option<JoinHandle<()>>,
}

impl UdpPath {
    pub fn new(protocol: Protocol, bind_addr: SocketAddr, events: mpsc::Sender<SmfEvent>) -> Self {
        Self {
            protocol,
            bind_addr,
            events,
            socket: None,
            recv_task: None,
        }
    }

    /// Socket for sending replies while the path is open
    pub fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket.clone()
    }

    fn to_event(protocol: Protocol, from: SocketAddr, buf: Bytes) -> SmfEvent {
        let origin = NodeId(from);
        match protocol {
            Protocol::Gtp => SmfEvent::Gtp { origin, buf },
            Protocol::Pfcp => SmfEvent::Pfcp { origin, buf },
            Protocol::Gx => SmfEvent::Unknown(format!("gx datagram from {from}")),
        }
    }

    async fn recv_loop(protocol: Protocol, socket: Arc<UdpSocket>, events: mpsc::Sender<SmfEvent>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut backoff = None;
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    backoff = None;
                    debug!(%protocol, %from, len = n, "Received datagram");
                    let event = Self::to_event(protocol, from, Bytes::copy_from_slice(&buf[..n]));
                    if events.send(event).await.is_err() {
                        // Event loop gone
                        break;
                    }
                }
                Err(e) => {
                    if events.is_closed() {
                        break;
                    }
                    let delay = next_backoff(backoff);
                    warn!(%protocol, error = %e, retry_in = ?delay, "Receive error");
                    tokio::time::sleep(delay).await;
                    backoff = Some(delay);
                }
            }
        }
    }
}

#[async_trait]
impl PathLayer for UdpPath {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn open(&mut self) -> Result<()> {
        let socket = Arc::new(UdpSocket::bind(self.bind_addr).await?);
        info!(protocol = %self.protocol, addr = ?socket.local_addr().ok(), "Path open");

        let task = tokio::spawn(Self::recv_loop(
            self.protocol,
            socket.clone(),
            self.events.clone(),
        ));
        self.socket = Some(socket);
        self.recv_task = Some(task);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
            let _ = task.await;
        }
        if self.socket.take().is_some() {
            info!(protocol = %self.protocol, "Path closed");
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

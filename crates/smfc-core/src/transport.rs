use crate::error::Result;
use async_trait::async_trait;
use smfc_shared::Protocol;
use std::net::SocketAddr;

/// Transport path for one protocol leg (GTP-C or PFCP).
/// Allows switching between UDP sockets and mocks transparently.
#[async_trait]
pub trait PathLayer: Send {
    /// Protocol this path carries
    fn protocol(&self) -> Protocol;

    /// Bind and start receiving
    async fn open(&mut self) -> Result<()>;

    /// Stop receiving and release the socket. Closing a closed path is a no-op.
    async fn close(&mut self);

    /// Local address once open
    fn local_addr(&self) -> Option<SocketAddr>;
}

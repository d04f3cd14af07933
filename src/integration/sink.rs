//! Signal transports.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::domain::Signal;
use crate::error::{QTraderError, Result};

/// Default execution bridge endpoint
pub const DEFAULT_SIGNAL_HOST: &str = "127.0.0.1";
pub const DEFAULT_SIGNAL_PORT: u16 = 9001;

/// Destination for outbound trade signals
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send(&self, signal: &Signal) -> Result<()>;

    fn name(&self) -> &str;
}

/// Sends each signal as one JSON datagram
pub struct UdpSignalSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSignalSender {
    /// Bind an ephemeral local socket for sending to `target`
    pub async fn bind(target: SocketAddr) -> Result<Self> {
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self { socket, target })
    }

    /// Resolve `host:port` and bind
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let target = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| QTraderError::Validation(format!("cannot resolve {host}:{port}")))?;
        Self::bind(target).await
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl SignalSink for UdpSignalSender {
    async fn send(&self, signal: &Signal) -> Result<()> {
        let payload = signal.to_json_bytes()?;
        self.socket.send_to(&payload, self.target).await?;
        debug!(addr = %self.target, action = %signal.action, "Sent signal");
        Ok(())
    }

    fn name(&self) -> &str {
        "udp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::core::Action;

    #[tokio::test]
    async fn test_udp_sender_delivers_json() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpSignalSender::bind(receiver.local_addr().unwrap())
            .await
            .unwrap();

        let signal = Signal::new(Action::Sell, "BTCUSDT", 0.05);
        sender.send(&signal).await.unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        let received: Signal = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(received, signal);
        assert_eq!(sender.name(), "udp");
    }
}

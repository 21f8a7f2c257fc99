//! UDP publisher
//!
//! One socket, bound once to an ephemeral local port and reused for every
//! sample. Each sample is a single datagram; nothing is acknowledged.

use crate::domain::publisher::{PublishError, Publisher};
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::info;

pub struct UdpPublisher {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpPublisher {
    pub async fn bind(destination: SocketAddr) -> std::io::Result<Self> {
        let local: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        info!(
            "Publishing samples to {} from {}",
            destination,
            socket.local_addr()?
        );
        Ok(Self {
            socket,
            destination,
        })
    }
}

#[async_trait]
impl Publisher for UdpPublisher {
    async fn publish(&self, payload: &str) -> Result<(), PublishError> {
        self.socket
            .send_to(payload.as_bytes(), self.destination)
            .await?;
        Ok(())
    }
}

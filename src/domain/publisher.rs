use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("datagram send failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Connectionless, best-effort delivery of one outbound sample
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, payload: &str) -> Result<(), PublishError>;
}

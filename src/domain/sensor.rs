//! Sensor link abstraction
//!
//! The bridge only talks to a heart-rate sensor through these two traits.
//! A [`SensorLink`] finds and connects peripherals; the [`Link`] it hands back
//! is owned by exactly one streaming session and consumed by its teardown.

use crate::domain::models::{LinkEvent, PeripheralHandle};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Where a subscribed link delivers its notifications
pub type FrameSink = mpsc::UnboundedSender<LinkEvent>;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("scan failed: {0}")]
    Scan(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("teardown failed: {0}")]
    Teardown(String),
}

#[async_trait]
pub trait SensorLink: Send + Sync {
    /// Scan for at most `scan_timeout` and return the first peripheral whose
    /// advertised name contains `name_filter` (see [`matches_name`]).
    async fn discover(
        &self,
        name_filter: &str,
        scan_timeout: Duration,
    ) -> Result<Option<PeripheralHandle>, LinkError>;

    async fn connect(&self, handle: &PeripheralHandle) -> Result<Box<dyn Link>, LinkError>;
}

/// An established connection to one peripheral
#[async_trait]
pub trait Link: Send {
    fn is_connected(&self) -> bool;

    /// Start notifications; every frame and status change goes to `sink`
    async fn subscribe(&mut self, sink: FrameSink) -> Result<(), LinkError>;

    async fn unsubscribe(&mut self) -> Result<(), LinkError>;

    async fn disconnect(&mut self) -> Result<(), LinkError>;
}

/// Case-insensitive substring match on an advertised name. Empty names never
/// match.
pub fn matches_name(advertised: &str, filter: &str) -> bool {
    !advertised.is_empty() && advertised.to_lowercase().contains(&filter.to_lowercase())
}

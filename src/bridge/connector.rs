//! Connector
//!
//! Finds the first peripheral whose name matches the configured filter and
//! opens a link to it. Misses and failures are never surfaced: a miss costs a
//! fixed delay, a failed connect hands control straight back for another scan.

use crate::domain::models::PeripheralHandle;
use crate::domain::sensor::{Link, SensorLink};
use crate::domain::settings::Settings;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one discovery + connect attempt
pub enum Acquired {
    Link(PeripheralHandle, Box<dyn Link>),
    NotFound,
    ConnectFailed,
}

pub struct Connector<'a> {
    sensor: &'a dyn SensorLink,
    name_filter: &'a str,
    scan_timeout: Duration,
    retry_delay: Duration,
}

impl<'a> Connector<'a> {
    pub fn new(sensor: &'a dyn SensorLink, settings: &'a Settings) -> Self {
        Self {
            sensor,
            name_filter: &settings.name_filter,
            scan_timeout: settings.scan_timeout(),
            retry_delay: settings.discovery_retry_delay(),
        }
    }

    /// Run one attempt, applying the retry policy before returning a miss
    pub async fn acquire(&self) -> Acquired {
        let handle = match self.discover().await {
            Some(handle) => handle,
            None => {
                tokio::time::sleep(self.retry_delay).await;
                return Acquired::NotFound;
            }
        };

        match self.connect(&handle).await {
            Some(link) => Acquired::Link(handle, link),
            None => Acquired::ConnectFailed,
        }
    }

    pub async fn discover(&self) -> Option<PeripheralHandle> {
        info!("Scanning for '{}' devices...", self.name_filter);

        match self
            .sensor
            .discover(self.name_filter, self.scan_timeout)
            .await
        {
            Ok(Some(handle)) => {
                info!("Found {}", handle);
                Some(handle)
            }
            Ok(None) => {
                info!(
                    "No matching device found. Retrying in {:?}",
                    self.retry_delay
                );
                None
            }
            Err(e) => {
                warn!("{}. Retrying in {:?}", e, self.retry_delay);
                None
            }
        }
    }

    pub async fn connect(&self, handle: &PeripheralHandle) -> Option<Box<dyn Link>> {
        match self.sensor.connect(handle).await {
            Ok(link) if link.is_connected() => {
                info!("Connected to {}", handle);
                Some(link)
            }
            Ok(mut link) => {
                warn!("Failed to connect to {}. Retrying...", handle);
                if let Err(e) = link.disconnect().await {
                    debug!("Ignoring disconnect failure: {}", e);
                }
                None
            }
            Err(e) => {
                warn!("Connection error: {}", e);
                None
            }
        }
    }
}

//! BLE Scanner Module
//!
//! Active advertisement scanning, filtered on the advertised local name.

use crate::domain::models::PeripheralHandle;
use crate::domain::sensor::matches_name;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Foundation::TypedEventHandler;

pub struct BleScanner {
    watcher: Option<BluetoothLEAdvertisementWatcher>,
}

impl BleScanner {
    pub fn new() -> Self {
        Self { watcher: None }
    }

    /// Start scanning. Every advertisement whose local name matches
    /// `name_filter` is sent on `found`; the same device may be reported
    /// more than once.
    pub fn start(
        &mut self,
        name_filter: &str,
        found: mpsc::UnboundedSender<PeripheralHandle>,
    ) -> Result<()> {
        self.stop()?;

        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let filter = name_filter.to_string();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let name = args.Advertisement()?.LocalName()?.to_string();
                    if matches_name(&name, &filter) {
                        let _ = found.send(PeripheralHandle {
                            address: args.BluetoothAddress()?,
                            name,
                        });
                    }
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher.Start()?;
        self.watcher = Some(watcher);
        debug!("Advertisement watcher started");

        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if let Some(watcher) = self.watcher.take() {
            watcher.Stop()?;
            debug!("Advertisement watcher stopped");
        }
        Ok(())
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Scan for up to `scan_timeout` and return the first matching peripheral
pub async fn find_first(
    name_filter: &str,
    scan_timeout: Duration,
) -> Result<Option<PeripheralHandle>> {
    let (found_tx, mut found_rx) = mpsc::unbounded_channel();
    let mut scanner = BleScanner::new();
    scanner.start(name_filter, found_tx)?;

    let found = tokio::time::timeout(scan_timeout, found_rx.recv())
        .await
        .ok()
        .flatten();
    scanner.stop()?;

    if let Some(handle) = &found {
        info!("Advertisement from {}", handle);
    }
    Ok(found)
}

//! BLE Connection Module
//!
//! Opens the device and resolves the Heart Rate Measurement characteristic.

use crate::infrastructure::bluetooth::protocol::{
    self, HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID,
};
use anyhow::Result;
use tracing::{error, info, warn};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};

/// Attempts for a CCCD write before giving up
const NOTIFY_ATTEMPTS: u32 = 3;
const NOTIFY_RETRY_DELAY_MS: u64 = 500;

/// Result of a successful connection
pub struct ConnectionResult {
    pub device: BluetoothLEDevice,
    pub measurement: GattCharacteristic,
}

/// Connect to a device by Bluetooth address
pub async fn connect(address: u64) -> Result<ConnectionResult> {
    info!("Connecting to Bluetooth device: {:#X}", address);

    let device = connect_device(address).await?;
    info!("Device opened: {:?}", device.Name()?);

    let measurement = get_measurement_characteristic(&device).await?;

    Ok(ConnectionResult {
        device,
        measurement,
    })
}

async fn connect_device(address: u64) -> Result<BluetoothLEDevice> {
    let device_async: windows_future::IAsyncOperation<BluetoothLEDevice> =
        BluetoothLEDevice::FromBluetoothAddressAsync(address)?;
    let device = device_async.await?;
    Ok(device)
}

async fn get_measurement_characteristic(device: &BluetoothLEDevice) -> Result<GattCharacteristic> {
    let services_result = device
        .GetGattServicesForUuidAsync(protocol::guid(HEART_RATE_SERVICE_UUID))?
        .await?;

    if services_result.Status()? != GattCommunicationStatus::Success {
        error!(
            "Failed to get GATT services: {:?}",
            services_result.Status()?
        );
        anyhow::bail!("Failed to get GATT services");
    }

    let services = services_result.Services()?;
    if services.Size()? == 0 {
        anyhow::bail!("Heart Rate service not found");
    }
    let service = services.GetAt(0)?;

    let chars_result = service
        .GetCharacteristicsForUuidAsync(protocol::guid(HEART_RATE_MEASUREMENT_UUID))?
        .await?;
    if chars_result.Status()? != GattCommunicationStatus::Success {
        anyhow::bail!("Failed to get characteristics");
    }

    let characteristics = chars_result.Characteristics()?;
    if characteristics.Size()? == 0 {
        anyhow::bail!("Heart Rate Measurement characteristic not found");
    }

    info!("Found Heart Rate Measurement characteristic");
    Ok(characteristics.GetAt(0)?)
}

/// Write the client characteristic configuration descriptor, retrying when
/// enabling notifications
pub async fn set_notifications(characteristic: &GattCharacteristic, enabled: bool) -> Result<()> {
    let value = if enabled {
        GattClientCharacteristicConfigurationDescriptorValue::Notify
    } else {
        GattClientCharacteristicConfigurationDescriptorValue::None
    };
    let attempts = if enabled { NOTIFY_ATTEMPTS } else { 1 };

    for attempt in 1..=attempts {
        let status = characteristic
            .WriteClientCharacteristicConfigurationDescriptorAsync(value)?
            .await?;

        if status == GattCommunicationStatus::Success {
            return Ok(());
        }

        warn!(
            "CCCD write attempt {}/{} returned status: {:?}",
            attempt, attempts, status
        );
        if attempt < attempts {
            tokio::time::sleep(tokio::time::Duration::from_millis(NOTIFY_RETRY_DELAY_MS)).await;
        }
    }

    anyhow::bail!("CCCD write failed after {} attempts", attempts)
}

pub fn is_connected(device: &BluetoothLEDevice) -> bool {
    device
        .ConnectionStatus()
        .map(|s| s == BluetoothConnectionStatus::Connected)
        .unwrap_or(false)
}

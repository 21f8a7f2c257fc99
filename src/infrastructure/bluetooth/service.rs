//! Bluetooth Service Module
//!
//! WinRT implementation of the sensor link traits.

use crate::domain::models::{ConnectionStatus, LinkEvent, PeripheralHandle};
use crate::domain::sensor::{FrameSink, Link, LinkError, SensorLink};
use crate::infrastructure::bluetooth::{connection, protocol, scanner};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;

pub struct BleSensorLink;

#[async_trait]
impl SensorLink for BleSensorLink {
    async fn discover(
        &self,
        name_filter: &str,
        scan_timeout: Duration,
    ) -> Result<Option<PeripheralHandle>, LinkError> {
        scanner::find_first(name_filter, scan_timeout)
            .await
            .map_err(|e| LinkError::Scan(e.to_string()))
    }

    async fn connect(&self, handle: &PeripheralHandle) -> Result<Box<dyn Link>, LinkError> {
        let result = connection::connect(handle.address)
            .await
            .map_err(|e| LinkError::Connect(e.to_string()))?;
        Ok(Box::new(BleLink {
            device: result.device,
            measurement: result.measurement,
            value_token: None,
            status_token: None,
        }))
    }
}

pub struct BleLink {
    device: BluetoothLEDevice,
    measurement: GattCharacteristic,
    value_token: Option<i64>,
    status_token: Option<i64>,
}

impl BleLink {
    fn register_handlers(&mut self, sink: FrameSink) -> windows::core::Result<()> {
        let frames = sink.clone();
        let value_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    if let Ok(bytes) = protocol::read_buffer(&args.CharacteristicValue()?) {
                        let _ = frames.send(LinkEvent::Frame(protocol::frame_from_packet(&bytes)));
                    }
                }
                Ok(())
            },
        );
        self.value_token = Some(self.measurement.ValueChanged(&value_handler)?);

        let status_handler =
            TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                if let Some(dev) = dev.as_ref() {
                    let status = match dev.ConnectionStatus()? {
                        BluetoothConnectionStatus::Connected => ConnectionStatus::Connected,
                        _ => ConnectionStatus::Disconnected,
                    };
                    let _ = sink.send(LinkEvent::ConnectionStatus(status));
                }
                Ok(())
            });
        self.status_token = Some(self.device.ConnectionStatusChanged(&status_handler)?);

        Ok(())
    }

    fn remove_handlers(&mut self) -> windows::core::Result<()> {
        if let Some(token) = self.value_token.take() {
            self.measurement.RemoveValueChanged(token)?;
        }
        if let Some(token) = self.status_token.take() {
            self.device.RemoveConnectionStatusChanged(token)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Link for BleLink {
    fn is_connected(&self) -> bool {
        connection::is_connected(&self.device)
    }

    async fn subscribe(&mut self, sink: FrameSink) -> Result<(), LinkError> {
        self.register_handlers(sink)
            .map_err(|e| LinkError::Subscribe(e.to_string()))?;
        connection::set_notifications(&self.measurement, true)
            .await
            .map_err(|e| LinkError::Subscribe(e.to_string()))?;
        info!("Notifications enabled");
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), LinkError> {
        // Drop the handlers even if the device is already gone
        let cccd = connection::set_notifications(&self.measurement, false).await;
        self.remove_handlers()
            .map_err(|e| LinkError::Teardown(e.to_string()))?;
        cccd.map_err(|e| LinkError::Teardown(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        let _ = self.remove_handlers();
        self.device
            .Close()
            .map_err(|e| LinkError::Teardown(e.to_string()))?;
        debug!("Device closed");
        Ok(())
    }
}

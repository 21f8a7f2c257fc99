mod bridge;
mod domain;
mod infrastructure;

use crate::bridge::Supervisor;
use crate::domain::sensor::SensorLink;
use crate::domain::settings::{SensorBackend, Settings, SettingsService};
use crate::infrastructure::simulated::SimulatedSensor;
use crate::infrastructure::udp::UdpPublisher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let _logging_guard =
        infrastructure::logging::init_logger(&settings_service.get().log_settings)?;

    info!("Starting heart rate bridge");
    if let Some(path) = settings_service.source() {
        info!("Settings loaded from {}", path.display());
    }
    let settings = settings_service.into_settings();

    let publisher = Arc::new(UdpPublisher::bind(settings.publish_addr()).await?);
    let sensor = open_sensor(&settings)?;

    let cancel = CancellationToken::new();
    if let Err(e) = infrastructure::control::spawn_console_listener(cancel.clone()) {
        warn!("Console control unavailable: {}", e);
    }
    infrastructure::control::spawn_ctrl_c_listener(cancel.clone());
    info!("Type 'q' and press Enter to quit");

    let summary = Supervisor::new(sensor, publisher, settings, cancel.clone())
        .run()
        .await;

    info!(
        "Stopped after {} sessions, {} samples forwarded",
        summary.sessions, summary.samples_forwarded
    );
    Ok(())
}

fn open_sensor(settings: &Settings) -> anyhow::Result<Arc<dyn SensorLink>> {
    match settings.sensor_backend {
        SensorBackend::Simulated => {
            let sensor = match &settings.simulated_rr_file {
                Some(path) => SimulatedSensor::from_rr_file(path)?,
                None => SimulatedSensor::with_default_rhythm(),
            };
            info!("Using simulated sensor");
            Ok(Arc::new(sensor))
        }
        #[cfg(windows)]
        SensorBackend::Ble => Ok(Arc::new(infrastructure::bluetooth::BleSensorLink)),
        #[cfg(not(windows))]
        SensorBackend::Ble => {
            anyhow::bail!(
                "BLE backend is only available on Windows; set sensor_backend to \"simulated\""
            )
        }
    }
}

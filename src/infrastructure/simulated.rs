//! Simulated sensor
//!
//! Stands in for a real strap when no BLE adapter is available. It advertises
//! one peripheral and, once subscribed, replays RR intervals (from a file with
//! one millisecond value per line, or a built-in sequence) as encoded Heart
//! Rate Measurement packets, one per beat.

use crate::domain::models::{HeartRateSample, LinkEvent, PeripheralHandle};
use crate::domain::sensor::{matches_name, FrameSink, Link, LinkError, SensorLink};
use crate::infrastructure::bluetooth::protocol;
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const SIMULATED_NAME: &str = "Polar H10 (simulated)";
const SIMULATED_ADDRESS: u64 = 0x00_5E_A1_5E_A1_01;

/// Time the fake scan takes before the peripheral shows up
const ADVERTISING_DELAY: Duration = Duration::from_millis(500);

/// A calm resting rhythm, used when no RR file is configured
const DEFAULT_RR_MS: &[f32] = &[
    857.0, 845.0, 862.0, 880.0, 871.0, 850.0, 838.0, 846.0, 869.0, 884.0,
];

/// Longest interval a measurement packet can carry (u16 in 1/1024 s)
const MAX_RR_MS: f32 = u16::MAX as f32 * 1000.0 / 1024.0;

/// Parse RR data: one interval in milliseconds per line. Blank, unparsable,
/// non-positive and out-of-range lines are skipped.
pub fn parse_rr_lines(text: &str) -> Vec<f32> {
    text.lines()
        .filter_map(|line| line.trim().parse::<f32>().ok())
        .filter(|rr| {
            let usable = rr.is_finite() && *rr > 0.0 && *rr <= MAX_RR_MS;
            if !usable {
                warn!("Skipping RR value {} outside (0, {}] ms", rr, MAX_RR_MS);
            }
            usable
        })
        .collect()
}

pub struct SimulatedSensor {
    rr_sequence: Arc<[f32]>,
}

impl SimulatedSensor {
    pub fn new(rr_sequence: Vec<f32>) -> anyhow::Result<Self> {
        if rr_sequence.is_empty() {
            anyhow::bail!("Simulated sensor needs at least one RR interval");
        }
        Ok(Self {
            rr_sequence: rr_sequence.into(),
        })
    }

    pub fn from_rr_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read RR file {}", path.display()))?;
        let rr = parse_rr_lines(&text);
        info!("Loaded {} RR intervals from {}", rr.len(), path.display());
        Self::new(rr).with_context(|| format!("No RR intervals in {}", path.display()))
    }

    pub fn with_default_rhythm() -> Self {
        Self {
            rr_sequence: DEFAULT_RR_MS.into(),
        }
    }
}

#[async_trait]
impl SensorLink for SimulatedSensor {
    async fn discover(
        &self,
        name_filter: &str,
        scan_timeout: Duration,
    ) -> Result<Option<PeripheralHandle>, LinkError> {
        if !matches_name(SIMULATED_NAME, name_filter) {
            tokio::time::sleep(scan_timeout).await;
            return Ok(None);
        }
        tokio::time::sleep(ADVERTISING_DELAY.min(scan_timeout)).await;
        Ok(Some(PeripheralHandle {
            address: SIMULATED_ADDRESS,
            name: SIMULATED_NAME.to_string(),
        }))
    }

    async fn connect(&self, handle: &PeripheralHandle) -> Result<Box<dyn Link>, LinkError> {
        if handle.address != SIMULATED_ADDRESS {
            return Err(LinkError::Connect(format!("unknown peripheral {}", handle)));
        }
        Ok(Box::new(SimulatedLink {
            rr_sequence: self.rr_sequence.clone(),
            connected: Arc::new(AtomicBool::new(true)),
            beats: None,
        }))
    }
}

pub struct SimulatedLink {
    rr_sequence: Arc<[f32]>,
    connected: Arc<AtomicBool>,
    beats: Option<JoinHandle<()>>,
}

impl SimulatedLink {
    fn stop_beats(&mut self) {
        if let Some(task) = self.beats.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Link for SimulatedLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&mut self, sink: FrameSink) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Subscribe("not connected".to_string()));
        }
        self.stop_beats();
        let rr_sequence = self.rr_sequence.clone();
        self.beats = Some(tokio::spawn(async move {
            for &rr in rr_sequence.iter().cycle() {
                tokio::time::sleep(Duration::from_secs_f32(rr / 1000.0)).await;
                let sample = HeartRateSample {
                    bpm: (60_000.0 / rr).round() as u16,
                    rr_intervals: vec![rr],
                };
                let packet = protocol::encode_measurement(&sample, None);
                if sink
                    .send(LinkEvent::Frame(protocol::frame_from_packet(&packet)))
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), LinkError> {
        self.stop_beats();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.stop_beats();
        self.connected.store(false, Ordering::SeqCst);
        debug!("Simulated link closed");
        Ok(())
    }
}

impl Drop for SimulatedLink {
    fn drop(&mut self) {
        self.stop_beats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FrameKind;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    #[test]
    fn test_parse_rr_lines() {
        let rr = parse_rr_lines("800\n  812.5 \n\nabc\n-4\n0\n790\r\n");
        assert_eq!(rr, vec![800.0, 812.5, 790.0]);
    }

    #[test]
    fn test_parse_rr_lines_rejects_unencodable_intervals() {
        let rr = parse_rr_lines("1e30\n64000\ninf\n63999\n900\n");
        assert_eq!(rr, vec![63999.0, 900.0]);
    }

    #[test]
    fn test_rr_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("003.txt");
        std::fs::write(&path, "750\n760\n").unwrap();
        assert!(SimulatedSensor::from_rr_file(&path).is_ok());

        std::fs::write(&path, "n/a\n").unwrap();
        assert!(SimulatedSensor::from_rr_file(&path).is_err());
        assert!(SimulatedSensor::from_rr_file(&dir.path().join("missing.txt")).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_respects_filter() {
        let sensor = SimulatedSensor::with_default_rhythm();

        let found = sensor.discover("POLAR", Duration::from_secs(10)).await.unwrap();
        assert_eq!(found.map(|h| h.name), Some(SIMULATED_NAME.to_string()));

        let start = Instant::now();
        let missing = sensor.discover("wahoo", Duration::from_secs(10)).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_beats_follow_rr_sequence() {
        let sensor = SimulatedSensor::new(vec![1000.0, 750.0]).unwrap();
        let handle = sensor.discover("polar", Duration::from_secs(1)).await.unwrap().unwrap();
        let mut link = sensor.connect(&handle).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        link.subscribe(tx).await.unwrap();

        let mut bpms = Vec::new();
        for _ in 0..3 {
            match rx.recv().await {
                Some(LinkEvent::Frame(frame)) => {
                    assert_eq!(frame.kind, FrameKind::HeartRate);
                    bpms.push(frame.as_heart_rate().unwrap().bpm);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(bpms, vec![60, 80, 60]);

        link.unsubscribe().await.unwrap();
        link.disconnect().await.unwrap();
        assert!(!link.is_connected());
        assert!(rx.recv().await.is_none());
    }
}

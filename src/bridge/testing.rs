//! In-memory sensor, link and publisher used by the bridge tests

use crate::domain::models::{
    ConnectionStatus, HeartRateSample, LinkEvent, NotificationFrame, PeripheralHandle,
};
use crate::domain::publisher::{PublishError, Publisher};
use crate::domain::sensor::{FrameSink, Link, LinkError, SensorLink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub fn hr_frame(bpm: u16, rr: &[f32]) -> LinkEvent {
    LinkEvent::Frame(NotificationFrame::heart_rate(
        HeartRateSample {
            bpm,
            rr_intervals: rr.to_vec(),
        },
        None,
    ))
}

pub fn other_frame(label: &str) -> LinkEvent {
    LinkEvent::Frame(NotificationFrame::unrecognized(label, vec![0xAA, 0xBB]))
}

pub fn connected() -> LinkEvent {
    LinkEvent::ConnectionStatus(ConnectionStatus::Connected)
}

pub fn disconnected() -> LinkEvent {
    LinkEvent::ConnectionStatus(ConnectionStatus::Disconnected)
}

/// Shared view of a [`MockLink`] that outlives the link itself
#[derive(Default)]
pub struct LinkProbe {
    pub connected: AtomicBool,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub sink: Mutex<Option<FrameSink>>,
}

impl LinkProbe {
    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Push an event as if the peripheral had sent it
    pub fn emit(&self, event: LinkEvent) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            let _ = sink.send(event);
        }
    }

    /// Drop the sink, closing the session's channel
    pub fn close(&self) {
        self.sink.lock().unwrap().take();
    }
}

pub struct MockLink {
    probe: Arc<LinkProbe>,
    initial: Vec<LinkEvent>,
    fail_subscribe: bool,
    fail_teardown: bool,
}

impl MockLink {
    /// A connected link that delivers `initial` right after subscription
    pub fn new(initial: Vec<LinkEvent>) -> (Self, Arc<LinkProbe>) {
        let probe = Arc::new(LinkProbe::default());
        probe.connected.store(true, Ordering::SeqCst);
        (
            Self {
                probe: probe.clone(),
                initial,
                fail_subscribe: false,
                fail_teardown: false,
            },
            probe,
        )
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    pub fn not_connected(self) -> Self {
        self.probe.connected.store(false, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl Link for MockLink {
    fn is_connected(&self) -> bool {
        self.probe.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&mut self, sink: FrameSink) -> Result<(), LinkError> {
        self.probe.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe {
            return Err(LinkError::Subscribe("CCCD write rejected".to_string()));
        }
        for event in self.initial.drain(..) {
            let _ = sink.send(event);
        }
        *self.probe.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), LinkError> {
        self.probe.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.probe.close();
        if self.fail_teardown {
            return Err(LinkError::Teardown("unsubscribe refused".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        self.probe.connected.store(false, Ordering::SeqCst);
        if self.fail_teardown {
            return Err(LinkError::Teardown("device already gone".to_string()));
        }
        Ok(())
    }
}

/// One scripted discovery/connect outcome
pub enum Attempt {
    Miss,
    ScanError,
    ConnectFails,
    Connects(MockLink),
}

/// Plays back attempts in order. Once the script runs dry it cancels `token`
/// and reports misses, so a supervisor under test always terminates.
pub struct ScriptedSensor {
    attempts: Mutex<VecDeque<Attempt>>,
    pending_link: Mutex<Option<MockLink>>,
    token: CancellationToken,
    pub discover_times: Mutex<Vec<Instant>>,
    pub connect_times: Mutex<Vec<Instant>>,
}

impl ScriptedSensor {
    pub fn new(attempts: Vec<Attempt>, token: CancellationToken) -> Self {
        Self {
            attempts: Mutex::new(attempts.into()),
            pending_link: Mutex::new(None),
            token,
            discover_times: Mutex::new(Vec::new()),
            connect_times: Mutex::new(Vec::new()),
        }
    }

    pub fn discovers(&self) -> usize {
        self.discover_times.lock().unwrap().len()
    }

    pub fn connects(&self) -> usize {
        self.connect_times.lock().unwrap().len()
    }
}

#[async_trait]
impl SensorLink for ScriptedSensor {
    async fn discover(
        &self,
        _name_filter: &str,
        _scan_timeout: Duration,
    ) -> Result<Option<PeripheralHandle>, LinkError> {
        self.discover_times.lock().unwrap().push(Instant::now());
        let handle = PeripheralHandle {
            address: 0xA0B1C2D3E4F5,
            name: "Polar H10 ABCD1234".to_string(),
        };
        let next = self.attempts.lock().unwrap().pop_front();
        match next {
            None => {
                self.token.cancel();
                Ok(None)
            }
            Some(Attempt::Miss) => Ok(None),
            Some(Attempt::ScanError) => Err(LinkError::Scan("adapter unavailable".to_string())),
            Some(Attempt::ConnectFails) => Ok(Some(handle)),
            Some(Attempt::Connects(link)) => {
                *self.pending_link.lock().unwrap() = Some(link);
                Ok(Some(handle))
            }
        }
    }

    async fn connect(&self, _handle: &PeripheralHandle) -> Result<Box<dyn Link>, LinkError> {
        self.connect_times.lock().unwrap().push(Instant::now());
        match self.pending_link.lock().unwrap().take() {
            Some(link) => Ok(Box::new(link)),
            None => Err(LinkError::Connect("connection rejected".to_string())),
        }
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<String>>,
    /// Fail every send while set
    pub failing: AtomicBool,
    pub attempts: AtomicUsize,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.failing.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, payload: &str) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "port unreachable",
            )));
        }
        self.sent.lock().unwrap().push(payload.to_string());
        Ok(())
    }
}

//! Stream Session
//!
//! Owns one link for the duration of one streaming attempt:
//!
//! ```text
//! SUBSCRIBING ──ok──▶ STREAMING ──timeout / link lost / cancel──▶ ENDED
//!      │                  │ ▲
//!      └──error──▶ ENDED  └─┘ frame (HR forwarded, others dropped)
//! ```
//!
//! Every path into `ENDED` goes through [`teardown`] exactly once.

use crate::domain::models::{
    render_sample, ConnectionStatus, LinkEvent, NotificationFrame, RrFormat, SessionEnd,
    SessionStats,
};
use crate::domain::publisher::Publisher;
use crate::domain::sensor::Link;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// How often a quiet link is asked whether it is still connected
const LIVENESS_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub stats: SessionStats,
}

pub struct StreamSession<'a> {
    publisher: &'a dyn Publisher,
    cancel: &'a CancellationToken,
    receive_timeout: Duration,
    rr_format: RrFormat,
}

impl<'a> StreamSession<'a> {
    pub fn new(
        publisher: &'a dyn Publisher,
        cancel: &'a CancellationToken,
        receive_timeout: Duration,
        rr_format: RrFormat,
    ) -> Self {
        Self {
            publisher,
            cancel,
            receive_timeout,
            rr_format,
        }
    }

    /// Stream until the link ends for any reason, then tear it down
    pub async fn run(&self, mut link: Box<dyn Link>) -> SessionReport {
        let mut stats = SessionStats::default();
        let end = self.stream(link.as_mut(), &mut stats).await;
        teardown(link).await;
        SessionReport { end, stats }
    }

    async fn stream(&self, link: &mut dyn Link, stats: &mut SessionStats) -> SessionEnd {
        if self.cancel.is_cancelled() {
            return SessionEnd::Cancelled;
        }

        let (sink, mut events) = mpsc::unbounded_channel();
        if let Err(e) = link.subscribe(sink).await {
            warn!("Error in data stream: {}", e);
            return SessionEnd::Error(e.to_string());
        }
        info!("Receiving heart rate data...");

        // Only frames push the deadline out; status events do not.
        let mut deadline = Instant::now() + self.receive_timeout;
        let mut liveness = tokio::time::interval(LIVENESS_POLL);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.cancel.is_cancelled() {
                return SessionEnd::Cancelled;
            }
            if !link.is_connected() {
                return SessionEnd::LinkLost;
            }

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
                event = events.recv() => event,
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        "No data for {:?}, assuming the sensor is gone",
                        self.receive_timeout
                    );
                    return SessionEnd::Timeout;
                }
                _ = liveness.tick() => continue,
            };

            match event {
                // The link dropped its sender
                None => return SessionEnd::LinkLost,
                Some(LinkEvent::ConnectionStatus(ConnectionStatus::Disconnected)) => {
                    return SessionEnd::LinkLost
                }
                Some(LinkEvent::ConnectionStatus(ConnectionStatus::Connected)) => {
                    debug!("Link reports connected");
                }
                Some(LinkEvent::Frame(frame)) => {
                    deadline = Instant::now() + self.receive_timeout;
                    self.forward(&frame, stats).await;
                }
            }
        }
    }

    async fn forward(&self, frame: &NotificationFrame, stats: &mut SessionStats) {
        let Some(sample) = frame.as_heart_rate() else {
            trace!("Skipping {} frame received at {}", frame.kind, frame.timestamp_ns);
            stats.discarded += 1;
            return;
        };

        // Delivery is best-effort; a failed send never ends the stream.
        for payload in render_sample(sample, self.rr_format) {
            if let Err(e) = self.publisher.publish(&payload).await {
                stats.publish_failures += 1;
                warn!("Failed to send '{}': {}", payload, e);
                continue;
            }
            stats.forwarded += 1;
        }
        debug!(
            "Sent HR={}, RR={:?}, energy={:?}",
            sample.bpm, sample.rr_intervals, frame.energy_expended
        );
    }
}

/// Best-effort unsubscribe then disconnect. Never fails.
async fn teardown(mut link: Box<dyn Link>) {
    if let Err(e) = link.unsubscribe().await {
        debug!("Ignoring unsubscribe failure: {}", e);
    }
    if let Err(e) = link.disconnect().await {
        debug!("Ignoring disconnect failure: {}", e);
    }
}

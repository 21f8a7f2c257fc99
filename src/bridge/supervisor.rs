//! Supervisor
//!
//! Drives connect → stream → teardown → backoff until the cancellation token
//! fires. The token is only checked between attempts and inside the session,
//! so an in-flight scan or connect always runs to completion first.

use crate::bridge::connector::{Acquired, Connector};
use crate::bridge::session::StreamSession;
use crate::domain::publisher::Publisher;
use crate::domain::sensor::SensorLink;
use crate::domain::settings::Settings;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Totals over the whole run, reported on exit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sessions: u64,
    pub samples_forwarded: u64,
}

pub struct Supervisor {
    sensor: Arc<dyn SensorLink>,
    publisher: Arc<dyn Publisher>,
    settings: Settings,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(
        sensor: Arc<dyn SensorLink>,
        publisher: Arc<dyn Publisher>,
        settings: Settings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sensor,
            publisher,
            settings,
            cancel,
        }
    }

    pub async fn run(&self) -> RunSummary {
        let connector = Connector::new(self.sensor.as_ref(), &self.settings);
        let session = StreamSession::new(
            self.publisher.as_ref(),
            &self.cancel,
            self.settings.receive_timeout(),
            self.settings.rr_format,
        );
        let backoff = self.settings.reconnect_backoff();
        let mut summary = RunSummary::default();

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop requested, not reconnecting");
                break;
            }

            let (peripheral, link) = match connector.acquire().await {
                Acquired::Link(peripheral, link) => (peripheral, link),
                Acquired::NotFound | Acquired::ConnectFailed => continue,
            };

            let report = session.run(link).await;
            summary.sessions += 1;
            summary.samples_forwarded += report.stats.forwarded;
            info!(
                "Session with {} ended ({}): {} forwarded, {} skipped, {} failed sends",
                peripheral,
                report.end,
                report.stats.forwarded,
                report.stats.discarded,
                report.stats.publish_failures
            );

            info!("Reconnecting in {:?}", backoff);
            tokio::time::sleep(backoff).await;
        }

        summary
    }
}

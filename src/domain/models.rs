use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A heart-rate reading decoded from one notification
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeartRateSample {
    pub bpm: u16,
    /// Beat-to-beat intervals in milliseconds, possibly empty
    pub rr_intervals: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    HeartRate,
    /// Anything the bridge does not act on, labelled for tracing
    Unrecognized(String),
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::HeartRate => write!(f, "HR"),
            FrameKind::Unrecognized(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    HeartRate(HeartRateSample),
    Raw(Vec<u8>),
}

/// One notification delivered by a link
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFrame {
    pub kind: FrameKind,
    /// Receive time, nanoseconds since the Unix epoch
    pub timestamp_ns: u64,
    pub payload: FramePayload,
    /// Energy expended in kJ, when the sensor reports it
    pub energy_expended: Option<u16>,
}

impl NotificationFrame {
    pub fn heart_rate(sample: HeartRateSample, energy_expended: Option<u16>) -> Self {
        Self {
            kind: FrameKind::HeartRate,
            timestamp_ns: now_ns(),
            payload: FramePayload::HeartRate(sample),
            energy_expended,
        }
    }

    pub fn unrecognized(label: impl Into<String>, raw: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Unrecognized(label.into()),
            timestamp_ns: now_ns(),
            payload: FramePayload::Raw(raw),
            energy_expended: None,
        }
    }

    /// The heart-rate payload, only for frames tagged as heart rate
    pub fn as_heart_rate(&self) -> Option<&HeartRateSample> {
        match (&self.kind, &self.payload) {
            (FrameKind::HeartRate, FramePayload::HeartRate(sample)) => Some(sample),
            _ => None,
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Everything a subscribed link pushes into the session's channel
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Frame(NotificationFrame),
    ConnectionStatus(ConnectionStatus),
}

/// A peripheral found during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralHandle {
    pub address: u64,
    pub name: String,
}

impl fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#X})", self.name, self.address)
    }
}

/// How the RR part of an outbound sample is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RrFormat {
    /// Every interval of the frame as `[a, b]`
    #[default]
    List,
    /// Only the most recent interval as a scalar
    Latest,
    /// One scalar datagram per interval, in arrival order
    Unpacked,
}

/// Render a sample as one or more `<bpm>,<rr>` datagram texts.
///
/// `List` and `Latest` always yield exactly one datagram. `Unpacked` yields
/// one per RR interval, falling back to a single beat-derived interval when
/// the frame carries none.
pub fn render_sample(sample: &HeartRateSample, format: RrFormat) -> Vec<String> {
    match format {
        RrFormat::List => {
            let rr = sample
                .rr_intervals
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            vec![format!("{},[{}]", sample.bpm, rr)]
        }
        RrFormat::Latest => {
            let rr = sample
                .rr_intervals
                .last()
                .copied()
                .unwrap_or_else(|| beat_interval(sample.bpm));
            vec![format!("{},{}", sample.bpm, rr)]
        }
        RrFormat::Unpacked if sample.rr_intervals.is_empty() => {
            vec![format!("{},{}", sample.bpm, beat_interval(sample.bpm))]
        }
        RrFormat::Unpacked => sample
            .rr_intervals
            .iter()
            .map(|rr| format!("{},{}", sample.bpm, rr))
            .collect(),
    }
}

/// Interval implied by the beat rate, for frames that carry no RR data
fn beat_interval(bpm: u16) -> f32 {
    if bpm > 0 {
        60_000.0 / bpm as f32
    } else {
        0.0
    }
}

/// Why a streaming session stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Timeout,
    LinkLost,
    Cancelled,
    Error(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Timeout => write!(f, "receive timeout"),
            SessionEnd::LinkLost => write!(f, "link lost"),
            SessionEnd::Cancelled => write!(f, "cancelled"),
            SessionEnd::Error(e) => write!(f, "error: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub forwarded: u64,
    pub discarded: u64,
    pub publish_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bpm: u16, rr: &[f32]) -> HeartRateSample {
        HeartRateSample {
            bpm,
            rr_intervals: rr.to_vec(),
        }
    }

    #[test]
    fn test_render_list() {
        assert_eq!(render_sample(&sample(72, &[0.83]), RrFormat::List), vec!["72,[0.83]"]);
        assert_eq!(
            render_sample(&sample(64, &[937.5, 920.0]), RrFormat::List),
            vec!["64,[937.5, 920]"]
        );
        assert_eq!(render_sample(&sample(80, &[]), RrFormat::List), vec!["80,[]"]);
    }

    #[test]
    fn test_render_latest() {
        assert_eq!(
            render_sample(&sample(64, &[937.5, 920.0]), RrFormat::Latest),
            vec!["64,920"]
        );
        assert_eq!(render_sample(&sample(75, &[]), RrFormat::Latest), vec!["75,800"]);
        assert_eq!(render_sample(&sample(0, &[]), RrFormat::Latest), vec!["0,0"]);
    }

    #[test]
    fn test_render_unpacked_splits_intervals() {
        assert_eq!(
            render_sample(&sample(62, &[970.0, 965.5]), RrFormat::Unpacked),
            vec!["62,970", "62,965.5"]
        );
        assert_eq!(render_sample(&sample(75, &[]), RrFormat::Unpacked), vec!["75,800"]);
    }

    #[test]
    fn test_only_hr_frames_expose_sample() {
        let hr = NotificationFrame::heart_rate(sample(60, &[1000.0]), Some(12));
        assert_eq!(hr.as_heart_rate(), Some(&sample(60, &[1000.0])));

        let other = NotificationFrame::unrecognized("ACC", vec![1, 2, 3]);
        assert_eq!(other.as_heart_rate(), None);
        assert_eq!(other.kind.to_string(), "ACC");
    }

    #[test]
    fn test_rr_format_serde() {
        let f: RrFormat = serde_json::from_str("\"latest\"").unwrap();
        assert_eq!(f, RrFormat::Latest);
        assert_eq!(serde_json::to_string(&RrFormat::List).unwrap(), "\"list\"");
        let f: RrFormat = serde_json::from_str("\"unpacked\"").unwrap();
        assert_eq!(f, RrFormat::Unpacked);
    }
}

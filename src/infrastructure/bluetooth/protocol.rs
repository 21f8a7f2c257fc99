//! Heart Rate Profile
//!
//! Standard Bluetooth SIG Heart Rate service definitions and the codec for the
//! Heart Rate Measurement characteristic.

use crate::domain::models::{HeartRateSample, NotificationFrame};
use tracing::trace;

/// Heart Rate service (0x180D) in 128-bit form
pub const HEART_RATE_SERVICE_UUID: u128 = 0x0000180d_0000_1000_8000_00805f9b34fb;

/// Heart Rate Measurement characteristic (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: u128 = 0x00002a37_0000_1000_8000_00805f9b34fb;

/// Measurement flag bits
pub mod flags {
    pub const HR_FORMAT_U16: u8 = 0x01;
    pub const SENSOR_CONTACT_DETECTED: u8 = 0x02;
    pub const SENSOR_CONTACT_SUPPORTED: u8 = 0x04;
    pub const ENERGY_EXPENDED: u8 = 0x08;
    pub const RR_INTERVAL: u8 = 0x10;
}

/// RR intervals are transmitted in 1/1024 s
const RR_UNITS_PER_SECOND: f32 = 1024.0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty measurement packet")]
    Empty,
    #[error("truncated measurement: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// A decoded Heart Rate Measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub sample: HeartRateSample,
    pub energy_expended: Option<u16>,
}

/// Parse a Heart Rate Measurement value
///
/// ```text
/// [0]     : flags
/// [1]     : bpm (u8), or [1-2] bpm (u16 LE) when flags bit 0 is set
/// [..+2]  : energy expended in kJ (u16 LE) when flags bit 3 is set
/// [..]    : RR intervals (u16 LE, 1/1024 s each) when flags bit 4 is set
/// ```
pub fn parse_measurement(bytes: &[u8]) -> Result<Measurement, ProtocolError> {
    let (&flag_byte, rest) = bytes.split_first().ok_or(ProtocolError::Empty)?;
    let mut cursor = Cursor { bytes: rest, pos: 1 };

    let bpm = if flag_byte & flags::HR_FORMAT_U16 != 0 {
        cursor.u16()?
    } else {
        cursor.u8()? as u16
    };

    let energy_expended = if flag_byte & flags::ENERGY_EXPENDED != 0 {
        Some(cursor.u16()?)
    } else {
        None
    };

    let mut rr_intervals = Vec::new();
    if flag_byte & flags::RR_INTERVAL != 0 {
        while !cursor.bytes.is_empty() {
            let raw = cursor.u16()?;
            rr_intervals.push((raw as f32 * 1000.0 / RR_UNITS_PER_SECOND).round());
        }
    }

    Ok(Measurement {
        sample: HeartRateSample { bpm, rr_intervals },
        energy_expended,
    })
}

/// Build a measurement value the way a sensor would send it
pub fn encode_measurement(sample: &HeartRateSample, energy_expended: Option<u16>) -> Vec<u8> {
    let mut flag_byte = flags::SENSOR_CONTACT_SUPPORTED | flags::SENSOR_CONTACT_DETECTED;
    let mut body = Vec::with_capacity(4 + sample.rr_intervals.len() * 2);

    if sample.bpm > u8::MAX as u16 {
        flag_byte |= flags::HR_FORMAT_U16;
        body.extend_from_slice(&sample.bpm.to_le_bytes());
    } else {
        body.push(sample.bpm as u8);
    }

    if let Some(energy) = energy_expended {
        flag_byte |= flags::ENERGY_EXPENDED;
        body.extend_from_slice(&energy.to_le_bytes());
    }

    if !sample.rr_intervals.is_empty() {
        flag_byte |= flags::RR_INTERVAL;
        for rr in &sample.rr_intervals {
            let raw = (rr * RR_UNITS_PER_SECOND / 1000.0).round() as u16;
            body.extend_from_slice(&raw.to_le_bytes());
        }
    }

    let mut packet = Vec::with_capacity(body.len() + 1);
    packet.push(flag_byte);
    packet.extend_from_slice(&body);
    packet
}

/// Turn a raw notification into a frame. Packets that do not parse become
/// unrecognized frames, which the session drops.
pub fn frame_from_packet(bytes: &[u8]) -> NotificationFrame {
    match parse_measurement(bytes) {
        Ok(m) => NotificationFrame::heart_rate(m.sample, m.energy_expended),
        Err(e) => {
            trace!("Undecodable packet {:02X?}: {}", bytes, e);
            NotificationFrame::unrecognized("malformed", bytes.to_vec())
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    /// Offset into the whole packet, for error reporting
    pos: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        if self.bytes.len() < N {
            return Err(ProtocolError::Truncated {
                expected: self.pos + N,
                actual: self.pos + self.bytes.len(),
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[..N]);
        self.bytes = &self.bytes[N..];
        self.pos += N;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.take::<2>()?))
    }
}

#[cfg(windows)]
pub use self::winrt::{guid, read_buffer};

#[cfg(windows)]
mod winrt {
    use anyhow::Result;
    use windows::core::GUID;
    use windows::Storage::Streams::{DataReader, IBuffer};

    pub fn guid(uuid: u128) -> GUID {
        GUID::from_u128(uuid)
    }

    pub fn read_buffer(buffer: &IBuffer) -> Result<Vec<u8>> {
        let reader = DataReader::FromBuffer(buffer)?;
        let length = reader.UnconsumedBufferLength()? as usize;
        let mut bytes = vec![0u8; length];
        reader.ReadBytes(&mut bytes)?;
        Ok(bytes)
    }
}

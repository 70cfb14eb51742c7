// CSC Measurement characteristic frame layout
use bytes::{Buf, Bytes};
use thiserror::Error;

/// Raw notification payload as delivered by the sensor link
pub type RawNotification = Bytes;

pub const FLAG_WHEEL_DATA: u8 = 0x01;
pub const FLAG_CRANK_DATA: u8 = 0x02;

const WHEEL_DATA_LEN: usize = 6;
const CRANK_DATA_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty notification payload")]
    Empty,

    #[error("truncated frame (flags {flags:#04x}): expected {expected} bytes, got {actual}")]
    Truncated {
        flags: u8,
        expected: usize,
        actual: usize,
    },

    #[error("frame carries no crank revolution data (flags {flags:#04x})")]
    MissingCrankData { flags: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelData {
    pub cumulative_revolutions: u32,
    pub last_event_time: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrankData {
    pub cumulative_revolutions: u16,
    /// 1/1024 s, wraps at 65536
    pub last_event_time: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CscMeasurement {
    pub flags: u8,
    pub wheel: Option<WheelData>,
    pub crank: Option<CrankData>,
}

impl CscMeasurement {
    /// Parse a frame, locating the crank fields from the flags byte
    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        let mut buf = raw;
        if !buf.has_remaining() {
            return Err(FrameError::Empty);
        }
        let flags = buf.get_u8();

        let has_wheel = flags & FLAG_WHEEL_DATA != 0;
        let has_crank = flags & FLAG_CRANK_DATA != 0;
        let expected = 1
            + if has_wheel { WHEEL_DATA_LEN } else { 0 }
            + if has_crank { CRANK_DATA_LEN } else { 0 };
        if raw.len() < expected {
            return Err(FrameError::Truncated {
                flags,
                expected,
                actual: raw.len(),
            });
        }

        let wheel = has_wheel.then(|| WheelData {
            cumulative_revolutions: buf.get_u32_le(),
            last_event_time: buf.get_u16_le(),
        });
        let crank = has_crank.then(|| CrankData {
            cumulative_revolutions: buf.get_u16_le(),
            last_event_time: buf.get_u16_le(),
        });

        Ok(Self { flags, wheel, crank })
    }

    /// Crank data, which the cadence decoder cannot do without
    pub fn require_crank(&self) -> Result<CrankData, FrameError> {
        self.crank
            .ok_or(FrameError::MissingCrankData { flags: self.flags })
    }

    /// Encode back into the wire layout
    pub fn to_bytes(&self) -> RawNotification {
        let mut out = Vec::with_capacity(1 + WHEEL_DATA_LEN + CRANK_DATA_LEN);
        let mut flags = self.flags & !(FLAG_WHEEL_DATA | FLAG_CRANK_DATA);
        if self.wheel.is_some() {
            flags |= FLAG_WHEEL_DATA;
        }
        if self.crank.is_some() {
            flags |= FLAG_CRANK_DATA;
        }
        out.push(flags);
        if let Some(wheel) = self.wheel {
            out.extend_from_slice(&wheel.cumulative_revolutions.to_le_bytes());
            out.extend_from_slice(&wheel.last_event_time.to_le_bytes());
        }
        if let Some(crank) = self.crank {
            out.extend_from_slice(&crank.cumulative_revolutions.to_le_bytes());
            out.extend_from_slice(&crank.last_event_time.to_le_bytes());
        }
        Bytes::from(out)
    }
}

/// Build a crank-only frame
#[cfg(test)]
pub fn crank_frame(cumulative_revolutions: u16, last_event_time: u16) -> RawNotification {
    CscMeasurement {
        flags: FLAG_CRANK_DATA,
        wheel: None,
        crank: Some(CrankData {
            cumulative_revolutions,
            last_event_time,
        }),
    }
    .to_bytes()
}

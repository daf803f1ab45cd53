//! Raw input report identity parsing for the consumer interface.
//!
//! Knob events arrive as short consumer-control reports carrying a family
//! byte, an event code, and (for the directional family) a direction byte.
//! The sentinel values are table data in [`sentinels`], not control flow.

/// Byte offset of the rotation direction within a raw report.
pub const DIRECTION_OFFSET: usize = 7;

/// Direction sentinels observed on the directional report family.
pub mod sentinels {
    /// Clockwise rotation marker.
    pub const CLOCKWISE: u8 = 0x20;
    /// Counter-clockwise rotation marker.
    pub const COUNTER_CLOCKWISE: u8 = 0x40;
}

/// Rotation direction derived from the direction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    /// Map a raw direction byte onto a rotation.
    ///
    /// Anything other than the two sentinels is noise and maps to `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            sentinels::CLOCKWISE => Some(Self::Clockwise),
            sentinels::COUNTER_CLOCKWISE => Some(Self::CounterClockwise),
            _ => None,
        }
    }

    /// Signed unit step for this rotation.
    pub fn sign(self) -> i32 {
        match self {
            Self::Clockwise => 1,
            Self::CounterClockwise => -1,
        }
    }
}

/// Identity bytes extracted from a raw input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawEvent {
    pub family: u8,
    pub code: u8,
    pub direction_byte: u8,
}

impl RawEvent {
    /// Extract the identity bytes from a raw report.
    ///
    /// Returns `None` for reports too short to carry a family and code.
    /// Reports without a direction byte get a zero placeholder, which is
    /// not a valid sentinel.
    pub fn parse(report: &[u8]) -> Option<Self> {
        let family = *report.first()?;
        let code = *report.get(1)?;
        let direction_byte = report.get(DIRECTION_OFFSET).copied().unwrap_or(0);
        Some(Self {
            family,
            code,
            direction_byte,
        })
    }

    /// Rotation carried by this report, if the direction byte is a sentinel.
    pub fn rotation(&self) -> Option<Rotation> {
        Rotation::from_byte(self.direction_byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_identity_bytes() {
        let report = [0x06, 0x03, 0, 0, 0, 0, 0, 0x20];
        let event = RawEvent::parse(&report).expect("parse");
        assert_eq!(event.family, 0x06);
        assert_eq!(event.code, 0x03);
        assert_eq!(event.direction_byte, 0x20);
        assert_eq!(event.rotation(), Some(Rotation::Clockwise));
    }

    #[test]
    fn test_parse_short_report_without_direction_byte() {
        let event = RawEvent::parse(&[0x04, 0xE9]).expect("parse");
        assert_eq!(event.direction_byte, 0);
        assert_eq!(event.rotation(), None);
    }

    #[test]
    fn test_parse_rejects_truncated_report() {
        assert!(RawEvent::parse(&[]).is_none());
        assert!(RawEvent::parse(&[0x04]).is_none());
    }

    #[test]
    fn test_rotation_sentinels() {
        assert_eq!(Rotation::from_byte(0x20), Some(Rotation::Clockwise));
        assert_eq!(Rotation::from_byte(0x40), Some(Rotation::CounterClockwise));
        assert_eq!(Rotation::from_byte(0x00), None);
        assert_eq!(Rotation::from_byte(0x41), None);
        assert_eq!(Rotation::Clockwise.sign(), 1);
        assert_eq!(Rotation::CounterClockwise.sign(), -1);
    }
}

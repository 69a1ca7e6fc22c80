use std::fmt;

use crate::error::{Result, SessionError};

/// Why the parent asked the child to exit.
///
/// Transmitted on the cancellation channel as a 4-byte little-endian integer,
/// one value consumed per child lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A caller cancelled one wait operation.
    Cancel,
    /// The coordinator's whole lifetime is shutting down.
    Shutdown,
}

impl ExitReason {
    /// Wire size of one reason.
    pub const WIRE_SIZE: usize = 4;

    /// Encode for the cancellation channel.
    pub fn to_wire(self) -> [u8; Self::WIRE_SIZE] {
        let discriminant: u32 = match self {
            ExitReason::Cancel => 0,
            ExitReason::Shutdown => 1,
        };
        discriminant.to_le_bytes()
    }

    /// Decode from the cancellation channel.
    pub fn from_wire(bytes: [u8; Self::WIRE_SIZE]) -> Result<Self> {
        match u32::from_le_bytes(bytes) {
            0 => Ok(ExitReason::Cancel),
            1 => Ok(ExitReason::Shutdown),
            other => Err(SessionError::UnknownExitReason(other)),
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Cancel => f.write_str("cancel"),
            ExitReason::Shutdown => f.write_str("shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout_is_little_endian() {
        assert_eq!(ExitReason::Cancel.to_wire(), [0, 0, 0, 0]);
        assert_eq!(ExitReason::Shutdown.to_wire(), [1, 0, 0, 0]);
    }

    #[test]
    fn roundtrip() {
        for reason in [ExitReason::Cancel, ExitReason::Shutdown] {
            assert_eq!(ExitReason::from_wire(reason.to_wire()).unwrap(), reason);
        }
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        let err = ExitReason::from_wire(7u32.to_le_bytes()).unwrap_err();
        assert!(matches!(err, SessionError::UnknownExitReason(7)));
    }
}

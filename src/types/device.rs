//! Device and machine identification types.

use std::fmt;

/// Nowind interface generation found on the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetectedVersion {
    /// Nothing attached.
    #[default]
    None,
    /// First-generation interface.
    V1,
    /// FTDI-based second-generation interface.
    V2,
}

impl fmt::Display for DetectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::V1 => f.write_str("Nowind interface V1"),
            Self::V2 => f.write_str("Nowind interface V2"),
        }
    }
}

/// Identification of the attached interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Interface generation.
    pub version: DetectedVersion,
    /// USB serial number, if reported.
    pub serial: String,
    /// Port name or USB product description.
    pub description: String,
}

/// MSX generation, as reported in `A` by `GETDOSVERSION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsxVersion {
    One = 0,
    Two = 1,
    TwoPlus = 2,
    TurboR = 3,
}

impl MsxVersion {
    /// Parses the machine id byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::One),
            1 => Some(Self::Two),
            2 => Some(Self::TwoPlus),
            3 => Some(Self::TurboR),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msx_version_from_byte() {
        assert_eq!(MsxVersion::from_byte(0), Some(MsxVersion::One));
        assert_eq!(MsxVersion::from_byte(1), Some(MsxVersion::Two));
        assert_eq!(MsxVersion::from_byte(3), Some(MsxVersion::TurboR));
        assert_eq!(MsxVersion::from_byte(4), None);
    }

    #[test]
    fn test_detected_version_display() {
        assert_eq!(DetectedVersion::V2.to_string(), "Nowind interface V2");
        assert_eq!(DeviceInfo::default().version, DetectedVersion::None);
    }
}

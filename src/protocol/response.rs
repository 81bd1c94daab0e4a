//! Response codes for host-to-device block transfers.
//!
//! The code is the first byte after the response header and tells the MSX
//! side how to interpret the payload that follows.

/// Block transfer response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    /// Transfer finished, another request follows.
    ExitMoreDataAhead = 0x00,
    /// Batch of bracketed blocks written back to front.
    FastTransfer = 0x01,
    /// Single bracketed block at an absolute address.
    SlowTransfer = 0x02,
    /// Transfer finished.
    Exit = 0x03,
    /// Transfer failed.
    Error = 0x80,
}

impl ResponseCode {
    /// Attempts to parse a response code from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::ExitMoreDataAhead),
            0x01 => Some(Self::FastTransfer),
            0x02 => Some(Self::SlowTransfer),
            0x03 => Some(Self::Exit),
            0x80 => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        code as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_from_byte() {
        assert_eq!(ResponseCode::from_byte(1), Some(ResponseCode::FastTransfer));
        assert_eq!(ResponseCode::from_byte(2), Some(ResponseCode::SlowTransfer));
        assert_eq!(ResponseCode::from_byte(3), Some(ResponseCode::Exit));
        assert_eq!(ResponseCode::from_byte(128), Some(ResponseCode::Error));
        assert_eq!(ResponseCode::from_byte(4), None);
    }

    #[test]
    fn test_response_code_into_byte() {
        let code: u8 = ResponseCode::Exit.into();
        assert_eq!(code, 3);
    }
}

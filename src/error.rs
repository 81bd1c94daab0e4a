//! Error types for the nowind library.

use thiserror::Error;

/// The main error type for nowind operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No expected byte arrived before the protocol deadline.
    #[error("nowind protocol timeout after {timeout_ms}ms, {discarded} bytes discarded")]
    ProtocolTimeout { timeout_ms: u64, discarded: usize },

    /// The inbound stream lost frame alignment.
    #[error("nowind command de-sync, {discarded} bytes discarded")]
    ProtocolDesync { discarded: usize },

    /// No free marker value exists for a block payload.
    #[error("no unused marker value in a {len} byte block")]
    MarkerExhausted { len: usize },

    /// Block payload does not leave room for a marker value.
    #[error("block of {len} bytes exceeds maximum {max}")]
    BlockTooLarge { len: usize, max: usize },

    /// The device sent a known command the host does not implement.
    #[error("command {name} (0x{opcode:02X}) not implemented")]
    UnimplementedOpcode { name: &'static str, opcode: u8 },

    /// The link to the device is gone.
    #[error("transport lost")]
    TransportLost,

    /// A read fell outside the disk image.
    #[error("disk read of {len} bytes at offset {offset} exceeds image size {size}")]
    DiskRange { offset: usize, len: usize, size: usize },

    /// Block transfer gave up after too many retransmissions.
    #[error("transfer aborted after {retransmissions} retransmissions")]
    RetransmissionLimit { retransmissions: u32 },
}

impl Error {
    /// Returns true for errors the dispatcher recovers from by resynchronizing.
    #[must_use]
    pub const fn is_resync(&self) -> bool {
        matches!(
            self,
            Self::ProtocolTimeout { .. } | Self::ProtocolDesync { .. }
        )
    }

    /// Number of inbound bytes thrown away while the error was raised.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        match self {
            Self::ProtocolTimeout { discarded, .. } | Self::ProtocolDesync { discarded } => {
                *discarded
            }
            _ => 0,
        }
    }
}

/// Result type alias for nowind operations.
pub type Result<T> = std::result::Result<T, Error>;

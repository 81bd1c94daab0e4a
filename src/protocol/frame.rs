//! Frame layout for the Nowind protocol.
//!
//! Device to host:
//! ```text
//! ┌──────┬──────┬───────┬───────┬───────┬───┬───┬─────┐
//! │ 0xAF │ 0x05 │ BC LE │ DE LE │ HL LE │ F │ A │ CMD │
//! └──────┴──────┴───────┴───────┴───────┴───┴───┴─────┘
//! ```
//!
//! Host to device:
//! ```text
//! ┌──────┬──────┬──────┬──────┬─────────────┐
//! │ 0xFF │ 0xAF │ 0x05 │ code │   payload   │
//! └──────┴──────┴──────┴──────┴─────────────┘
//! ```
//! The leading `0xFF` may be swallowed by the interface after an idle
//! period and is never interpreted.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::command::Command;

/// Synchronization bytes that open every frame.
pub const SYNC: [u8; 2] = [0xAF, 0x05];

/// Header prepended to every response, including the sacrificial byte.
pub const RESPONSE_HEADER: [u8; 3] = [0xFF, 0xAF, 0x05];

/// Register payload size following [`SYNC`] in a command frame.
pub const COMMAND_PAYLOAD_SIZE: usize = 9;

/// Full command frame size.
pub const COMMAND_FRAME_SIZE: usize = SYNC.len() + COMMAND_PAYLOAD_SIZE;

/// Encodes a command the way the MSX side puts it on the wire.
#[must_use]
pub fn encode_command(command: &Command) -> Bytes {
    let mut buf = BytesMut::with_capacity(COMMAND_FRAME_SIZE);
    buf.put_slice(&SYNC);
    buf.put_u16_le(command.bc);
    buf.put_u16_le(command.de);
    buf.put_u16_le(command.hl);
    buf.put_u8(command.f);
    buf.put_u8(command.a);
    buf.put_u8(command.cmd);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_layout() {
        // Captured at boot: CMDREQUEST
        let command = Command::decode(0x0000, 0x1001, 0xFCC2, 0xA4, 0xF5, 0x93);
        let frame = encode_command(&command);
        assert_eq!(
            &frame[..],
            &[0xAF, 0x05, 0x00, 0x00, 0x01, 0x10, 0xC2, 0xFC, 0xA4, 0xF5, 0x93]
        );
        assert_eq!(frame.len(), COMMAND_FRAME_SIZE);
    }

    #[test]
    fn test_header_contains_sync() {
        assert_eq!(RESPONSE_HEADER[1..], SYNC);
    }
}

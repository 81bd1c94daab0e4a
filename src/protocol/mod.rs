//! Protocol definitions for Nowind communication.
//!
//! This module contains the low-level protocol types including:
//! - Frame layout and wire constants
//! - Command opcodes and register decoding
//! - Response codes
//! - Marker-bracketed data blocks

pub mod block;
pub mod command;
pub mod frame;
pub mod response;

pub use block::{BLOCK_SIZE, DataBlock, MAX_BLOCK_PAYLOAD, split_reversed};
pub use command::{Command, CommandOpcode, high, low};
pub use frame::{COMMAND_FRAME_SIZE, COMMAND_PAYLOAD_SIZE, RESPONSE_HEADER, SYNC, encode_command};
pub use response::ResponseCode;

//! Byte queues between the transport tasks and the dispatcher.
//!
//! - [`InboundQueue`] buffers bytes from the device and offers deadline-bound reads
//! - [`OutboundQueue`] builds response frames and hands them to the writer

pub mod inbound;
pub mod outbound;

pub use inbound::{DEFAULT_PROTOCOL_TIMEOUT, InboundQueue};
pub use outbound::OutboundQueue;

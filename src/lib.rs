//! # nowind
//!
//! Host-side protocol engine for the Nowind MSX disk interface.
//!
//! The MSX talks to the host through an FTDI USB FIFO. It sends register
//! snapshots prefixed with `AF 05`; the host answers with short replies or
//! with marker-bracketed blocks that the MSX echoes back for verification.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Resynchronization after timeouts and de-synced frames
//! - Verified block transfers with selective retransmission
//! - Event stream and diagnostic sinks for monitoring
//!
//! ## Quick Start
//!
//! ```no_run
//! use nowind::{HostConfig, MemoryDiskImage, NowindHost};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nowind::Error> {
//!     let disk = MemoryDiskImage::open("disk.dsk").await?;
//!     let host = NowindHost::new(HostConfig::default(), disk);
//!
//!     // Serve the first FTDI interface found, re-attaching after unplugs
//!     let mut transport = nowind::SerialTransport::new(nowind::SerialConfig::auto_detect());
//!     host.run(&mut transport).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Opcodes, response codes, frame layout and data blocks
//! - [`queue`] - Inbound and outbound byte queues with protocol timeouts
//! - [`commands`] - Command handlers and verified block transfers
//! - [`dispatcher`] - Frame recognition, dispatch and resynchronization
//! - [`transport`] - Link pumps and the serial transport
//! - [`event`] - Event stream and diagnostic sinks
//! - [`types`] - Device identification and disk images
//! - [`host`] - High-level [`NowindHost`]

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod host;
pub mod protocol;
pub mod queue;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use commands::{CommandHandler, Handled, ReadOperation, TransferReport};
pub use config::{HostConfig, UnimplementedPolicy};
pub use dispatcher::{Dispatcher, SessionStats, Step};
pub use error::{Error, Result};
pub use event::{DiagnosticSink, Event, EventDispatcher, MessageLog, Subscription, TracingSink};
pub use host::NowindHost;
pub use protocol::{Command, CommandOpcode, DataBlock, ResponseCode};
pub use queue::{InboundQueue, OutboundQueue};
pub use transport::{SerialConfig, SerialTransport, Transport, list_ports};
pub use types::{DetectedVersion, DeviceInfo, DiskImage, MemoryDiskImage, MsxVersion};

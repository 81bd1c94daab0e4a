//! Bytes queued for the Nowind interface.
//!
//! Responses are assembled here and handed to the transport writer task as
//! one frame per flush.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::{DataBlock, RESPONSE_HEADER, ResponseCode};

/// Frame builder and send buffer for host-to-device traffic.
#[derive(Debug)]
pub struct OutboundQueue {
    buffer: BytesMut,
    tx: mpsc::Sender<Bytes>,
}

impl OutboundQueue {
    /// Creates a queue whose flushed frames are sent to `tx`.
    #[must_use]
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            buffer: BytesMut::new(),
            tx,
        }
    }

    /// Appends the response header, including the sacrificial `0xFF`.
    pub fn add_header(&mut self) {
        self.buffer.put_slice(&RESPONSE_HEADER);
    }

    /// Appends a header followed by a response code.
    pub fn add_response(&mut self, code: ResponseCode) {
        self.add_header();
        self.add_byte(code.into());
    }

    pub fn add_byte(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    /// Appends a word, low byte first.
    pub fn add_word(&mut self, value: u16) {
        self.buffer.put_u16_le(value);
    }

    pub fn add_raw(&mut self, data: &[u8]) {
        self.buffer.put_slice(data);
    }

    /// Wraps `payload` in a [`DataBlock`] and appends it bracketed by its marker.
    ///
    /// Returns the marker the receiver is expected to echo.
    pub fn add_block(&mut self, payload: &[u8]) -> Result<u8> {
        let block = DataBlock::new(Bytes::copy_from_slice(payload))?;
        self.put_block(&block);
        Ok(block.marker())
    }

    /// Appends `marker, payload..., marker`.
    ///
    /// Empty blocks are never put on the wire.
    pub fn put_block(&mut self, block: &DataBlock) {
        if block.is_empty() {
            tracing::warn!("skipping empty block with marker {:#04x}", block.marker());
            return;
        }
        tracing::trace!(
            "block of {} bytes with marker {:#04x}",
            block.len(),
            block.marker()
        );
        self.buffer.put_u8(block.marker());
        self.buffer.put_slice(block.payload());
        self.buffer.put_u8(block.marker());
    }

    /// Returns the number of bytes waiting to be flushed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing is waiting to be flushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Takes the buffered bytes, leaving the queue empty.
    pub fn take_all(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Drops buffered bytes without sending them.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Sends everything buffered as one frame.
    ///
    /// Returns the number of bytes sent; an empty queue sends nothing.
    pub async fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let frame = self.take_all();
        let len = frame.len();
        tracing::trace!("outbound {} bytes: {}", len, hex::encode(&frame));
        self.tx
            .send(frame)
            .await
            .map_err(|_| Error::TransportLost)?;
        Ok(len)
    }
}

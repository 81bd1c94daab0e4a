//! Bytes received from the Nowind interface.
//!
//! The transport reader task feeds received chunks through an mpsc channel.
//! Every suspending read is bounded by a deadline that the owner restarts
//! explicitly; when it passes, the read fails with
//! [`Error::ProtocolTimeout`] so the caller can resynchronize.

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Default window for an expected byte to arrive.
pub const DEFAULT_PROTOCOL_TIMEOUT: Duration = Duration::from_millis(700);

/// FIFO of bytes received from the device.
#[derive(Debug)]
pub struct InboundQueue {
    buffer: BytesMut,
    rx: mpsc::Receiver<Bytes>,
    timeout: Duration,
    deadline: Instant,
}

impl InboundQueue {
    /// Creates a queue fed by `rx` using the default timeout.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self::with_timeout(rx, DEFAULT_PROTOCOL_TIMEOUT)
    }

    /// Creates a queue fed by `rx` with a custom timeout window.
    #[must_use]
    pub fn with_timeout(rx: mpsc::Receiver<Bytes>, timeout: Duration) -> Self {
        Self {
            buffer: BytesMut::new(),
            rx,
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    /// Appends bytes without suspending.
    pub fn append(&mut self, data: &[u8]) {
        tracing::trace!("inbound +{} bytes: {}", data.len(), hex::encode(data));
        self.buffer.extend_from_slice(data);
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the configured timeout window.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts a new timeout window from now.
    pub fn restart_timeout(&mut self) {
        self.deadline = Instant::now() + self.timeout;
    }

    /// Returns true once the current window has elapsed.
    #[must_use]
    pub fn timeout_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Suspends until at least one byte is buffered, without a deadline.
    ///
    /// An idle device is not an error; only a closed feed ends the wait.
    pub async fn wait_for_data(&mut self) -> Result<()> {
        while self.buffer.is_empty() {
            let chunk = self.rx.recv().await.ok_or(Error::TransportLost)?;
            self.append(&chunk);
        }
        Ok(())
    }

    /// Returns the next byte, suspending until one arrives or the deadline passes.
    pub async fn next_byte(&mut self) -> Result<u8> {
        self.next_byte_discarding(0).await
    }

    async fn next_byte_discarding(&mut self, discarded: usize) -> Result<u8> {
        while self.buffer.is_empty() {
            self.fill(discarded).await?;
        }
        Ok(self.buffer.get_u8())
    }

    /// Consumes bytes until `expected` has been seen in full.
    ///
    /// On a mismatch the match restarts at index 1 when the offending byte
    /// equals the first pattern byte, otherwise at 0. Returns the number
    /// of bytes thrown away before the match.
    pub async fn wait_for_sequence(&mut self, expected: &[u8]) -> Result<usize> {
        let Some(&first) = expected.first() else {
            return Ok(0);
        };

        let mut index = 0;
        let mut discarded = 0;
        while index < expected.len() {
            let byte = self.next_byte_discarding(discarded + index).await?;
            if byte == expected[index] {
                index += 1;
            } else if byte == first {
                discarded += index;
                index = 1;
            } else {
                discarded += index + 1;
                index = 0;
            }
        }

        if discarded > 0 {
            tracing::debug!("sequence matched after discarding {} bytes", discarded);
        }
        Ok(discarded)
    }

    /// Suspends until at least `count` bytes are buffered.
    pub async fn wait_for_available(&mut self, count: usize) -> Result<()> {
        while self.buffer.len() < count {
            self.fill(0).await?;
        }
        Ok(())
    }

    /// Pops one byte. The caller must have ensured it is buffered.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty.
    pub fn read_byte(&mut self) -> u8 {
        self.buffer.get_u8()
    }

    /// Pops a little-endian word. The caller must have ensured both bytes are buffered.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two bytes are buffered.
    pub fn read_word(&mut self) -> u16 {
        self.buffer.get_u16_le()
    }

    /// Drops all buffered bytes, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.buffer.len();
        self.buffer.clear();
        removed
    }

    /// Receives one chunk from the feed or fails at the deadline.
    async fn fill(&mut self, discarded: usize) -> Result<()> {
        match tokio::time::timeout_at(self.deadline, self.rx.recv()).await {
            Ok(Some(chunk)) => {
                self.append(&chunk);
                Ok(())
            }
            Ok(None) => Err(Error::TransportLost),
            Err(_) => Err(Error::ProtocolTimeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                discarded,
            }),
        }
    }
}

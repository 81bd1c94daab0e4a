//! Verified block transfers from host to MSX memory.
//!
//! A fast transfer sends a batch of marker-bracketed blocks under one
//! header. The MSX copies them back to front from the end address and echoes
//! the last byte it saw for each block. A block whose echo equals its
//! marker arrived complete; any other block is sent again in the next round.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::{BLOCK_SIZE, DataBlock, ResponseCode, split_reversed};
use crate::queue::{InboundQueue, OutboundQueue};

/// The block count travels as a single byte.
pub const MAX_BLOCKS_PER_ROUND: usize = 255;

/// Summary of a finished transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Payload bytes delivered.
    pub bytes: usize,
    /// Blocks the payload was split into.
    pub blocks: usize,
    /// Frames sent.
    pub rounds: usize,
    /// Blocks sent more than once.
    pub retransmissions: u32,
}

/// Queues a single-block transfer to an absolute address.
///
/// Used for payloads shorter than [`BLOCK_SIZE`], which the receiver's
/// unrolled fast copy cannot handle. No echo is expected.
pub fn queue_slow_transfer(outbound: &mut OutboundQueue, address: u16, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        tracing::warn!("ignoring empty transfer to {:#06x}", address);
        return Ok(());
    }
    let block = DataBlock::new(Bytes::copy_from_slice(data))?;
    tracing::debug!(
        "slow transfer of {} bytes to {:#06x}",
        block.len(),
        address
    );
    outbound.add_response(ResponseCode::SlowTransfer);
    outbound.add_word(address);
    outbound.add_word(block.len() as u16);
    outbound.put_block(&block);
    Ok(())
}

/// A read request being delivered to MSX memory.
#[derive(Debug)]
pub struct ReadOperation {
    base_address: u16,
    data: Bytes,
    pending: Vec<DataBlock>,
    blocks: usize,
    rounds: usize,
    retransmissions: u32,
    max_retransmissions: Option<u32>,
}

impl ReadOperation {
    /// Prepares `data` for delivery to `address`.
    ///
    /// Payloads of at least one block are split in receiver write order.
    pub fn new(address: u16, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let pending = if data.len() < BLOCK_SIZE {
            Vec::new()
        } else {
            split_reversed(&data)?
        };
        let blocks = if data.is_empty() {
            0
        } else {
            pending.len().max(1)
        };
        Ok(Self {
            base_address: address,
            blocks,
            data,
            pending,
            rounds: 0,
            retransmissions: 0,
            max_retransmissions: None,
        })
    }

    /// Bounds the number of retransmitted blocks; `None` retries forever.
    #[must_use]
    pub const fn with_retransmission_limit(mut self, limit: Option<u32>) -> Self {
        self.max_retransmissions = limit;
        self
    }

    /// Blocks not yet acknowledged, in wire order.
    #[must_use]
    pub fn pending(&self) -> &[DataBlock] {
        &self.pending
    }

    /// Total payload size of the unacknowledged blocks.
    #[must_use]
    pub fn pending_size(&self) -> usize {
        self.pending.iter().map(DataBlock::len).sum()
    }

    #[must_use]
    pub const fn retransmissions(&self) -> u32 {
        self.retransmissions
    }

    /// True when the payload uses the fast, verified path.
    #[must_use]
    pub fn is_fast(&self) -> bool {
        self.data.len() >= BLOCK_SIZE
    }

    fn report(&self) -> TransferReport {
        TransferReport {
            bytes: self.data.len(),
            blocks: self.blocks,
            rounds: self.rounds,
            retransmissions: self.retransmissions,
        }
    }

    /// Delivers the payload, retransmitting until every block is confirmed.
    ///
    /// Each round is flushed immediately. The closing `EXIT` frame is left
    /// queued in `outbound` for the caller to flush.
    pub async fn execute(
        &mut self,
        outbound: &mut OutboundQueue,
        inbound: &mut InboundQueue,
    ) -> Result<TransferReport> {
        if self.data.is_empty() {
            tracing::warn!("ignoring empty read to {:#06x}", self.base_address);
            return Ok(self.report());
        }

        if !self.is_fast() {
            queue_slow_transfer(outbound, self.base_address, &self.data)?;
            self.rounds = 1;
            return Ok(self.report());
        }

        while !self.pending.is_empty() {
            self.rounds += 1;
            let batch_len = self.pending.len().min(MAX_BLOCKS_PER_ROUND);
            self.queue_round(outbound, batch_len);
            outbound.flush().await?;

            let mut remaining = std::mem::take(&mut self.pending);
            let rest = remaining.split_off(batch_len);
            let mut retained = Vec::new();
            for block in remaining {
                inbound.restart_timeout();
                let echo = inbound.next_byte().await?;
                if echo == block.marker() {
                    continue;
                }
                tracing::debug!(
                    "block echo {:#04x} does not match marker {:#04x}, retransmitting",
                    echo,
                    block.marker()
                );
                self.retransmissions += 1;
                retained.push(block);
            }

            if let Some(limit) = self.max_retransmissions {
                if self.retransmissions > limit {
                    return Err(Error::RetransmissionLimit {
                        retransmissions: self.retransmissions,
                    });
                }
            }

            retained.extend(rest);
            self.pending = retained;
        }

        outbound.add_response(ResponseCode::Exit);
        tracing::debug!(
            "read of {} bytes to {:#06x} done in {} rounds",
            self.data.len(),
            self.base_address,
            self.rounds
        );
        Ok(self.report())
    }

    /// Queues one fast-transfer frame for the first `count` pending blocks.
    fn queue_round(&self, outbound: &mut OutboundQueue, count: usize) {
        let end_address = self
            .base_address
            .wrapping_add(self.pending_size() as u16);
        tracing::debug!(
            "round {}: {} blocks ending at {:#06x}",
            self.rounds,
            count,
            end_address
        );
        outbound.add_response(ResponseCode::FastTransfer);
        outbound.add_word(end_address);
        outbound.add_byte(count as u8);
        for block in &self.pending[..count] {
            outbound.put_block(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const EXIT_FRAME: [u8; 4] = [0xFF, 0xAF, 0x05, 0x03];

    struct Link {
        outbound: OutboundQueue,
        inbound: InboundQueue,
        frames: mpsc::Receiver<Bytes>,
        _feed: mpsc::Sender<Bytes>,
    }

    fn link() -> Link {
        let (out_tx, frames) = mpsc::channel(64);
        let (feed, in_rx) = mpsc::channel(64);
        Link {
            outbound: OutboundQueue::new(out_tx),
            inbound: InboundQueue::new(in_rx),
            frames,
            _feed: feed,
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 97) as u8).collect()
    }

    fn markers(op: &ReadOperation) -> Vec<u8> {
        op.pending().iter().map(DataBlock::marker).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_blocks_confirmed_first_round() {
        let mut link = link();
        let data = sample(3 * BLOCK_SIZE);
        let mut op = ReadOperation::new(0xC000, data.clone()).unwrap();
        link.inbound.append(&markers(&op));

        let report = op.execute(&mut link.outbound, &mut link.inbound).await.unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(report.retransmissions, 0);
        assert_eq!(report.blocks, 3);
        assert_eq!(report.bytes, 384);
        assert!(op.pending().is_empty());

        let frame = link.frames.recv().await.unwrap();
        assert_eq!(&frame[..4], &[0xFF, 0xAF, 0x05, 0x01]);
        // End address 0xC000 + 384, then block count
        assert_eq!(&frame[4..7], &[0x80, 0xC1, 3]);
        assert_eq!(frame.len(), 7 + 3 * (BLOCK_SIZE + 2));

        // First block on the wire carries the last bytes, reversed
        let first = &frame[7..7 + BLOCK_SIZE + 2];
        assert_eq!(first[0], first[BLOCK_SIZE + 1]);
        assert_eq!(first[1], data[data.len() - 1]);

        assert!(link.frames.try_recv().is_err());
        assert_eq!(&link.outbound.take_all()[..], &EXIT_FRAME);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_echo_is_retransmitted() {
        let mut link = link();
        let mut op = ReadOperation::new(0x8000, sample(3 * BLOCK_SIZE)).unwrap();
        let m = markers(&op);
        let wrong = m[1].wrapping_add(1);
        link.inbound.append(&[m[0], wrong, m[2], m[1]]);

        let report = op.execute(&mut link.outbound, &mut link.inbound).await.unwrap();
        assert_eq!(report.rounds, 2);
        assert_eq!(report.retransmissions, 1);
        assert_eq!(op.retransmissions(), 1);

        let first = link.frames.recv().await.unwrap();
        assert_eq!(first[6], 3);

        let second = link.frames.recv().await.unwrap();
        assert_eq!(&second[..4], &[0xFF, 0xAF, 0x05, 0x01]);
        // Only one block left, so the end address shrinks by two blocks
        assert_eq!(&second[4..7], &[0x80, 0x80, 1]);
        assert_eq!(second[7], m[1]);
        assert_eq!(second.len(), 7 + BLOCK_SIZE + 2);

        assert!(link.frames.try_recv().is_err());
        assert_eq!(&link.outbound.take_all()[..], &EXIT_FRAME);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_echo_times_out() {
        let mut link = link();
        let mut op = ReadOperation::new(0x8000, sample(2 * BLOCK_SIZE)).unwrap();
        let m = markers(&op);
        link.inbound.append(&m[..1]);

        let err = op
            .execute(&mut link.outbound, &mut link.inbound)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolTimeout { .. }));
        assert!(link.outbound.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retransmission_limit() {
        let mut link = link();
        let mut op = ReadOperation::new(0x8000, sample(BLOCK_SIZE))
            .unwrap()
            .with_retransmission_limit(Some(1));
        let bad = markers(&op)[0].wrapping_add(1);
        link.inbound.append(&[bad, bad]);

        let err = op
            .execute(&mut link.outbound, &mut link.inbound)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RetransmissionLimit { retransmissions: 2 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_read_uses_slow_transfer() {
        let mut link = link();
        let data = sample(100);
        let mut op = ReadOperation::new(0x4000, data.clone()).unwrap();
        assert!(!op.is_fast());

        let report = op.execute(&mut link.outbound, &mut link.inbound).await.unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(report.blocks, 1);

        let frame = link.outbound.take_all();
        assert_eq!(&frame[..8], &[0xFF, 0xAF, 0x05, 0x02, 0x00, 0x40, 100, 0]);
        let marker = frame[8];
        assert!(!data.contains(&marker));
        assert_eq!(&frame[9..109], &data[..]);
        assert_eq!(frame[109], marker);
        assert_eq!(frame.len(), 110);
        assert!(link.frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_read_sends_nothing() {
        let mut link = link();
        let mut op = ReadOperation::new(0x4000, Vec::new()).unwrap();

        let report = op.execute(&mut link.outbound, &mut link.inbound).await.unwrap();
        assert_eq!(report, TransferReport::default());
        assert!(link.outbound.is_empty());
        assert!(link.frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_read_is_split_across_rounds() {
        let mut link = link();
        let mut op = ReadOperation::new(0x0000, sample(300 * BLOCK_SIZE)).unwrap();
        link.inbound.append(&markers(&op));

        let report = op.execute(&mut link.outbound, &mut link.inbound).await.unwrap();
        assert_eq!(report.rounds, 2);
        assert_eq!(report.retransmissions, 0);

        let first = link.frames.recv().await.unwrap();
        // 300 * 128 = 0x9600
        assert_eq!(&first[4..7], &[0x00, 0x96, 255]);
        let second = link.frames.recv().await.unwrap();
        // 45 * 128 = 0x1680
        assert_eq!(&second[4..7], &[0x80, 0x16, 45]);
    }

    #[test]
    fn test_pending_size_tracks_blocks() {
        let op = ReadOperation::new(0, sample(1000)).unwrap();
        assert_eq!(op.pending().len(), 8);
        assert_eq!(op.pending_size(), 1000);
    }
}

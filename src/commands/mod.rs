//! Command handlers for Nowind requests.
//!
//! Each known opcode either queues a small fixed reply, runs a block
//! transfer, or is ignored. Sending nothing is a legal answer: the MSX side
//! times out and reports the drive as offline.

pub mod transfer;

use std::sync::Arc;

use crate::config::{HostConfig, UnimplementedPolicy};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher};
use crate::protocol::{BLOCK_SIZE, Command, CommandOpcode};
use crate::queue::{InboundQueue, OutboundQueue};
use crate::types::{DiskImage, MsxVersion, SECTOR_SIZE};

pub use transfer::{MAX_BLOCKS_PER_ROUND, ReadOperation, TransferReport, queue_slow_transfer};

/// `INIENV` reply meaning "no ROM disk".
pub const NO_ROMDISK: u8 = 0xFF;

/// `DRIVES` flag letting disk ROMs in other slots initialize.
const ALLOW_OTHER_DISKROMS: u8 = 0x80;

/// `DRIVES` value requesting phantom drives.
const PHANTOM_DRIVES: u8 = 0x02;

/// How a command was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// A fixed reply was queued.
    Responded,
    /// A block transfer ran to completion.
    Transferred(TransferReport),
    /// Deliberately left unanswered.
    Ignored,
    /// Opcode outside the command table.
    Unknown,
}

/// Answers decoded commands from the configured disk image.
#[derive(Debug)]
pub struct CommandHandler<D> {
    config: HostConfig,
    disk: Arc<D>,
    events: EventDispatcher,
}

impl<D: DiskImage> CommandHandler<D> {
    /// Creates a new command handler.
    #[must_use]
    pub const fn new(config: HostConfig, disk: Arc<D>, events: EventDispatcher) -> Self {
        Self {
            config,
            disk,
            events,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Handles one command, queueing any reply in `outbound`.
    ///
    /// Block transfers flush their own rounds and read echoes from
    /// `inbound`; everything else is left for the caller to flush.
    pub async fn handle(
        &self,
        command: &Command,
        outbound: &mut OutboundQueue,
        inbound: &mut InboundQueue,
    ) -> Result<Handled> {
        let Some(opcode) = command.opcode() else {
            tracing::warn!("unknown command {:#04x} ignored", command.cmd);
            return Ok(Handled::Unknown);
        };

        match opcode {
            CommandOpcode::DskIo => self.disk_io(command, outbound, inbound).await,
            CommandOpcode::DskChg => {
                outbound.add_header();
                // Unchanged; this host has no image swapping yet
                outbound.add_byte(0);
                outbound.add_byte(0xFF);
                Ok(Handled::Responded)
            }
            CommandOpcode::Drives => {
                self.drives(command, outbound);
                Ok(Handled::Responded)
            }
            CommandOpcode::IniEnv => {
                outbound.add_header();
                outbound.add_byte(NO_ROMDISK);
                Ok(Handled::Responded)
            }
            CommandOpcode::GetDosVersion => {
                self.dos_version(command, outbound);
                Ok(Handled::Responded)
            }
            CommandOpcode::CmdRequest => {
                tracing::debug!(
                    "command requested: {:#04x} with argument {:#04x}",
                    command.b(),
                    command.c()
                );
                outbound.add_header();
                // No host command waiting
                outbound.add_byte(0);
                Ok(Handled::Responded)
            }
            _ => self.unimplemented(opcode),
        }
    }

    async fn disk_io(
        &self,
        command: &Command,
        outbound: &mut OutboundQueue,
        inbound: &mut InboundQueue,
    ) -> Result<Handled> {
        if command.carry() {
            tracing::warn!("DSKIO write not implemented, no response sent");
            return Ok(Handled::Ignored);
        }

        let sectors = usize::from(command.sector_amount());
        let size = sectors * SECTOR_SIZE;
        let sector = command.start_sector() as usize;
        let address = command.transfer_address();
        if size == 0 {
            tracing::warn!("DSKIO read of zero sectors ignored");
            return Ok(Handled::Ignored);
        }

        tracing::debug!(
            "DSKIO read transfer sector {} to address {:#06x}, {} sectors",
            sector,
            address,
            sectors
        );
        let data = self.disk.read(sector * SECTOR_SIZE, size)?;

        if size < BLOCK_SIZE {
            queue_slow_transfer(outbound, address, &data)?;
            return Ok(Handled::Responded);
        }

        let report = ReadOperation::new(address, data)?
            .with_retransmission_limit(self.config.max_retransmissions)
            .execute(outbound, inbound)
            .await?;
        self.events.dispatch(Event::TransferCompleted(report));
        Ok(Handled::Transferred(report))
    }

    fn drives(&self, command: &Command, outbound: &mut OutboundQueue) {
        outbound.add_header();
        outbound.add_byte(if self.config.phantom_drives {
            PHANTOM_DRIVES
        } else {
            0
        });
        outbound.add_byte(if self.config.allow_other_diskroms {
            command.a | ALLOW_OTHER_DISKROMS
        } else {
            command.a
        });
        outbound.add_byte(self.config.drives);
    }

    /// Replies 2 to boot MSX-DOS 2, 1 for MSX-DOS 1.
    ///
    /// DOS 2 is only offered to MSX2; the turbo R has it built in.
    fn dos_version(&self, command: &Command, outbound: &mut OutboundQueue) {
        let machine = MsxVersion::from_byte(command.a);
        let version = if self.config.dos2 && machine == Some(MsxVersion::Two) {
            2
        } else {
            1
        };
        outbound.add_header();
        outbound.add_byte(version);
    }

    fn unimplemented(&self, opcode: CommandOpcode) -> Result<Handled> {
        match self.config.unimplemented_policy {
            UnimplementedPolicy::Abort => Err(Error::UnimplementedOpcode {
                name: opcode.name(),
                opcode: opcode.into(),
            }),
            UnimplementedPolicy::Ignore => {
                tracing::warn!("{} not implemented, no response sent", opcode.name());
                Ok(Handled::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DataBlock;
    use crate::types::MemoryDiskImage;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    struct Fixture {
        handler: CommandHandler<MemoryDiskImage>,
        outbound: OutboundQueue,
        inbound: InboundQueue,
        frames: mpsc::Receiver<Bytes>,
        _feed: mpsc::Sender<Bytes>,
    }

    fn fixture(config: HostConfig) -> Fixture {
        let image: Vec<u8> = (0..16 * SECTOR_SIZE).map(|i| (i / SECTOR_SIZE) as u8).collect();
        let (out_tx, frames) = mpsc::channel(16);
        let (feed, in_rx) = mpsc::channel(16);
        Fixture {
            handler: CommandHandler::new(
                config,
                Arc::new(MemoryDiskImage::new(image)),
                EventDispatcher::default(),
            ),
            outbound: OutboundQueue::new(out_tx),
            inbound: InboundQueue::new(in_rx),
            frames,
            _feed: feed,
        }
    }

    impl Fixture {
        async fn handle(&mut self, command: Command) -> Result<Handled> {
            self.handler
                .handle(&command, &mut self.outbound, &mut self.inbound)
                .await
        }
    }

    #[tokio::test]
    async fn test_drives_reply() {
        let mut fx = fixture(HostConfig::default());
        let handled = fx
            .handle(Command::decode(0, 0xFB21, 0, 0, 0x00, 0x85))
            .await
            .unwrap();
        assert_eq!(handled, Handled::Responded);
        assert_eq!(
            &fx.outbound.take_all()[..],
            &[0xFF, 0xAF, 0x05, 0x00, 0x80, 0x01]
        );

        let mut fx = fixture(
            HostConfig::new()
                .phantom_drives(true)
                .allow_other_diskroms(false)
                .drives(2),
        );
        fx.handle(Command::decode(0, 0, 0, 0, 0x01, 0x85))
            .await
            .unwrap();
        assert_eq!(
            &fx.outbound.take_all()[..],
            &[0xFF, 0xAF, 0x05, 0x02, 0x01, 0x02]
        );
    }

    #[tokio::test]
    async fn test_dos_version_reply() {
        let mut fx = fixture(HostConfig::default());
        fx.handle(Command::decode(0, 0xF500, 0x20C2, 0x45, 0x01, 0x92))
            .await
            .unwrap();
        assert_eq!(&fx.outbound.take_all()[..], &[0xFF, 0xAF, 0x05, 0x01]);

        let mut fx = fixture(HostConfig::new().dos2(true));
        fx.handle(Command::decode(0, 0, 0, 0, 0x01, 0x92))
            .await
            .unwrap();
        assert_eq!(&fx.outbound.take_all()[..], &[0xFF, 0xAF, 0x05, 0x02]);

        // turbo R boots its own DOS 2
        fx.handle(Command::decode(0, 0, 0, 0, 0x03, 0x92))
            .await
            .unwrap();
        assert_eq!(&fx.outbound.take_all()[..], &[0xFF, 0xAF, 0x05, 0x01]);
    }

    #[tokio::test]
    async fn test_fixed_replies() {
        let mut fx = fixture(HostConfig::default());

        fx.handle(Command::decode(0x10C2, 0, 0, 0, 0, 0x93))
            .await
            .unwrap();
        assert_eq!(&fx.outbound.take_all()[..], &[0xFF, 0xAF, 0x05, 0x00]);

        fx.handle(Command::decode(0, 0, 0, 0, 0, 0x86)).await.unwrap();
        assert_eq!(&fx.outbound.take_all()[..], &[0xFF, 0xAF, 0x05, 0xFF]);

        fx.handle(Command::decode(0, 0, 0, 0, 0, 0x81)).await.unwrap();
        assert_eq!(&fx.outbound.take_all()[..], &[0xFF, 0xAF, 0x05, 0x00, 0xFF]);
    }

    #[tokio::test]
    async fn test_unknown_opcode_sends_nothing() {
        let mut fx = fixture(HostConfig::default());
        let handled = fx.handle(Command::decode(0, 0, 0, 0, 0, 0x12)).await.unwrap();
        assert_eq!(handled, Handled::Unknown);
        assert!(fx.outbound.is_empty());
    }

    #[tokio::test]
    async fn test_unimplemented_policy() {
        let mut fx = fixture(HostConfig::default());
        let err = fx
            .handle(Command::decode(0, 0, 0, 0, 0, 0x82))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnimplementedOpcode {
                name: "GETDPB",
                opcode: 0x82
            }
        ));

        let mut fx = fixture(HostConfig::new().unimplemented_policy(UnimplementedPolicy::Ignore));
        let handled = fx.handle(Command::decode(0, 0, 0, 0, 0, 0x87)).await.unwrap();
        assert_eq!(handled, Handled::Ignored);
        assert!(fx.outbound.is_empty());
    }

    #[tokio::test]
    async fn test_dskio_write_is_ignored() {
        let mut fx = fixture(HostConfig::default());
        let handled = fx
            .handle(Command::decode(0x01F9, 0x0000, 0xC000, 0x01, 0, 0x80))
            .await
            .unwrap();
        assert_eq!(handled, Handled::Ignored);
        assert!(fx.outbound.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dskio_read_runs_transfer() {
        let mut fx = fixture(HostConfig::default());
        // One sector (sector 3) to 0xC000
        let sector: Vec<u8> = vec![3; SECTOR_SIZE];
        let blocks = crate::protocol::split_reversed(&sector).unwrap();
        let markers: Vec<u8> = blocks.iter().map(DataBlock::marker).collect();
        fx.inbound.append(&markers);

        let handled = fx
            .handle(Command::decode(0x01F9, 0x0003, 0xC000, 0x00, 0, 0x80))
            .await
            .unwrap();
        let Handled::Transferred(report) = handled else {
            panic!("expected transfer, got {handled:?}");
        };
        assert_eq!(report.bytes, SECTOR_SIZE);
        assert_eq!(report.blocks, 4);
        assert_eq!(report.rounds, 1);

        let frame = fx.frames.recv().await.unwrap();
        // 0xC000 + 512
        assert_eq!(&frame[..7], &[0xFF, 0xAF, 0x05, 0x01, 0x00, 0xC2, 4]);
        assert_eq!(frame[8], 3);
        assert_eq!(&fx.outbound.take_all()[..], &[0xFF, 0xAF, 0x05, 0x03]);
    }

    #[tokio::test]
    async fn test_dskio_out_of_range_is_fatal() {
        let mut fx = fixture(HostConfig::default());
        let err = fx
            .handle(Command::decode(0x02F9, 0x000F, 0xC000, 0x00, 0, 0x80))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DiskRange { .. }));
        assert!(fx.outbound.is_empty());
    }
}

//! Command framing and dispatch.
//!
//! The dispatcher waits for a `AF 05` header, reads the nine register bytes
//! that follow, hands the decoded command to the [`CommandHandler`] and
//! flushes whatever it queued. Protocol timeouts and de-syncs while framing
//! discard the inbound buffer and start over; every other error ends the
//! session.

use std::sync::Arc;

use crate::commands::{CommandHandler, Handled};
use crate::config::HostConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher};
use crate::protocol::{COMMAND_PAYLOAD_SIZE, Command, SYNC};
use crate::queue::{InboundQueue, OutboundQueue};
use crate::types::DiskImage;

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Command frames decoded.
    pub frames: u64,
    /// Times the inbound stream was thrown away to regain alignment.
    pub resyncs: u64,
    /// Inbound bytes thrown away while resynchronizing.
    pub discarded: u64,
    /// Verified block transfers completed.
    pub transfers: u64,
    /// Blocks sent more than once across all transfers.
    pub retransmissions: u64,
}

/// Result of one dispatcher step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A command was decoded and answered.
    Handled(Command, Handled),
    /// Framing failed and the inbound buffer was cleared.
    Resynced { discarded: usize },
}

/// Drives the command loop over a pair of queues.
#[derive(Debug)]
pub struct Dispatcher<D> {
    inbound: InboundQueue,
    outbound: OutboundQueue,
    handler: CommandHandler<D>,
    events: EventDispatcher,
    stats: SessionStats,
}

impl<D: DiskImage> Dispatcher<D> {
    /// Creates a dispatcher answering from `disk`.
    #[must_use]
    pub fn new(
        config: HostConfig,
        disk: Arc<D>,
        events: EventDispatcher,
        inbound: InboundQueue,
        outbound: OutboundQueue,
    ) -> Self {
        Self {
            inbound,
            outbound,
            handler: CommandHandler::new(config, disk, events.clone()),
            events,
            stats: SessionStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Gives access to the inbound queue, for injecting bytes directly.
    pub fn inbound_mut(&mut self) -> &mut InboundQueue {
        &mut self.inbound
    }

    /// Runs steps until an unrecoverable error.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session; [`Error::TransportLost`]
    /// when the link went away.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.step().await?;
        }
    }

    /// Receives, answers and flushes one command.
    ///
    /// # Errors
    ///
    /// Returns any error other than a framing timeout or de-sync.
    pub async fn step(&mut self) -> Result<Step> {
        let command = match self.read_command().await {
            Ok(command) => command,
            Err(err) if err.is_resync() => return Ok(self.resync(&err)),
            Err(err) => return Err(err),
        };

        self.stats.frames += 1;
        self.events.dispatch(Event::CommandReceived(command));

        let handled = match self
            .handler
            .handle(&command, &mut self.outbound, &mut self.inbound)
            .await
        {
            Ok(handled) => handled,
            Err(err) => {
                self.outbound.clear();
                self.events.diagnostic(format!("{command}: {err}"));
                return Err(err);
            }
        };

        if let Handled::Transferred(report) = handled {
            self.stats.transfers += 1;
            self.stats.retransmissions += u64::from(report.retransmissions);
        }

        self.outbound.flush().await?;
        Ok(Step::Handled(command, handled))
    }

    async fn read_command(&mut self) -> Result<Command> {
        // An idle MSX is not a timeout
        self.inbound.wait_for_data().await?;
        self.inbound.restart_timeout();

        self.inbound.wait_for_sequence(&SYNC).await?;
        self.inbound.wait_for_available(COMMAND_PAYLOAD_SIZE).await?;

        let bc = self.inbound.read_word();
        let de = self.inbound.read_word();
        let hl = self.inbound.read_word();
        let f = self.inbound.read_byte();
        let a = self.inbound.read_byte();
        let cmd = self.inbound.read_byte();
        Ok(Command::decode(bc, de, hl, f, a, cmd))
    }

    fn resync(&mut self, err: &Error) -> Step {
        let discarded = err.discarded() + self.inbound.clear();
        tracing::warn!("{}, resynchronizing", err);

        self.stats.resyncs += 1;
        self.stats.discarded += discarded as u64;
        self.events.dispatch(Event::Resynced {
            discarded,
            reason: err.to_string(),
        });
        Step::Resynced { discarded }
    }
}

//! Main [`NowindHost`] implementation.
//!
//! The host owns the disk image, configuration and event dispatcher. Each
//! session splits a transport stream, spawns the read and write pumps, and
//! runs a [`Dispatcher`] until the link goes away.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::HostConfig;
use crate::dispatcher::{Dispatcher, SessionStats};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, Subscription};
use crate::queue::{InboundQueue, OutboundQueue};
use crate::transport::{Transport, pump_reads, pump_writes};
use crate::types::{DiskImage, MemoryDiskImage};

/// Capacity of the chunk channels between the pumps and the queues.
const CHANNEL_CAPACITY: usize = 256;

/// Delay between attempts to open an absent interface.
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Host side of a Nowind interface.
pub struct NowindHost<D> {
    config: HostConfig,
    disk: Arc<D>,
    events: EventDispatcher,
}

impl NowindHost<MemoryDiskImage> {
    /// Creates a host serving a blank 720 KB image.
    #[must_use]
    pub fn blank(config: HostConfig) -> Self {
        Self::new(config, MemoryDiskImage::default())
    }
}

impl<D: DiskImage + 'static> NowindHost<D> {
    /// Creates a host serving `disk`.
    #[must_use]
    pub fn new(config: HostConfig, disk: D) -> Self {
        Self {
            config,
            disk: Arc::new(disk),
            events: EventDispatcher::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Returns the event dispatcher, for registering sinks.
    #[must_use]
    pub const fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Serves commands over `stream` until the link closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the session ended on anything other than a closed
    /// link, such as an unimplemented command or an out-of-range disk read.
    pub async fn serve<S>(&self, stream: S) -> Result<SessionStats>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (feed_tx, feed_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
        let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

        let read_task = tokio::spawn(async move {
            if let Err(e) = pump_reads(reader, feed_tx).await {
                tracing::debug!("read pump stopped: {}", e);
            }
        });
        let write_task = tokio::spawn(async move {
            if let Err(e) = pump_writes(writer, frame_rx).await {
                tracing::error!("write pump stopped: {}", e);
            }
        });

        let mut dispatcher = Dispatcher::new(
            self.config.clone(),
            Arc::clone(&self.disk),
            self.events.clone(),
            InboundQueue::with_timeout(feed_rx, self.config.protocol_timeout),
            OutboundQueue::new(frame_tx),
        );
        let result = dispatcher.run().await;
        let stats = dispatcher.stats();
        drop(dispatcher);

        read_task.abort();
        // Closing the frame channel lets the writer finish what is queued
        if let Err(e) = write_task.await {
            tracing::debug!("write pump task ended abnormally: {}", e);
        }

        match result {
            Ok(()) | Err(Error::TransportLost) => {
                tracing::info!(
                    "session ended: {} frames, {} transfers, {} resyncs",
                    stats.frames,
                    stats.transfers,
                    stats.resyncs
                );
                Ok(stats)
            }
            Err(e) => Err(e),
        }
    }

    /// Serves sessions forever, re-opening the transport after each one.
    pub async fn run<T: Transport>(&self, transport: &mut T) {
        loop {
            let stream = Self::wait_for_device(transport).await;
            self.events.dispatch(Event::Connected(transport.device_info()));

            if let Err(e) = self.serve(stream).await {
                tracing::error!("session aborted: {}", e);
                self.events.diagnostic(format!("session aborted: {e}"));
            }

            self.events.dispatch(Event::Disconnected);
        }
    }

    async fn wait_for_device<T: Transport>(transport: &mut T) -> T::Stream {
        let mut reported = false;
        loop {
            match transport.open().await {
                Ok(stream) => return stream,
                Err(e) => {
                    if !reported {
                        tracing::info!("waiting for nowind interface: {}", e);
                        reported = true;
                    }
                    tokio::time::sleep(DEVICE_POLL_INTERVAL).await;
                }
            }
        }
    }
}

impl<D> std::fmt::Debug for NowindHost<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NowindHost")
            .field("config", &self.config)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

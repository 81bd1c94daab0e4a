//! Transport layer for the Nowind link.
//!
//! A [`Transport`] opens a byte stream to the interface. The host splits the
//! stream and runs [`pump_reads`] and [`pump_writes`] as background tasks,
//! connecting it to the inbound and outbound queues.

pub mod serial;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::types::DeviceInfo;

/// Size of a single read from the link.
const READ_CHUNK_SIZE: usize = 1024;

/// Trait for transport implementations.
pub trait Transport: Send {
    /// Byte stream to the interface.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Opens the link, failing if no interface is present.
    fn open(&mut self) -> Pin<Box<dyn Future<Output = Result<Self::Stream>> + Send + '_>>;

    /// Describes the interface behind the last opened stream.
    fn device_info(&self) -> DeviceInfo;
}

/// Forwards received chunks into `feed` until the link closes.
///
/// Returning drops `feed`, which the inbound queue sees as a lost transport.
///
/// # Errors
///
/// Returns an error if reading fails or the link reports end of stream.
pub async fn pump_reads<R>(mut reader: R, feed: mpsc::Sender<Bytes>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("link closed");
                return Err(Error::TransportLost);
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("link read error: {}", e);
                return Err(Error::Io(e));
            }
        };

        tracing::trace!("received {} bytes", n);
        if feed.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
            tracing::debug!("inbound queue dropped");
            return Ok(());
        }
    }
}

/// Writes queued frames to the link until the sender side is dropped.
///
/// # Errors
///
/// Returns an error if writing fails.
pub async fn pump_writes<W>(mut writer: W, mut frames: mpsc::Receiver<Bytes>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        tracing::trace!("sending {} bytes: {}", frame.len(), hex::encode(&frame));
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    Ok(())
}

pub use serial::{SerialConfig, SerialTransport, list_ports};

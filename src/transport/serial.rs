//! Serial/USB transport implementation.
//!
//! Nowind V2 interfaces enumerate as FTDI USB serial devices. The port can be
//! named explicitly or found by USB vendor id.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio_serial::{ClearBuffer, SerialPortBuilderExt, SerialPortType, SerialStream};

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::{DetectedVersion, DeviceInfo};

/// Default baud rate. FTDI FIFO mode ignores it, but the driver wants one.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default delay between opening the port and serving commands.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(300);

/// USB vendor id of FTDI.
pub const FTDI_VENDOR_ID: u16 = 0x0403;

/// How long stale bytes are drained after opening.
const DRAIN_WINDOW: Duration = Duration::from_millis(200);

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3"). Empty to auto-detect.
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay after opening before stale bytes are drained.
    pub connection_delay: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
        }
    }

    /// Configuration that picks the first FTDI device found.
    #[must_use]
    pub fn auto_detect() -> Self {
        Self::new(String::new())
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }
}

/// Serial transport for a Nowind interface.
#[derive(Debug)]
pub struct SerialTransport {
    config: SerialConfig,
    device: DeviceInfo,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            device: DeviceInfo::default(),
        }
    }

    /// Creates a new serial transport for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    fn resolve_port(&self) -> Result<DeviceInfo> {
        if !self.config.port.is_empty() {
            return Ok(DeviceInfo {
                version: DetectedVersion::V2,
                serial: String::new(),
                description: self.config.port.clone(),
            });
        }

        list_ports()?.into_iter().next().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no nowind interface found",
            ))
        })
    }
}

impl Transport for SerialTransport {
    type Stream = SerialStream;

    fn open(&mut self) -> Pin<Box<dyn Future<Output = Result<Self::Stream>> + Send + '_>> {
        Box::pin(async move {
            let device = self.resolve_port()?;
            tracing::info!("opening serial port: {}", device.description);

            let mut stream = tokio_serial::new(&device.description, self.config.baud_rate)
                .open_native_async()
                .map_err(Error::Serial)?;

            if let Err(e) = tokio_serial::SerialPort::clear(&stream, ClearBuffer::All) {
                tracing::warn!("failed to purge port buffers: {}", e);
            }

            tokio::time::sleep(self.config.connection_delay).await;

            // Leftovers from a previous session would desync the first command
            let mut buf = [0u8; 1024];
            let mut total_drained = 0usize;
            let drain_deadline = tokio::time::Instant::now() + DRAIN_WINDOW;
            while tokio::time::Instant::now() < drain_deadline {
                match tokio::time::timeout(Duration::from_millis(20), stream.read(&mut buf)).await
                {
                    Ok(Ok(n)) if n > 0 => total_drained += n,
                    _ => tokio::time::sleep(Duration::from_millis(10)).await,
                }
            }
            if total_drained > 0 {
                tracing::debug!("drained {} stale bytes from buffer", total_drained);
            }

            tracing::info!("{} attached on {}", device.version, device.description);
            self.device = device;
            Ok(stream)
        })
    }

    fn device_info(&self) -> DeviceInfo {
        self.device.clone()
    }
}

/// Lists attached FTDI devices, which is how Nowind V2 interfaces appear.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<DeviceInfo>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) if usb.vid == FTDI_VENDOR_ID => Some(DeviceInfo {
                version: DetectedVersion::V2,
                serial: usb.serial_number.unwrap_or_default(),
                description: port.port_name,
            }),
            _ => None,
        })
        .collect())
}

//! Random-access disk image storage.

use std::path::Path;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Bytes per disk sector.
pub const SECTOR_SIZE: usize = 512;

/// Size of a blank image: a double-sided 720 KB floppy.
pub const DEFAULT_IMAGE_SIZE: usize = 720 * 1024;

/// Read-only view of a disk image.
pub trait DiskImage: Send + Sync {
    /// Total image size in bytes.
    fn len(&self) -> usize;

    /// Returns true for an image without sectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `len` bytes starting at `offset`.
    ///
    /// Fails with [`Error::DiskRange`] if the range is not fully inside the image.
    fn read(&self, offset: usize, len: usize) -> Result<Bytes>;
}

/// Disk image held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryDiskImage {
    data: Bytes,
}

impl MemoryDiskImage {
    /// Wraps raw image bytes.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Creates a zero-filled image.
    #[must_use]
    pub fn blank(size: usize) -> Self {
        Self::new(vec![0u8; size])
    }

    /// Loads a raw `.dsk` file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        tracing::info!("loaded disk image {} ({} bytes)", path.display(), data.len());
        if data.len() % SECTOR_SIZE != 0 {
            tracing::warn!(
                "image size {} is not a multiple of {} byte sectors",
                data.len(),
                SECTOR_SIZE
            );
        }
        Ok(Self::new(data))
    }
}

impl Default for MemoryDiskImage {
    fn default() -> Self {
        Self::blank(DEFAULT_IMAGE_SIZE)
    }
}

impl DiskImage for MemoryDiskImage {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: usize, len: usize) -> Result<Bytes> {
        let size = self.data.len();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(self.data.slice(offset..end)),
            _ => Err(Error::DiskRange { offset, len, size }),
        }
    }
}

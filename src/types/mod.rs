//! Data types shared across the host.
//!
//! - Interface and machine identification
//! - Disk image storage

pub mod device;
pub mod disk;

pub use device::{DetectedVersion, DeviceInfo, MsxVersion};
pub use disk::{DEFAULT_IMAGE_SIZE, DiskImage, MemoryDiskImage, SECTOR_SIZE};

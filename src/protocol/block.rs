//! Marker-bracketed data blocks.
//!
//! A block travels as `marker, payload..., marker`. The marker is a byte
//! value that does not occur in the payload, so the receiver can find the
//! end of the block and echo the marker back as proof of a complete copy.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Payload size of one fast-transfer block.
pub const BLOCK_SIZE: usize = 128;

/// Largest payload that still leaves an unused byte value for the marker.
pub const MAX_BLOCK_PAYLOAD: usize = 254;

/// A payload chunk together with its sentinel marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    payload: Bytes,
    marker: u8,
}

impl DataBlock {
    /// Wraps a payload, choosing the smallest byte value absent from it.
    pub fn new(payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_BLOCK_PAYLOAD {
            return Err(Error::BlockTooLarge {
                len: payload.len(),
                max: MAX_BLOCK_PAYLOAD,
            });
        }
        let marker = find_marker(&payload)?;
        Ok(Self { payload, marker })
    }

    #[must_use]
    pub const fn marker(&self) -> u8 {
        self.marker
    }

    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Finds the smallest byte value not used in `data`.
fn find_marker(data: &[u8]) -> Result<u8> {
    let mut occurring = [false; 256];
    for &byte in data {
        occurring[usize::from(byte)] = true;
    }
    occurring
        .iter()
        .position(|&used| !used)
        .map(|value| value as u8)
        .ok_or(Error::MarkerExhausted { len: data.len() })
}

/// Splits `data` into [`BLOCK_SIZE`] blocks in receiver write order.
///
/// The MSX copies fast-transfer blocks with a descending pointer, so the
/// data is reversed before chunking: the first block holds the last bytes
/// of `data`, each in reverse.
pub fn split_reversed(data: &[u8]) -> Result<Vec<DataBlock>> {
    let reversed: Vec<u8> = data.iter().rev().copied().collect();
    reversed
        .chunks(BLOCK_SIZE)
        .map(|chunk| DataBlock::new(Bytes::copy_from_slice(chunk)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_smallest_free_value() {
        let block = DataBlock::new(Bytes::from_static(&[0, 1, 2, 4])).unwrap();
        assert_eq!(block.marker(), 3);

        let block = DataBlock::new(Bytes::from_static(&[5, 6])).unwrap();
        assert_eq!(block.marker(), 0);
    }

    #[test]
    fn test_marker_never_in_payload() {
        // Every payload shape that crowds the low values
        for len in 0..=MAX_BLOCK_PAYLOAD {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let block = DataBlock::new(Bytes::from(payload.clone())).unwrap();
            assert!(!payload.contains(&block.marker()), "len {len}");
        }

        let mut dense: Vec<u8> = (0..=255u8).filter(|&v| v != 200 && v != 17).collect();
        dense.reverse();
        let block = DataBlock::new(Bytes::from(dense.clone())).unwrap();
        assert_eq!(block.marker(), 17);
        assert!(!dense.contains(&block.marker()));
    }

    #[test]
    fn test_block_too_large() {
        let payload = Bytes::from(vec![0u8; 255]);
        assert!(matches!(
            DataBlock::new(payload),
            Err(Error::BlockTooLarge { len: 255, max: 254 })
        ));
    }

    #[test]
    fn test_marker_exhausted() {
        let all: Vec<u8> = (0..=255u8).collect();
        assert!(matches!(
            find_marker(&all),
            Err(Error::MarkerExhausted { len: 256 })
        ));
    }

    #[test]
    fn test_split_block_count() {
        for (size, expected) in [(0, 0), (1, 1), (127, 1), (128, 1), (129, 2), (512, 4), (1000, 8)]
        {
            let data = vec![0xE5u8; size];
            assert_eq!(split_reversed(&data).unwrap().len(), expected, "size {size}");
        }
    }

    #[test]
    fn test_split_reverses_back_to_original() {
        let data: Vec<u8> = (0..700u32).map(|i| (i * 7 % 251) as u8).collect();
        let blocks = split_reversed(&data).unwrap();

        // Highest addresses first
        assert_eq!(blocks[0].payload()[0], data[data.len() - 1]);
        assert_eq!(blocks.last().unwrap().len(), 700 % BLOCK_SIZE);

        let mut joined: Vec<u8> = blocks
            .iter()
            .flat_map(|block| block.payload().iter().copied())
            .collect();
        joined.reverse();
        assert_eq!(joined, data);
    }
}

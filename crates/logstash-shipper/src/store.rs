// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded store of length-prefixed frames.
//!
//! Every accepted entry is written as one frame:
//!
//! ```text
//! +------------------+-------------------+
//! | length (4 BE)    | payload           |
//! +------------------+-------------------+
//! ```
//!
//! Frames are read back strictly in write order. The store never grows past its capacity:
//! an append that does not fit is refused before any byte is written, so the caller can
//! drain the store and try again.

use crate::errors::StoreFull;
use bytes::{Buf, Bytes};

/// Size in bytes of the length prefix in front of every payload.
pub const LENGTH_PREFIX_SIZE: usize = std::mem::size_of::<u32>();

/// Rounds a requested store size up to the capacity actually allocated.
#[must_use]
pub fn store_capacity(minimum_size: usize) -> usize {
    minimum_size.next_power_of_two()
}

#[derive(Debug)]
pub struct FrameStore {
    bytes: Vec<u8>,
    read: usize,
    capacity: usize,
}

impl FrameStore {
    #[must_use]
    pub fn new(minimum_size: usize) -> Self {
        let capacity = store_capacity(minimum_size);
        FrameStore {
            bytes: Vec::with_capacity(capacity),
            read: 0,
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn readable_bytes(&self) -> usize {
        self.bytes.len() - self.read
    }

    /// True when nothing has been written since the last drain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn fits(&self, payload_len: usize) -> bool {
        self.bytes.len() + LENGTH_PREFIX_SIZE + payload_len <= self.capacity
    }

    /// Writes `payload` as one frame, or leaves the store untouched if it does not fit.
    pub fn append(&mut self, payload: &[u8]) -> Result<(), StoreFull> {
        let frame_size = LENGTH_PREFIX_SIZE + payload.len();
        // Capacity never exceeds u32::MAX, so a fitting payload length always fits the prefix.
        let length = match u32::try_from(payload.len()) {
            Ok(length) if self.fits(payload.len()) => length,
            _ => {
                return Err(StoreFull {
                    frame_size,
                    available: self.capacity - self.bytes.len(),
                    capacity: self.capacity,
                })
            }
        };
        self.bytes.extend_from_slice(&length.to_be_bytes());
        self.bytes.extend_from_slice(payload);
        Ok(())
    }

    /// Reads the oldest unread frame, if any.
    pub fn read_frame(&mut self) -> Option<Bytes> {
        let unread = &self.bytes[self.read..];
        let (length, payload) = split_frame(unread)?;
        let frame = Bytes::copy_from_slice(payload);
        self.read += LENGTH_PREFIX_SIZE + length;
        if self.read == self.bytes.len() {
            self.reset();
        }
        Some(frame)
    }

    /// Copies every unread frame into a snapshot and empties the store.
    pub fn drain(&mut self) -> DrainSnapshot {
        let snapshot = DrainSnapshot {
            bytes: Bytes::copy_from_slice(&self.bytes[self.read..]),
        };
        self.reset();
        snapshot
    }

    fn reset(&mut self) {
        self.bytes.clear();
        self.read = 0;
    }
}

fn split_frame(bytes: &[u8]) -> Option<(usize, &[u8])> {
    let prefix = bytes.get(..LENGTH_PREFIX_SIZE)?;
    let length = u32::from_be_bytes(prefix.try_into().ok()?) as usize;
    let payload = bytes.get(LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + length)?;
    Some((length, payload))
}

/// Frames taken out of a [`FrameStore`] by one drain, detached from the store.
#[derive(Debug, Clone, Default)]
pub struct DrainSnapshot {
    bytes: Bytes,
}

impl DrainSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterates the payloads in write order. Payloads share the snapshot's allocation.
    #[must_use]
    pub fn frames(&self) -> Frames {
        Frames {
            remaining: self.bytes.clone(),
        }
    }
}

pub struct Frames {
    remaining: Bytes,
}

impl Iterator for Frames {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let (length, _) = split_frame(&self.remaining)?;
        self.remaining.advance(LENGTH_PREFIX_SIZE);
        Some(self.remaining.split_to(length))
    }
}

//! Single-slot mailbox holding the newest presentable image
//!
//! Publish and read are lock-free: the slot is one `AtomicU64` packing a
//! publish sequence number in the high word and the image id in the low
//! word. Publishing swaps the whole word and hands back the superseded id
//! so the caller can release it; the consumer's per-frame read is a plain
//! atomic load.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::image::ImageId;

/// No image published (id bits all ones, which no pool ever uses)
const EMPTY: u64 = u64::MAX;

fn pack(seq: u32, id: ImageId) -> u64 {
    debug_assert_ne!(id.raw(), u32::MAX);
    (seq as u64) << 32 | id.raw() as u64
}

fn unpack(word: u64) -> Option<ImageId> {
    if word == EMPTY {
        None
    } else {
        Some(ImageId::new(word as u32))
    }
}

pub struct Mailbox {
    slot: AtomicU64,
    seq: AtomicU32,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            slot: AtomicU64::new(EMPTY),
            seq: AtomicU32::new(0),
        }
    }

    /// Publish `id` as the newest image, returning the id it superseded
    ///
    /// The superseded image is no longer reachable by any reader and must
    /// be released by the caller.
    pub fn publish(&self, id: ImageId) -> Option<ImageId> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let previous = self.slot.swap(pack(seq, id), Ordering::AcqRel);
        unpack(previous)
    }

    /// Currently published image, without consuming it
    pub fn read(&self) -> Option<ImageId> {
        unpack(self.slot.load(Ordering::Acquire))
    }

    /// Empty the mailbox, returning the image that was pending
    pub fn take(&self) -> Option<ImageId> {
        unpack(self.slot.swap(EMPTY, Ordering::AcqRel))
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;

//! Presence bitmaps over the full IPv4 address space.
//!
//! One bit per address, packed into 64-bit words: bit `i` lives in word
//! `i / 64` at offset `i % 64`. The footprint is a constant 512 MiB no matter
//! how large the input is. The allocation is zeroed by the allocator, so pages
//! that are never written are never committed.

use rayon::prelude::*;
use std::alloc::{self, Layout};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of addressable bits (2^32).
pub const BIT_COUNT: u64 = 1 << 32;
/// Number of 64-bit words backing the bitmap (2^26, i.e. 512 MiB).
pub const WORD_COUNT: usize = (BIT_COUNT / 64) as usize;
/// Words summed per rayon task in `count`.
const COUNT_CHUNK: usize = 1 << 16;

#[inline]
pub(crate) fn word_and_mask(addr: u32) -> (usize, u64) {
    ((addr >> 6) as usize, 1u64 << (addr & 63))
}

/// Single-writer presence bitmap.
pub struct PresenceBitmap {
    words: Vec<u64>,
}

impl PresenceBitmap {
    /// Creates a bitmap with every bit clear.
    pub fn new() -> Self {
        Self {
            words: vec![0u64; WORD_COUNT],
        }
    }

    /// Marks `addr` as present. Idempotent.
    #[inline]
    pub fn set(&mut self, addr: u32) {
        let (word, mask) = word_and_mask(addr);
        self.words[word] |= mask;
    }

    /// Marks every address in `batch` as present.
    pub fn set_all(&mut self, batch: &[u32]) {
        for &addr in batch {
            self.set(addr);
        }
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        let (word, mask) = word_and_mask(addr);
        self.words[word] & mask != 0
    }

    /// Population count: the number of distinct addresses set so far.
    pub fn count(&self) -> u64 {
        self.words
            .par_chunks(COUNT_CHUNK)
            .map(|chunk| chunk.iter().map(|w| u64::from(w.count_ones())).sum::<u64>())
            .sum()
    }
}

impl Default for PresenceBitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// Presence bitmap that many threads may set concurrently.
///
/// Two writers can target different bits of the same word at the same time,
/// so every `set` is a word-level atomic OR. OR is commutative and
/// idempotent, so the final state does not depend on interleaving.
pub struct AtomicPresenceBitmap {
    words: Box<[AtomicU64]>,
}

impl AtomicPresenceBitmap {
    /// Creates a bitmap with every bit clear.
    ///
    /// # Panics
    ///
    /// Panics if the platform cannot describe a 512 MiB allocation, and aborts
    /// through the allocation error handler if the allocation itself fails.
    pub fn new() -> Self {
        let layout = Layout::array::<AtomicU64>(WORD_COUNT)
            .expect("bitmap size exceeds the platform address space");
        // SAFETY: the layout is non-zero sized, and an all-zero bit pattern is a
        // valid `AtomicU64`. The pointer comes from the global allocator with the
        // exact layout `Box<[AtomicU64]>` will free it with.
        let words = unsafe {
            let raw = alloc::alloc_zeroed(layout).cast::<AtomicU64>();
            if raw.is_null() {
                alloc::handle_alloc_error(layout);
            }
            Box::from_raw(ptr::slice_from_raw_parts_mut(raw, WORD_COUNT))
        };
        Self { words }
    }

    /// Marks `addr` as present. Idempotent; safe to call from many threads.
    #[inline]
    pub fn set(&self, addr: u32) {
        let (word, mask) = word_and_mask(addr);
        self.words[word].fetch_or(mask, Ordering::Relaxed);
    }

    pub fn set_all(&self, batch: &[u32]) {
        for &addr in batch {
            self.set(addr);
        }
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        let (word, mask) = word_and_mask(addr);
        self.words[word].load(Ordering::Relaxed) & mask != 0
    }

    /// Population count. Only meaningful once every writer has been joined;
    /// the join provides the happens-before edge for the relaxed loads.
    pub fn count(&self) -> u64 {
        self.words
            .par_chunks(COUNT_CHUNK)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|w| u64::from(w.load(Ordering::Relaxed).count_ones()))
                    .sum::<u64>()
            })
            .sum()
    }
}

impl Default for AtomicPresenceBitmap {
    fn default() -> Self {
        Self::new()
    }
}

//! File windows for the parallel scanner.
//!
//! The file is cut into fixed-size nominal ranges that tile `[0, file_size)`.
//! Each window is mapped with a few extra trailing bytes (the overlap) so a
//! line that starts inside the window but ends past its nominal edge is still
//! fully visible.
//!
//! Ownership rule: a window owns exactly the lines whose first byte lies in
//! `(start, nominal_end]`; window 0 also owns the line at offset 0. The first
//! physical line of every later window is therefore skipped (it belongs to
//! the previous window), and scanning stops after the line that contains the
//! nominal end. Every line has exactly one owner.

use crate::error::{CountError, Result};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;

/// A contiguous byte range of the input, plus trailing overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: u64,
    pub start: u64,
    /// Length of the non-overlap range.
    pub nominal_len: u64,
    /// Length actually mapped: nominal range plus overlap, clamped to EOF.
    pub mapped_len: u64,
    pub is_first: bool,
    /// The mapping reaches end of file.
    pub is_last: bool,
}

impl Window {
    pub fn nominal_end(&self) -> u64 {
        self.start + self.nominal_len
    }

    pub fn mapped_end(&self) -> u64 {
        self.start + self.mapped_len
    }
}

/// Splits a file of `file_size` bytes into windows.
#[derive(Debug, Clone, Copy)]
pub struct WindowPlan {
    file_size: u64,
    window_size: u64,
    overlap: u64,
}

impl WindowPlan {
    pub fn new(file_size: u64, window_size: u64, overlap: u64) -> Self {
        Self {
            file_size,
            window_size: window_size.max(1),
            overlap,
        }
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn overlap(&self) -> u64 {
        self.overlap
    }

    /// `ceil(file_size / window_size)`; zero for an empty file.
    pub fn num_windows(&self) -> u64 {
        self.file_size.div_ceil(self.window_size)
    }

    pub fn window(&self, index: u64) -> Window {
        self.window_with_overlap(index, self.overlap)
    }

    /// Same window with a different overlap. Used to widen a mapping whose
    /// last owned line runs past the default overlap.
    pub fn window_with_overlap(&self, index: u64, overlap: u64) -> Window {
        let start = index.saturating_mul(self.window_size).min(self.file_size);
        let nominal_end = start.saturating_add(self.window_size).min(self.file_size);
        let end = nominal_end.saturating_add(overlap).min(self.file_size);
        Window {
            index,
            start,
            nominal_len: nominal_end - start,
            mapped_len: end - start,
            is_first: index == 0,
            is_last: end == self.file_size,
        }
    }

    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        (0..self.num_windows()).map(|i| self.window(i))
    }
}

/// A window mapped read-only into memory. Unmapped on drop.
pub struct MappedWindow {
    window: Window,
    mmap: Mmap,
}

impl MappedWindow {
    /// Maps `window` out of `file`.
    pub fn map(file: &File, window: Window) -> Result<Self> {
        let map_err = |source| CountError::Map {
            window: window.index,
            start: window.start,
            end: window.mapped_end(),
            source,
        };
        let len = usize::try_from(window.mapped_len)
            .map_err(|_| CountError::InvalidConfig("window does not fit in the address space"))?;

        // SAFETY: the mapping is read-only and private to this worker. Another
        // process truncating the file while we scan is outside our contract,
        // as it is for every mmap-based reader.
        let mmap = unsafe { MmapOptions::new().offset(window.start).len(len).map(file) }
            .map_err(map_err)?;

        #[cfg(unix)]
        let _ = mmap.advise(memmap2::Advice::Sequential);

        Ok(Self { window, mmap })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Lines this window owns, or `None` when the mapping stops inside the
    /// last owned line and must be widened.
    pub fn owned_lines(&self) -> Option<Lines<'_>> {
        owned_lines(self.bytes(), &self.window)
    }
}

/// Applies the ownership rule to the mapped bytes of `window`.
///
/// Returns `None` when the last owned line is not terminated inside `bytes`
/// and `bytes` does not reach end of file.
pub fn owned_lines<'a>(bytes: &'a [u8], window: &Window) -> Option<Lines<'a>> {
    // Past the mapped bytes (or past `usize`) means the whole mapping is nominal.
    let nominal = usize::try_from(window.nominal_len).map_or(bytes.len(), |n| n.min(bytes.len()));

    let head = if window.is_first {
        0
    } else {
        match find_newline(bytes) {
            Some(i) => i + 1,
            // The whole mapping is the tail of a line owned by an earlier window.
            None => return Some(Lines::empty()),
        }
    };

    let tail = if nominal >= bytes.len() {
        bytes.len()
    } else {
        match find_newline(&bytes[nominal..]) {
            Some(i) => nominal + i + 1,
            None if window.is_last => bytes.len(),
            None => return None,
        }
    };

    if head >= tail {
        return Some(Lines::empty());
    }
    Some(Lines::new(&bytes[head..tail]))
}

#[inline]
fn find_newline(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == b'\n')
}

/// Iterator over `\n`-separated lines, terminators excluded. A trailing
/// terminator does not produce an extra empty line.
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Lines<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            rest: (!bytes.is_empty()).then_some(bytes),
        }
    }

    pub fn empty() -> Self {
        Self { rest: None }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match find_newline(rest) {
            Some(i) => {
                self.rest = (i + 1 < rest.len()).then(|| &rest[i + 1..]);
                Some(&rest[..i])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

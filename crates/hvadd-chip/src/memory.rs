// SPDX-License-Identifier: AGPL-3.0-only

//! Geometry of the peripheral's addressable memory window.
//!
//! The window is `2^mem_bits` bytes of 32-bit words. Addresses handed to the
//! peripheral are byte addresses; the low two bits are ignored, so element
//! `i` of a vector based at `addr` lives in word `(addr >> 2) + i`.
//!
//! The window is not mapped into the host address space. It is reached only
//! through the Read / Write / Add commands.

use std::ops::Range;

/// Size of one element in bytes.
pub const WORD_BYTES: u32 = 4;

/// Largest supported window (`2^30` bytes keeps every byte address in a u32).
pub const MAX_MEM_BITS: u32 = 30;

/// Smallest window that can hold one element.
pub const MIN_MEM_BITS: u32 = 2;

/// Addressable memory window of one peripheral instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryWindow {
    mem_bits: u32,
}

impl MemoryWindow {
    /// Window of `2^mem_bits` bytes, or `None` outside
    /// [`MIN_MEM_BITS`]`..=`[`MAX_MEM_BITS`].
    #[must_use]
    pub const fn new(mem_bits: u32) -> Option<Self> {
        if mem_bits < MIN_MEM_BITS || mem_bits > MAX_MEM_BITS {
            return None;
        }
        Some(Self { mem_bits })
    }

    /// Address width in bits.
    #[must_use]
    pub const fn mem_bits(&self) -> u32 {
        self.mem_bits
    }

    /// Capacity in bytes.
    #[must_use]
    pub const fn capacity_bytes(&self) -> u32 {
        1 << self.mem_bits
    }

    /// Capacity in 32-bit words.
    #[must_use]
    pub const fn capacity_words(&self) -> u32 {
        self.capacity_bytes() / WORD_BYTES
    }

    /// Word index addressed by a byte address.
    #[must_use]
    pub const fn word_index(addr: u32) -> u32 {
        addr / WORD_BYTES
    }

    /// Whether `words` consecutive elements starting at `addr` fit the window.
    #[must_use]
    pub const fn contains_words(&self, addr: u32, words: u32) -> bool {
        (Self::word_index(addr) as u64) + (words as u64) <= self.capacity_words() as u64
    }

    /// Whether a single element at `addr` fits the window.
    #[must_use]
    pub const fn contains(&self, addr: u32) -> bool {
        self.contains_words(addr, 1)
    }

    /// Spacing between the three timing vectors of the bring-up sweep:
    /// `2^mem_bits / 3 - 4` bytes, rounded down to a word boundary.
    ///
    /// The `- 4` and the division by three leave room for A, B and R side by
    /// side. The exact margin was never documented, so callers treat this as a
    /// default and may override it.
    #[must_use]
    pub const fn timing_span_bytes(&self) -> u32 {
        (self.capacity_bytes() / 3).saturating_sub(4) & !(WORD_BYTES - 1)
    }

    /// Power-of-two shifts of the bring-up sweep: `2 .. mem_bits - 3`.
    #[must_use]
    pub const fn timing_shifts(&self) -> Range<u32> {
        let end = self.mem_bits.saturating_sub(3);
        let start = if end < 2 { end } else { 2 };
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_window_geometry() {
        let w = MemoryWindow::new(14).unwrap();
        assert_eq!(w.capacity_bytes(), 16_384);
        assert_eq!(w.capacity_words(), 4_096);
        assert_eq!(w.timing_span_bytes(), 5_456);
        assert_eq!(w.timing_shifts(), 2..11);
    }

    #[test]
    fn range_check_is_word_based() {
        let w = MemoryWindow::new(4).unwrap(); // 4 words
        assert!(w.contains(0));
        assert!(w.contains(12));
        assert!(w.contains(15)); // low bits ignored -> word 3
        assert!(!w.contains(16));
        assert!(w.contains_words(0, 4));
        assert!(!w.contains_words(4, 4));
        assert!(w.contains_words(16, 0));
    }

    #[test]
    fn rejects_unsupported_widths() {
        assert!(MemoryWindow::new(1).is_none());
        assert!(MemoryWindow::new(31).is_none());
        assert!(MemoryWindow::new(MAX_MEM_BITS).is_some());
    }

    #[test]
    fn tiny_windows_have_empty_sweeps() {
        let w = MemoryWindow::new(4).unwrap();
        assert!(w.timing_shifts().is_empty());
    }
}

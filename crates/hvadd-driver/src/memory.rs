// SPDX-License-Identifier: AGPL-3.0-only

//! Vector fill and validation helpers
//!
//! Two kinds of memory hold test vectors:
//!
//! - Directly addressable word memory ([`WordMemory`]): the BRAM used by the
//!   software comparison path, either mapped ([`MmioRegion`](crate::mmio::MmioRegion))
//!   or heap-backed ([`SoftwareBram`]).
//! - The peripheral's own window, reached only through Read / Write
//!   ([`fill_device_vector`], [`write_random_operands`]).
//!
//! All addresses are byte offsets; element `i` sits at `addr + 4 * i`.

use crate::bus::RegisterBus;
use crate::device::VecAdder;
use crate::error::{HvaddError, Result};
use rand::Rng;

const WORD: usize = 4;

/// Word-addressable memory the host can load and store directly
pub trait WordMemory {
    /// Load the word at byte `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or out of bounds.
    fn read_u32(&self, offset: usize) -> Result<u32>;

    /// Store the word at byte `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or out of bounds.
    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()>;

    /// Size in bytes
    fn size(&self) -> usize;
}

/// Heap-backed stand-in for the BRAM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareBram {
    words: Vec<u32>,
}

impl SoftwareBram {
    /// Zeroed memory of `2^mem_bits` bytes
    pub fn new(mem_bits: u32) -> Self {
        Self::with_size(1usize << mem_bits)
    }

    /// Zeroed memory of `bytes` bytes (rounded down to whole words)
    pub fn with_size(bytes: usize) -> Self {
        Self {
            words: vec![0; bytes / WORD],
        }
    }

    fn index(&self, offset: usize) -> Result<usize> {
        if offset % WORD != 0 {
            return Err(HvaddError::Misaligned { offset });
        }
        let idx = offset / WORD;
        if idx >= self.words.len() {
            return Err(HvaddError::out_of_range(
                offset as u64,
                WORD as u64,
                self.size() as u64,
            ));
        }
        Ok(idx)
    }
}

impl WordMemory for SoftwareBram {
    fn read_u32(&self, offset: usize) -> Result<u32> {
        Ok(self.words[self.index(offset)?])
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let idx = self.index(offset)?;
        self.words[idx] = value;
        Ok(())
    }

    fn size(&self) -> usize {
        self.words.len() * WORD
    }
}

/// Store `src` at `addr`, one element per word
///
/// # Errors
///
/// Returns error if any element falls outside the memory.
#[allow(clippy::cast_sign_loss)]
pub fn fill_vector<M: WordMemory + ?Sized>(mem: &mut M, addr: usize, src: &[i32]) -> Result<()> {
    for (i, &v) in src.iter().enumerate() {
        mem.write_u32(addr + i * WORD, v as u32)?;
    }
    Ok(())
}

/// Load `len` elements starting at `addr`
///
/// # Errors
///
/// Returns error if any element falls outside the memory.
#[allow(clippy::cast_possible_wrap)]
pub fn read_vector<M: WordMemory + ?Sized>(mem: &M, addr: usize, len: usize) -> Result<Vec<i32>> {
    (0..len)
        .map(|i| mem.read_u32(addr + i * WORD).map(|v| v as i32))
        .collect()
}

/// Compare memory at `addr` against `reference`, returning the mismatch count
///
/// # Errors
///
/// Returns error if any element falls outside the memory.
pub fn validate_results<M: WordMemory + ?Sized>(mem: &M, addr: usize, reference: &[i32]) -> Result<usize> {
    let actual = read_vector(mem, addr, reference.len())?;
    let errors = crate::reference::count_mismatches(&actual, reference);
    if errors > 0 {
        tracing::warn!("{errors}/{} elements differ at {addr:#x}", reference.len());
    }
    Ok(errors)
}

/// CPU add over memory: `c[i] = a[i] + b[i]` for `len` elements
///
/// This is the software path the peripheral is compared against: the same
/// work done by the processor through the BRAM controller.
///
/// # Errors
///
/// Returns error if any element falls outside the memory.
pub fn add_vectors<M: WordMemory + ?Sized>(
    mem: &mut M,
    addr_a: usize,
    addr_b: usize,
    addr_c: usize,
    len: usize,
) -> Result<()> {
    for i in 0..len {
        let sum = mem
            .read_u32(addr_a + i * WORD)?
            .wrapping_add(mem.read_u32(addr_b + i * WORD)?);
        mem.write_u32(addr_c + i * WORD, sum)?;
    }
    Ok(())
}

/// Overwrite the whole memory with random words
///
/// # Errors
///
/// Returns error on bus failure.
pub fn fill_random<M: WordMemory + ?Sized, R: Rng + ?Sized>(mem: &mut M, rng: &mut R) -> Result<()> {
    for offset in (0..mem.size()).step_by(WORD) {
        mem.write_u32(offset, rng.gen())?;
    }
    Ok(())
}

/// Push `src` into the peripheral window at `addr` through Write commands
///
/// # Errors
///
/// Returns error if the range leaves the window or a command fails.
pub fn fill_device_vector<B: RegisterBus>(dev: &mut VecAdder<B>, addr: u32, src: &[i32]) -> Result<()> {
    for (i, &v) in (0u32..).zip(src) {
        dev.write(addr + i * 4, v)?;
    }
    Ok(())
}

/// Pull `len` elements from the peripheral window through Read commands
///
/// # Errors
///
/// Returns error if the range leaves the window or a command fails.
pub fn read_device_vector<B: RegisterBus>(dev: &mut VecAdder<B>, addr: u32, len: u32) -> Result<Vec<i32>> {
    (0..len).map(|i| dev.read(addr + i * 4)).collect()
}

/// Generate two random operand vectors and write them to the peripheral
///
/// Values are drawn from `-range/2 .. range/2`. A and B elements are written
/// interleaved, index by index. Returns the host copies for the reference.
///
/// # Errors
///
/// Returns error if either range leaves the window or a command fails.
pub fn write_random_operands<B: RegisterBus, R: Rng + ?Sized>(
    dev: &mut VecAdder<B>,
    addr_a: u32,
    addr_b: u32,
    elements: u32,
    range: i32,
    rng: &mut R,
) -> Result<(Vec<i32>, Vec<i32>)> {
    let half = range / 2;
    let mut a = Vec::with_capacity(elements as usize);
    let mut b = Vec::with_capacity(elements as usize);

    for i in 0..elements {
        let va = rng.gen_range(-half..range - half);
        dev.write(addr_a + i * 4, va)?;
        a.push(va);

        let vb = rng.gen_range(-half..range - half);
        dev.write(addr_b + i * 4, vb)?;
        b.push(vb);
    }

    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareAdder;
    use crate::reference::compute_reference;
    use hvadd_chip::MemoryWindow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pl_ram_software_add_matches_reference() {
        let mut bram = SoftwareBram::new(12);
        let a = [0, 1, 2, 3, 4, 5, 6, 7];
        let b = [7, 6, 5, 4, 3, 2, 1, 0];
        let (addr_a, addr_b, addr_c) = (0, 2 * 8 * 4, 4 * 8 * 4);

        fill_vector(&mut bram, addr_a, &a).unwrap();
        fill_vector(&mut bram, addr_b, &b).unwrap();
        add_vectors(&mut bram, addr_a, addr_b, addr_c, a.len()).unwrap();

        let reference = compute_reference(&a, &b);
        assert_eq!(validate_results(&bram, addr_c, &reference).unwrap(), 0);
        assert_eq!(read_vector(&bram, addr_c, 8).unwrap(), vec![7; 8]);
    }

    #[test]
    fn validation_counts_corrupted_words() {
        let mut bram = SoftwareBram::with_size(64);
        fill_vector(&mut bram, 0, &[1, 2, 3, 4]).unwrap();
        bram.write_u32(4, 99).unwrap();
        bram.write_u32(12, 98).unwrap();
        assert_eq!(validate_results(&bram, 0, &[1, 2, 3, 4]).unwrap(), 2);
    }

    #[test]
    fn bram_rejects_bad_offsets() {
        let mut bram = SoftwareBram::with_size(16);
        assert!(matches!(bram.read_u32(2), Err(HvaddError::Misaligned { offset: 2 })));
        assert!(bram.write_u32(16, 0).is_err());
        assert!(fill_vector(&mut bram, 8, &[1, 2, 3]).is_err());
    }

    #[test]
    fn random_fill_covers_whole_memory() {
        let mut bram = SoftwareBram::with_size(1024);
        let mut rng = StdRng::seed_from_u64(7);
        fill_random(&mut bram, &mut rng).unwrap();
        let words = read_vector(&bram, 0, 256).unwrap();
        assert!(words.iter().filter(|&&w| w != 0).count() > 250);
    }

    #[test]
    fn random_operands_stay_in_range_and_reach_device() {
        let window = MemoryWindow::new(12).unwrap();
        let mut dev = VecAdder::new(SoftwareAdder::new(window), window);
        let mut rng = StdRng::seed_from_u64(1);

        let (a, b) = write_random_operands(&mut dev, 0, 200, 16, 128, &mut rng).unwrap();
        assert_eq!(a.len(), 16);
        assert!(a.iter().chain(&b).all(|v| (-64..64).contains(v)));
        assert_eq!(read_device_vector(&mut dev, 0, 16).unwrap(), a);
        assert_eq!(read_device_vector(&mut dev, 200, 16).unwrap(), b);
    }

    #[test]
    fn device_fill_round_trips() {
        let window = MemoryWindow::new(10).unwrap();
        let mut dev = VecAdder::new(SoftwareAdder::new(window), window);
        fill_device_vector(&mut dev, 64, &[-1, i32::MAX, i32::MIN]).unwrap();
        assert_eq!(
            read_device_vector(&mut dev, 64, 3).unwrap(),
            vec![-1, i32::MAX, i32::MIN]
        );
    }
}

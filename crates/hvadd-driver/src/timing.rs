// SPDX-License-Identifier: AGPL-3.0-only

//! Latency sweeps
//!
//! Three sweeps compare the peripheral against the processor doing the same
//! work:
//!
//! | Sweep | Work timed | Sizes |
//! |-------|------------|-------|
//! | [`hardware_sweep`] | one `add` command incl. polling | `2^min_shift ..= 2^max_shift` |
//! | [`memory_sweep`] | CPU add over BRAM words | `4 ..` half the size, where the three vectors fit |
//! | [`host_sweep`] | CPU add over heap vectors | `4 ..= elements`, doubling |
//!
//! Ticks come from a [`CycleCounter`]; the board's global timer runs at
//! half the CPU clock, the host clock counts nanoseconds.

use crate::bus::RegisterBus;
use crate::device::VecAdder;
use crate::error::{HvaddError, Result};
use crate::memory::{add_vectors, WordMemory};
use hvadd_chip::{MemoryWindow, WORD_BYTES};
use rand::Rng;
use std::hint::black_box;
use std::time::Instant;

/// Free-running tick source
pub trait CycleCounter {
    /// Current tick count
    fn ticks(&self) -> u64;

    /// Tick rate
    fn ticks_per_second(&self) -> u64;

    /// Convert a tick delta to nanoseconds
    #[allow(clippy::cast_possible_truncation)]
    fn ticks_to_ns(&self, ticks: u64) -> u64 {
        (u128::from(ticks) * 1_000_000_000 / u128::from(self.ticks_per_second().max(1))) as u64
    }
}

/// Monotonic host clock, one tick per nanosecond
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    /// Clock starting at zero now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCounter for HostClock {
    #[allow(clippy::cast_possible_truncation)]
    fn ticks(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn ticks_per_second(&self) -> u64 {
        1_000_000_000
    }
}

/// One timed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    /// Element pairs added
    pub elements: u32,
    /// Wall time
    pub elapsed_ns: u64,
}

impl std::fmt::Display for TimingSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "add\t{} pairs took\t{} ns", self.elements, self.elapsed_ns)
    }
}

/// Sizes and layout for [`hardware_sweep`]
///
/// Vectors sit at `0`, `span_bytes` and `2 * span_bytes`. Sizes that do not
/// fit in `span_bytes` are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPlan {
    /// Smallest size, `2^min_shift` elements
    pub min_shift: u32,
    /// Largest size, `2^max_shift` elements
    pub max_shift: u32,
    /// Byte spacing between A, B and R
    pub span_bytes: u32,
}

impl TimingPlan {
    /// Bring-up layout: a third of the window per vector, sizes
    /// from 4 elements up to `2^(mem_bits - 4)`
    pub fn for_window(window: MemoryWindow) -> Self {
        let shifts = window.timing_shifts();
        Self {
            min_shift: shifts.start,
            max_shift: shifts.end.saturating_sub(1).max(shifts.start),
            span_bytes: window.timing_span_bytes(),
        }
    }

    /// Vector base addresses (A, B, R)
    pub const fn bases(&self) -> [u32; 3] {
        [0, self.span_bytes, self.span_bytes.saturating_mul(2)]
    }

    /// Sizes to time, in elements, smallest first
    pub fn element_counts(&self) -> Vec<u32> {
        (self.min_shift..=self.max_shift.min(31))
            .map(|s| 1u32 << s)
            .filter(|&n| u64::from(n) * u64::from(WORD_BYTES) <= u64::from(self.span_bytes))
            .collect()
    }

    /// Check the layout against the window
    ///
    /// # Errors
    ///
    /// Returns [`HvaddError::InvalidConfig`] if the shifts are inverted, the
    /// span is misaligned, or the three vectors overrun the window.
    pub fn validate(&self, window: MemoryWindow) -> Result<()> {
        if self.min_shift > self.max_shift {
            return Err(HvaddError::invalid_config(format!(
                "timing shifts inverted: {} > {}",
                self.min_shift, self.max_shift
            )));
        }
        if self.max_shift >= 31 {
            return Err(HvaddError::invalid_config(format!(
                "timing.max_shift = {} (must be below 31)",
                self.max_shift
            )));
        }
        if self.span_bytes % WORD_BYTES != 0 {
            return Err(HvaddError::invalid_config(format!(
                "timing.span_bytes = {} is not word aligned",
                self.span_bytes
            )));
        }
        if u64::from(self.span_bytes) * 3 > u64::from(window.capacity_bytes()) {
            return Err(HvaddError::invalid_config(format!(
                "timing vectors need {} bytes, window is {}",
                u64::from(self.span_bytes) * 3,
                window.capacity_bytes()
            )));
        }
        Ok(())
    }
}

/// Time one `add` per plan size on the peripheral
///
/// Operands are whatever the window holds; only latency is measured.
///
/// # Errors
///
/// Returns error if the plan does not fit the window or a command fails.
pub fn hardware_sweep<B: RegisterBus, C: CycleCounter + ?Sized>(
    dev: &mut VecAdder<B>,
    plan: &TimingPlan,
    clock: &C,
) -> Result<Vec<TimingSample>> {
    plan.validate(dev.window())?;
    let [a, b, r] = plan.bases();

    let mut samples = Vec::new();
    for elements in plan.element_counts() {
        let start = clock.ticks();
        dev.add_elements(a, b, r, elements)?;
        let end = clock.ticks();

        let sample = TimingSample {
            elements,
            elapsed_ns: clock.ticks_to_ns(end.saturating_sub(start)),
        };
        tracing::debug!("hardware {sample}");
        samples.push(sample);
    }
    Ok(samples)
}

/// Time a CPU add over directly mapped memory
///
/// For `n = 4, 8, ...` below half the memory size, vectors sit at word offsets
/// `0`, `n + 1` and `2 * (n + 1)`. Sizes whose three vectors overrun the
/// memory are skipped. Prime the memory first (see
/// [`fill_random`](crate::memory::fill_random)) so ECC-protected BRAM does
/// not fault on uninitialised words.
///
/// # Errors
///
/// Returns error on bus failure.
pub fn memory_sweep<M: WordMemory + ?Sized, C: CycleCounter + ?Sized>(
    mem: &mut M,
    clock: &C,
) -> Result<Vec<TimingSample>> {
    let word = WORD_BYTES as usize;
    let words = mem.size() / word;

    let mut samples = Vec::new();
    for shift in 2..usize::BITS {
        let n = 1usize << shift;
        if n * 2 >= mem.size() {
            break;
        }
        let stride = n + 1;
        if 3 * stride > words {
            tracing::debug!("memory sweep: {n} elements do not fit {} bytes, skipped", mem.size());
            continue;
        }

        let start = clock.ticks();
        add_vectors(mem, 0, stride * word, 2 * stride * word, n)?;
        let end = clock.ticks();

        #[allow(clippy::cast_possible_truncation)]
        let sample = TimingSample {
            elements: n as u32,
            elapsed_ns: clock.ticks_to_ns(end.saturating_sub(start)),
        };
        tracing::debug!("memory {sample}");
        samples.push(sample);
    }
    Ok(samples)
}

/// Time a CPU add over host heap vectors of random values
///
/// Lengths double from 4 up to `elements`.
pub fn host_sweep<C: CycleCounter + ?Sized, R: Rng + ?Sized>(
    elements: usize,
    clock: &C,
    rng: &mut R,
) -> Vec<TimingSample> {
    let a: Vec<i32> = (0..elements).map(|_| rng.gen()).collect();
    let b: Vec<i32> = (0..elements).map(|_| rng.gen()).collect();
    let mut c = vec![0i32; elements];

    let mut samples = Vec::new();
    let mut len = 4;
    while len <= elements {
        let start = clock.ticks();
        for ((c, a), b) in c[..len].iter_mut().zip(&a[..len]).zip(&b[..len]) {
            *c = black_box(*a).wrapping_add(black_box(*b));
        }
        black_box(&c);
        let end = clock.ticks();

        #[allow(clippy::cast_possible_truncation)]
        let sample = TimingSample {
            elements: len as u32,
            elapsed_ns: clock.ticks_to_ns(end.saturating_sub(start)),
        };
        samples.push(sample);
        len *= 2;
    }
    samples
}

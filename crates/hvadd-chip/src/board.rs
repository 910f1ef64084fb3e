// SPDX-License-Identifier: AGPL-3.0-only

//! Reference board constants (Zynq-7000 class PS + PL).
//!
//! ```text
//! Region          Address        Size     Reached through
//! ─────────────── ────────────── ──────── ───────────────────────────────
//! hvadd regs      0x43c0_0000    36 B     M_AXI_GP0, AXI-Lite
//! hvadd memory    (internal)     16 KB    Read / Write / Add commands
//! BRAM            0x4000_0000    4 KB     M_AXI_GP0, axi_bram_ctrl
//! ```
//!
//! Addresses are what the block design assigns by default and differ per
//! bitstream. Runtime code takes them from configuration; these values only
//! seed the defaults.

/// Peripheral register window base.
pub const ADDER_BASE_ADDR: u64 = 0x43C0_0000;

/// Address width of the peripheral memory window (16 KB).
pub const ADDER_MEM_BITS: u32 = 14;

/// BRAM controller base.
pub const BRAM_BASE_ADDR: u64 = 0x4000_0000;

/// Address width of the BRAM used by the software path (4 KB).
pub const BRAM_MEM_BITS: u32 = 12;

/// CPU core clock.
pub const CPU_CLOCK_HZ: u64 = 666_666_687;

/// The ARM global timer counts at half the CPU clock.
pub const GLOBAL_TIMER_HZ: u64 = CPU_CLOCK_HZ / 2;

/// Elements per vector in the host-memory software sweep.
pub const HOST_SWEEP_ELEMENTS: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryWindow;

    #[test]
    fn defaults_describe_valid_windows() {
        assert!(MemoryWindow::new(ADDER_MEM_BITS).is_some());
        assert!(MemoryWindow::new(BRAM_MEM_BITS).is_some());
    }

    #[test]
    fn bases_are_page_aligned() {
        assert_eq!(ADDER_BASE_ADDR % 4096, 0);
        assert_eq!(BRAM_BASE_ADDR % 4096, 0);
    }
}

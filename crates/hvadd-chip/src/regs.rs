// SPDX-License-Identifier: AGPL-3.0-only

//! AXI-Lite register map of the vector adder.
//!
//! Every register is 32 bits wide and sits at a word-aligned offset from the
//! peripheral base address. There is no caching or batching on this bus:
//! each access is a single aligned load or store.
//!
//! ```text
//! 0x00  command      W   operation select (see `Command`)
//! 0x04  address      W   target address for Read / Write
//! 0x08  status       R   0 = busy, 1 = done
//! 0x0c  data-read    R   result of the last Read
//! 0x10  data-write   W   operand of a Write
//! 0x14  vec-a base   W   operand A base for Add
//! 0x18  vec-b base   W   operand B base for Add
//! 0x1c  vec-r base   W   result base for Add
//! 0x20  length       W   Add length in bytes
//! ```
//!
//! Write-only registers still read back the last value written, which is
//! what the bus sanity check relies on.

// ── Offsets ──────────────────────────────────────────────────────────────────

/// Command register.
pub const COMMAND: usize = 0x00;
/// Address register for Read / Write.
pub const ADDRESS: usize = 0x04;
/// Completion status register.
pub const STATUS: usize = 0x08;
/// Data returned by a Read.
pub const DATA_READ: usize = 0x0C;
/// Operand of a Write.
pub const DATA_WRITE: usize = 0x10;
/// Base address of vector A.
pub const VEC_A_ADDR: usize = 0x14;
/// Base address of vector B.
pub const VEC_B_ADDR: usize = 0x18;
/// Base address of the result vector.
pub const VEC_R_ADDR: usize = 0x1C;
/// Add length, in bytes.
pub const VEC_LEN: usize = 0x20;

/// Stride between consecutive registers.
pub const REGISTER_STRIDE: usize = 4;
/// Number of registers in the window.
pub const REGISTER_COUNT: usize = 9;
/// Size of the register window in bytes.
pub const WINDOW_SIZE: usize = REGISTER_COUNT * REGISTER_STRIDE;

// ── Status register values ───────────────────────────────────────────────────

/// Values of the status register.
pub mod status {
    /// Command still executing.
    pub const BUSY: u32 = 0;
    /// Last command finished.
    pub const DONE: u32 = 1;
}

/// Typed view of one register in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Command select.
    Command,
    /// Read / Write target address.
    Address,
    /// Completion status.
    Status,
    /// Read result.
    DataRead,
    /// Write operand.
    DataWrite,
    /// Vector A base.
    VecA,
    /// Vector B base.
    VecB,
    /// Result vector base.
    VecR,
    /// Add length in bytes.
    Length,
}

impl Register {
    /// All registers in offset order.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::Command,
        Self::Address,
        Self::Status,
        Self::DataRead,
        Self::DataWrite,
        Self::VecA,
        Self::VecB,
        Self::VecR,
        Self::Length,
    ];

    /// Byte offset from the peripheral base address.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::Command => COMMAND,
            Self::Address => ADDRESS,
            Self::Status => STATUS,
            Self::DataRead => DATA_READ,
            Self::DataWrite => DATA_WRITE,
            Self::VecA => VEC_A_ADDR,
            Self::VecB => VEC_B_ADDR,
            Self::VecR => VEC_R_ADDR,
            Self::Length => VEC_LEN,
        }
    }

    /// Register at `offset`, if the offset names one.
    #[must_use]
    pub const fn from_offset(offset: usize) -> Option<Self> {
        if offset % REGISTER_STRIDE != 0 || offset >= WINDOW_SIZE {
            return None;
        }
        Some(Self::ALL[offset / REGISTER_STRIDE])
    }

    /// Short lowercase name, as used in register dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Address => "address",
            Self::Status => "status",
            Self::DataRead => "data-read",
            Self::DataWrite => "data-write",
            Self::VecA => "vec-a",
            Self::VecB => "vec-b",
            Self::VecR => "vec-r",
            Self::Length => "length",
        }
    }

    /// Whether the peripheral drives this register (writes from the bus are ignored).
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Status | Self::DataRead)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {:#04x}", self.name(), self.offset())
    }
}

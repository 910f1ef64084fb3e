// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the hardware vector adder (`hvadd`) peripheral.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the programmable-logic block as seen from the processing
//! system: the AXI-Lite register map, the command codes, the geometry of the
//! peripheral's addressable memory window and the typical board addresses.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | AXI-Lite register map: nine 32-bit registers, 4-byte stride |
//! | [`command`] | Command register codes (`Wait`, `Read`, `Write`, `Add`) |
//! | [`memory`] | Addressable memory window: capacity, word indexing, range checks |
//! | [`board`] | Typical base addresses and clock constants of the reference board |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod board;
pub mod command;
pub mod memory;
pub mod regs;

pub use command::Command;
pub use memory::{MemoryWindow, WORD_BYTES};
pub use regs::Register;

// SPDX-License-Identifier: AGPL-3.0-only

//! Register bus implementations that are not plain MMIO
//!
//! - **Software**: simulated adder for CI and protocol checks

pub mod software;

pub use software::{Fault, SoftwareAdder};

// SPDX-License-Identifier: AGPL-3.0-only

//! Userspace driver and bring-up harness for the hardware vector adder.
//!
//! The adder is an AXI-Lite peripheral with nine 32-bit registers and a
//! private word memory. One command register multiplexes Read, Write and Add;
//! the host polls a status register for completion.
//!
//! # Bus hierarchy
//!
//! ```text
//! Board:
//!   MmioRegion     : /dev/mem mapping of the register window
//!
//! CI / development:
//!   SoftwareAdder  : register-accurate model with latency and fault injection
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use hvadd_driver::{open_bus, BusSelection, HarnessConfig, TestSuite, VecAdder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarnessConfig::discover(None)?;
//! let bus = open_bus(BusSelection::Auto, &config.adder)?;
//! let mut dev = VecAdder::new(bus, config.adder.window()?)
//!     .with_poll_policy(config.poll.poll_policy());
//!
//! dev.write(2, 16)?;
//! dev.write(4, 32)?;
//! dev.add(2, 4, 8, 4)?;
//! assert_eq!(dev.read(8)?, 48);
//!
//! let report = TestSuite::standard(&config.random).run(&mut dev);
//! print!("{report}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod bus;
pub mod config;
mod device;
mod error;
pub mod harness;
pub mod memory;
pub mod mmio;
mod poll;
pub mod reference;
pub mod timing;

pub use backends::{Fault, SoftwareAdder};
pub use bus::{open_bus, BusSelection, BusType, RegisterBus};
pub use config::{AdderConfig, BramConfig, HarnessConfig, PollConfig, RandomConfig, TimingConfig};
pub use device::{DeviceStats, ProtocolState, VecAdder};
pub use error::{HvaddError, Result};
pub use harness::{CaseOutcome, CaseReport, SuiteReport, TestCase, TestSuite};
pub use memory::{SoftwareBram, WordMemory};
pub use mmio::MmioRegion;
pub use poll::PollPolicy;
pub use reference::{compute_reference, count_mismatches};
pub use timing::{CycleCounter, HostClock, TimingPlan, TimingSample};

/// Register map and board constants (re-exported from hvadd-chip).
pub mod chip {
    pub use hvadd_chip::{board, regs, Command, MemoryWindow, Register, WORD_BYTES};
}

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        open_bus, BusSelection, HarnessConfig, HvaddError, PollPolicy, RegisterBus, Result,
        SoftwareAdder, SuiteReport, TestSuite, VecAdder,
    };
}

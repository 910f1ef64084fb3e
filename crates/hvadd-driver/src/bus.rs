// SPDX-License-Identifier: AGPL-3.0-only

//! Register bus abstraction
//!
//! The driver talks to the peripheral only through 32-bit register loads and
//! stores. `RegisterBus` is that seam: the physical AXI-Lite window
//! ([`MmioRegion`]) and the software model ([`SoftwareAdder`]) both
//! implement it, so the same protocol code runs on the board and in CI.

use crate::backends::SoftwareAdder;
use crate::config::AdderConfig;
use crate::error::Result;
use crate::mmio::MmioRegion;
use hvadd_chip::regs;
use std::fmt::Debug;

/// 32-bit register window of one peripheral
///
/// Reads take `&mut self`: a status read is an observable bus transaction,
/// and the software model advances its state machine on it.
pub trait RegisterBus: Debug + Send {
    /// Load the register at byte `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or outside the window.
    fn read32(&mut self, offset: usize) -> Result<u32>;

    /// Store `value` into the register at byte `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or outside the window.
    fn write32(&mut self, offset: usize, value: u32) -> Result<()>;

    /// Bus type for logging
    fn bus_type(&self) -> BusType;
}

impl<T: RegisterBus + ?Sized> RegisterBus for Box<T> {
    fn read32(&mut self, offset: usize) -> Result<u32> {
        (**self).read32(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        (**self).write32(offset, value)
    }

    fn bus_type(&self) -> BusType {
        (**self).bus_type()
    }
}

/// Bus type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// Physical AXI-Lite window mapped through a device node
    Mmio,

    /// Software model of the peripheral, no hardware required
    Software,
}

impl std::fmt::Display for BusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmio => write!(f, "MMIO"),
            Self::Software => write!(f, "Software (simulated adder)"),
        }
    }
}

/// Bus selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSelection {
    /// Map the hardware if its device node exists, otherwise simulate
    Auto,

    /// Force the physical window
    Mmio,

    /// Force the software model
    Software,
}

/// Open the register bus described by `config`
///
/// # Errors
///
/// Returns error if the physical window is requested and cannot be mapped.
pub fn open_bus(selection: BusSelection, config: &AdderConfig) -> Result<Box<dyn RegisterBus>> {
    let software = || -> Result<Box<dyn RegisterBus>> {
        Ok(Box::new(SoftwareAdder::new(config.window()?)))
    };

    match selection {
        BusSelection::Auto => {
            if config.device_path.exists() {
                if let Ok(region) = map_adder(config) {
                    tracing::info!("Using MMIO bus at {:#x}", config.base_addr);
                    return Ok(Box::new(region));
                }
            }
            tracing::warn!(
                "{} unavailable, falling back to simulated adder",
                config.device_path.display()
            );
            software()
        }

        BusSelection::Mmio => map_adder(config).map(|r| Box::new(r) as Box<dyn RegisterBus>),

        BusSelection::Software => software(),
    }
}

fn map_adder(config: &AdderConfig) -> Result<MmioRegion> {
    MmioRegion::map(&config.device_path, config.base_addr, regs::WINDOW_SIZE, "hvadd registers")
}

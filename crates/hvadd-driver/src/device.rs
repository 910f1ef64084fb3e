// SPDX-License-Identifier: AGPL-3.0-only

//! Vector adder device handle and command protocol
//!
//! One shared command register multiplexes Read, Write and Add onto a single
//! request/response cycle:
//!
//! ```text
//!   Idle ──issue──▶ Issued ──poll──▶ Busy ──status=1──▶ Done ──Wait──▶ Idle
//! ```
//!
//! Every operation ends by writing `Wait` back to the command register. The
//! fabric only starts a command on the edge out of `Wait`, so skipping the
//! reset would leave the next command ignored; it also stops a re-polled
//! status from re-triggering the same command.
//!
//! The handle owns its bus and every operation takes `&mut self`, so at most
//! one command is ever in flight.

use crate::bus::RegisterBus;
use crate::error::{HvaddError, Result};
use crate::poll::PollPolicy;
use hvadd_chip::regs::{self, Register};
use hvadd_chip::{Command, MemoryWindow, WORD_BYTES};
use tracing::{debug, trace, warn};

/// Where the command handshake currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Command register holds `Wait`
    Idle,
    /// Operands and command written, no status read yet
    Issued(Command),
    /// Status read at least once, not yet done
    Busy(Command),
    /// Status reported done, result not yet consumed
    Done(Command),
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Issued(c) => write!(f, "{c} issued"),
            Self::Busy(c) => write!(f, "{c} busy"),
            Self::Done(c) => write!(f, "{c} done"),
        }
    }
}

/// Running totals for one handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Commands issued
    pub commands: u64,
    /// Status reads across all commands
    pub polls: u64,
    /// Commands that ran out of poll budget
    pub timeouts: u64,
}

/// Handle on one vector adder instance
///
/// Owns the register bus mapped at the peripheral base address and knows
/// the size of the peripheral's memory window. Built once per run from
/// configuration and passed by reference to whatever drives it.
#[derive(Debug)]
pub struct VecAdder<B: RegisterBus> {
    bus: B,
    window: MemoryWindow,
    poll: PollPolicy,
    state: ProtocolState,
    stats: DeviceStats,
}

impl<B: RegisterBus> VecAdder<B> {
    /// Wrap a register bus
    pub fn new(bus: B, window: MemoryWindow) -> Self {
        debug!(
            "hvadd handle on {} bus, {}-byte window",
            bus.bus_type(),
            window.capacity_bytes()
        );
        Self {
            bus,
            window,
            poll: PollPolicy::default(),
            state: ProtocolState::Idle,
            stats: DeviceStats::default(),
        }
    }

    /// Replace the completion poll policy
    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Memory window geometry
    pub const fn window(&self) -> MemoryWindow {
        self.window
    }

    /// Active poll policy
    pub const fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Handshake state
    pub const fn state(&self) -> ProtocolState {
        self.state
    }

    /// Running totals
    pub const fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Underlying bus
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Underlying bus, mutably (fault injection in tests, diagnostics)
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Give the bus back
    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Load one register directly, outside the command protocol
    ///
    /// # Errors
    ///
    /// Returns error on bus failure.
    pub fn read_register(&mut self, reg: Register) -> Result<u32> {
        let value = self.bus.read32(reg.offset())?;
        trace!("{reg} -> {value:#x}");
        Ok(value)
    }

    /// Store one register directly, outside the command protocol
    ///
    /// # Errors
    ///
    /// Returns error on bus failure.
    pub fn write_register(&mut self, reg: Register, value: u32) -> Result<()> {
        trace!("{reg} <- {value:#x}");
        self.bus.write32(reg.offset(), value)
    }

    /// Read the element at byte address `addr`
    ///
    /// # Errors
    ///
    /// Returns error if `addr` is outside the window, the peripheral times
    /// out, or the bus fails.
    #[allow(clippy::cast_possible_wrap)]
    pub fn read(&mut self, addr: u32) -> Result<i32> {
        self.check_range(addr, 1)?;
        self.ensure_idle()?;

        self.bus.write32(regs::ADDRESS, addr)?;
        self.issue(Command::Read)?;
        self.wait_for_completion()?;
        let value = self.bus.read32(regs::DATA_READ)? as i32;
        self.set_wait()?;

        debug!("read [{addr:#x}] = {value}");
        Ok(value)
    }

    /// Write `value` to the element at byte address `addr`
    ///
    /// # Errors
    ///
    /// Returns error if `addr` is outside the window, the peripheral times
    /// out, or the bus fails.
    #[allow(clippy::cast_sign_loss)]
    pub fn write(&mut self, addr: u32, value: i32) -> Result<()> {
        self.check_range(addr, 1)?;
        self.ensure_idle()?;

        self.bus.write32(regs::ADDRESS, addr)?;
        self.bus.write32(regs::DATA_WRITE, value as u32)?;
        self.issue(Command::Write)?;
        self.wait_for_completion()?;
        self.set_wait()?;

        debug!("write [{addr:#x}] = {value}");
        Ok(())
    }

    /// Add `len_bytes / 4` element pairs: `R[i] = A[i] + B[i]`
    ///
    /// `len_bytes` is a byte count; see [`add_elements`](Self::add_elements)
    /// for an element count. A zero length issues the command and completes
    /// without touching memory.
    ///
    /// # Errors
    ///
    /// Returns error if the length is not a multiple of 4, any vector leaves
    /// the window, the peripheral times out, or the bus fails.
    pub fn add(&mut self, addr_a: u32, addr_b: u32, addr_r: u32, len_bytes: u32) -> Result<()> {
        if len_bytes % WORD_BYTES != 0 {
            return Err(HvaddError::InvalidLength { len: len_bytes });
        }
        let elements = len_bytes / WORD_BYTES;
        for base in [addr_a, addr_b, addr_r] {
            self.check_range(base, elements)?;
        }
        self.ensure_idle()?;

        self.bus.write32(regs::VEC_A_ADDR, addr_a)?;
        self.bus.write32(regs::VEC_B_ADDR, addr_b)?;
        self.bus.write32(regs::VEC_R_ADDR, addr_r)?;
        self.bus.write32(regs::VEC_LEN, len_bytes)?;
        self.issue(Command::Add)?;
        let polls = self.wait_for_completion()?;
        self.set_wait()?;

        debug!("add [{addr_a:#x}] + [{addr_b:#x}] -> [{addr_r:#x}], {elements} elements, {polls} polls");
        Ok(())
    }

    /// [`add`](Self::add) with an element count instead of a byte count
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add); a count whose byte length overflows u32 is
    /// reported as out of range.
    pub fn add_elements(&mut self, addr_a: u32, addr_b: u32, addr_r: u32, elements: u32) -> Result<()> {
        let len_bytes = elements.checked_mul(WORD_BYTES).ok_or_else(|| {
            HvaddError::out_of_range(addr_r, u64::from(elements) * 4, self.window.capacity_bytes())
        })?;
        self.add(addr_a, addr_b, addr_r, len_bytes)
    }

    /// Poll status until the command in flight reports done
    ///
    /// Returns the number of status reads. On timeout the command register is
    /// reset to `Wait` (best effort) before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns error if no command is in flight, the poll policy is
    /// exhausted, or the bus fails.
    pub fn wait_for_completion(&mut self) -> Result<u32> {
        let cmd = match self.state {
            ProtocolState::Issued(c) | ProtocolState::Busy(c) => c,
            ProtocolState::Done(_) => return Ok(0),
            ProtocolState::Idle => {
                return Err(HvaddError::invalid_state("no command in flight"));
            }
        };

        self.state = ProtocolState::Busy(cmd);
        match self.poll.wait_for_done(&mut self.bus, cmd) {
            Ok(polls) => {
                self.stats.polls += u64::from(polls);
                self.state = ProtocolState::Done(cmd);
                trace!("{cmd} done after {polls} polls");
                Ok(polls)
            }
            Err(e) => {
                if let HvaddError::Timeout { polls, .. } = &e {
                    self.stats.polls += u64::from(*polls);
                    self.stats.timeouts += 1;
                }
                warn!("{cmd} did not complete: {e}");
                if let Err(reset) = self.set_wait() {
                    warn!("could not reset command register after {cmd}: {reset}");
                }
                Err(e)
            }
        }
    }

    /// Write `Wait` to the command register
    ///
    /// # Errors
    ///
    /// Returns error on bus failure; the handle then stays in its previous state.
    pub fn set_wait(&mut self) -> Result<()> {
        self.bus.write32(regs::COMMAND, Command::Wait.bits())?;
        self.state = ProtocolState::Idle;
        Ok(())
    }

    fn issue(&mut self, cmd: Command) -> Result<()> {
        self.bus.write32(regs::COMMAND, cmd.bits())?;
        self.state = ProtocolState::Issued(cmd);
        self.stats.commands += 1;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state == ProtocolState::Idle {
            Ok(())
        } else {
            Err(HvaddError::invalid_state(format!(
                "{} (command register not reset)",
                self.state
            )))
        }
    }

    fn check_range(&self, addr: u32, elements: u32) -> Result<()> {
        if self.window.contains_words(addr, elements) {
            Ok(())
        } else {
            Err(HvaddError::out_of_range(
                addr,
                u64::from(elements) * u64::from(WORD_BYTES),
                self.window.capacity_bytes(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Fault, SoftwareAdder};
    use hvadd_chip::regs::status;

    fn device(mem_bits: u32) -> VecAdder<SoftwareAdder> {
        let window = MemoryWindow::new(mem_bits).unwrap();
        VecAdder::new(SoftwareAdder::new(window).with_latency(3), window)
    }

    #[test]
    fn sanity_scenario_adds_two_scalars() {
        let mut dev = device(14);
        dev.write(2, 16).unwrap();
        dev.write(4, 32).unwrap();
        dev.add(2, 4, 8, 4).unwrap();
        assert_eq!(dev.read(8).unwrap(), 48);
    }

    #[test]
    fn every_operation_leaves_command_register_idle() {
        let mut dev = device(10);
        dev.write(0, 1).unwrap();
        assert_eq!(dev.bus().register(Register::Command), Command::Wait.bits());
        dev.read(0).unwrap();
        assert_eq!(dev.bus().register(Register::Command), Command::Wait.bits());
        dev.add(0, 0, 4, 4).unwrap();
        assert_eq!(dev.bus().register(Register::Command), Command::Wait.bits());
        assert_eq!(dev.state(), ProtocolState::Idle);
    }

    #[test]
    fn operands_land_in_their_registers() {
        let mut dev = device(12);
        dev.add(0x10, 0x200, 0x400, 16).unwrap();
        let bus = dev.bus();
        assert_eq!(bus.register(Register::VecA), 0x10);
        assert_eq!(bus.register(Register::VecB), 0x200);
        assert_eq!(bus.register(Register::VecR), 0x400);
        assert_eq!(bus.register(Register::Length), 16);
    }

    #[test]
    fn stats_count_commands_and_polls() {
        let mut dev = device(10);
        dev.write(0, 5).unwrap();
        dev.read(0).unwrap();
        let stats = dev.stats();
        assert_eq!(stats.commands, 2);
        assert_eq!(stats.polls, 8); // 3 busy + 1 done, twice
        assert_eq!(stats.timeouts, 0);
    }

    #[test]
    fn out_of_range_touches_no_register() {
        let mut dev = device(6); // 64 bytes
        assert!(matches!(dev.read(64), Err(HvaddError::OutOfRange { .. })));
        assert!(matches!(dev.add(0, 32, 48, 20), Err(HvaddError::OutOfRange { .. })));
        assert_eq!(dev.stats().commands, 0);
        assert_eq!(dev.bus().commands_executed(), 0);
        assert_eq!(dev.bus().register(Register::Address), 0);
    }

    #[test]
    fn odd_byte_length_is_rejected() {
        let mut dev = device(10);
        assert!(matches!(dev.add(0, 8, 16, 6), Err(HvaddError::InvalidLength { len: 6 })));
    }

    #[test]
    fn element_count_helper_scales_by_four() {
        let mut dev = device(10);
        dev.add_elements(0, 64, 128, 5).unwrap();
        assert_eq!(dev.bus().register(Register::Length), 20);
    }

    #[test]
    fn timeout_resets_to_wait_and_allows_next_command() {
        let window = MemoryWindow::new(10).unwrap();
        let sim = SoftwareAdder::new(window).with_fault(Fault::Stall);
        let mut dev =
            VecAdder::new(sim, window).with_poll_policy(PollPolicy::unbounded().with_max_polls(100));

        let err = dev.write(0, 9).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(dev.state(), ProtocolState::Idle);
        assert_eq!(dev.stats().timeouts, 1);
        assert_eq!(dev.bus().register(Register::Command), Command::Wait.bits());

        dev.bus_mut().set_fault(Fault::None);
        dev.write(0, 9).unwrap();
        assert_eq!(dev.read(0).unwrap(), 9);
    }

    #[test]
    fn wait_without_command_is_an_error() {
        let mut dev = device(10);
        assert!(matches!(
            dev.wait_for_completion(),
            Err(HvaddError::InvalidState { .. })
        ));
    }

    #[test]
    fn raw_register_access_bypasses_protocol() {
        let mut dev = device(10);
        dev.write_register(Register::Address, 0xcafe).unwrap();
        assert_eq!(dev.read_register(Register::Address).unwrap(), 0xcafe);
        assert_eq!(dev.read_register(Register::Status).unwrap(), status::BUSY);
        assert_eq!(dev.stats().commands, 0);
    }

    #[test]
    fn zero_length_add_completes() {
        let mut dev = device(10);
        dev.add(0, 0, 0, 0).unwrap();
        assert_eq!(dev.bus().commands_executed(), 1);
    }
}

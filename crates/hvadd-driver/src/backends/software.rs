// SPDX-License-Identifier: AGPL-3.0-only

//! Software (simulated) vector adder
//!
//! Implements [`RegisterBus`] with a cycle-free model of the programmable
//! logic: the same nine registers, the same command handshake, and a
//! word-addressed memory window of `2^mem_bits` bytes. This enables:
//!
//! 1. **CI without hardware**: every driver and harness test runs against it.
//!
//! 2. **Protocol checking**: the model only starts a command on the
//!    transition out of `Wait`, so a driver that forgets to reset the command
//!    register stalls here exactly as it would on the board.
//!
//! 3. **Fault injection**: a stalled peripheral (status never done) and
//!    corrupted add results can be switched on to exercise the timeout and
//!    mismatch-counting paths.
//!
//! ## Handshake model
//!
//! ```text
//! command ← Read/Write/Add   (from Wait)   status = 0, latency counter armed
//! status read, counter > 0                 counter -= 1, returns 0
//! status read, counter = 0                 command executes, returns 1
//! command ← Wait                           status = 0, ready for the next command
//! ```
//!
//! Addresses are byte addresses with the low two bits ignored. Word indices
//! wrap at the window size, like the address decoder in the fabric.

use crate::bus::{BusType, RegisterBus};
use crate::error::{HvaddError, Result};
use hvadd_chip::regs::{self, status, Register, REGISTER_COUNT};
use hvadd_chip::{Command, MemoryWindow, WORD_BYTES};
use tracing::{debug, trace};

/// Injected misbehaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Behave like healthy hardware
    #[default]
    None,
    /// Accept commands but never report done
    Stall,
    /// XOR every Add result with this mask
    CorruptAdd(u32),
}

/// Simulated vector adder peripheral.
#[derive(Debug, Clone)]
pub struct SoftwareAdder {
    window: MemoryWindow,
    regs: [u32; REGISTER_COUNT],
    memory: Vec<u32>,
    /// Status polls answered busy before a command completes
    latency_polls: u32,
    /// Remaining busy polls of the command in flight
    countdown: u32,
    /// Command accepted and not yet executed
    pending: Option<Command>,
    fault: Fault,
    executed: u64,
}

impl SoftwareAdder {
    /// Idle peripheral with a zeroed memory window
    pub fn new(window: MemoryWindow) -> Self {
        Self {
            window,
            regs: [0; REGISTER_COUNT],
            memory: vec![0; window.capacity_words() as usize],
            latency_polls: 0,
            countdown: 0,
            pending: None,
            fault: Fault::None,
            executed: 0,
        }
    }

    /// Report busy for `polls` status reads before each command completes
    #[must_use]
    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency_polls = polls;
        self
    }

    /// Start misbehaving
    #[must_use]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    /// Change the injected fault
    pub fn set_fault(&mut self, fault: Fault) {
        self.fault = fault;
    }

    /// Memory window geometry
    pub const fn window(&self) -> MemoryWindow {
        self.window
    }

    /// Number of commands executed so far
    pub const fn commands_executed(&self) -> u64 {
        self.executed
    }

    /// Command currently accepted but not finished
    pub const fn pending(&self) -> Option<Command> {
        self.pending
    }

    /// Raw register contents, bypassing the handshake
    pub const fn register(&self, reg: Register) -> u32 {
        self.regs[reg.offset() / regs::REGISTER_STRIDE]
    }

    /// Element stored at byte address `addr`
    #[allow(clippy::cast_possible_wrap)]
    pub fn peek(&self, addr: u32) -> i32 {
        self.memory[self.word(addr, 0)] as i32
    }

    /// Store an element directly, bypassing the handshake
    #[allow(clippy::cast_sign_loss)]
    pub fn poke(&mut self, addr: u32, value: i32) {
        let idx = self.word(addr, 0);
        self.memory[idx] = value as u32;
    }

    fn word(&self, base: u32, element: u32) -> usize {
        let words = self.window.capacity_words();
        ((MemoryWindow::word_index(base).wrapping_add(element)) & (words - 1)) as usize
    }

    fn reg(&self, offset: usize) -> u32 {
        self.regs[offset / regs::REGISTER_STRIDE]
    }

    fn set_reg(&mut self, offset: usize, value: u32) {
        self.regs[offset / regs::REGISTER_STRIDE] = value;
    }

    fn check(offset: usize) -> Result<()> {
        if offset % regs::REGISTER_STRIDE != 0 {
            return Err(HvaddError::Misaligned { offset });
        }
        if offset >= regs::WINDOW_SIZE {
            return Err(HvaddError::out_of_range(
                offset as u64,
                u64::from(WORD_BYTES),
                regs::WINDOW_SIZE as u64,
            ));
        }
        Ok(())
    }

    fn command_written(&mut self, value: u32) {
        let previous = Command::from_bits(self.reg(regs::COMMAND)).unwrap_or_default();
        self.set_reg(regs::COMMAND, value);

        match Command::from_bits(value) {
            Some(Command::Wait) => {
                self.pending = None;
                self.set_reg(regs::STATUS, status::BUSY);
            }
            Some(cmd) if previous == Command::Wait => {
                trace!("sim: accepted {cmd}");
                self.pending = Some(cmd);
                self.countdown = self.latency_polls;
                self.set_reg(regs::STATUS, status::BUSY);
            }
            Some(cmd) => {
                // No edge out of Wait: the fabric does not start anything.
                debug!("sim: {cmd} written while {previous} still latched, ignored");
            }
            None => debug!("sim: unknown command code {value:#x}, ignored"),
        }
    }

    fn status_read(&mut self) -> u32 {
        if let Some(cmd) = self.pending {
            if self.fault == Fault::Stall {
                return status::BUSY;
            }
            if self.countdown > 0 {
                self.countdown -= 1;
                return status::BUSY;
            }
            self.execute(cmd);
            self.pending = None;
            self.set_reg(regs::STATUS, status::DONE);
        }
        self.reg(regs::STATUS)
    }

    fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Wait => {}
            Command::Read => {
                let idx = self.word(self.reg(regs::ADDRESS), 0);
                self.set_reg(regs::DATA_READ, self.memory[idx]);
            }
            Command::Write => {
                let idx = self.word(self.reg(regs::ADDRESS), 0);
                self.memory[idx] = self.reg(regs::DATA_WRITE);
            }
            Command::Add => {
                let (a, b, r) = (
                    self.reg(regs::VEC_A_ADDR),
                    self.reg(regs::VEC_B_ADDR),
                    self.reg(regs::VEC_R_ADDR),
                );
                let mask = match self.fault {
                    Fault::CorruptAdd(mask) => mask,
                    _ => 0,
                };
                for i in 0..self.reg(regs::VEC_LEN) / WORD_BYTES {
                    let sum = self.memory[self.word(a, i)].wrapping_add(self.memory[self.word(b, i)]);
                    let dst = self.word(r, i);
                    self.memory[dst] = sum ^ mask;
                }
            }
        }
        self.executed += 1;
    }
}

impl RegisterBus for SoftwareAdder {
    fn read32(&mut self, offset: usize) -> Result<u32> {
        Self::check(offset)?;
        let value = if offset == regs::STATUS {
            self.status_read()
        } else {
            self.reg(offset)
        };
        Ok(value)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        Self::check(offset)?;
        match Register::from_offset(offset) {
            Some(Register::Command) => self.command_written(value),
            Some(reg) if reg.is_read_only() => trace!("sim: write to {reg} ignored"),
            _ => self.set_reg(offset, value),
        }
        Ok(())
    }

    fn bus_type(&self) -> BusType {
        BusType::Software
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> SoftwareAdder {
        SoftwareAdder::new(MemoryWindow::new(10).unwrap())
    }

    fn run(sim: &mut SoftwareAdder, cmd: Command) -> u32 {
        sim.write32(regs::COMMAND, cmd.bits()).unwrap();
        let mut polls = 1;
        while sim.read32(regs::STATUS).unwrap() != status::DONE {
            polls += 1;
        }
        sim.write32(regs::COMMAND, Command::Wait.bits()).unwrap();
        polls
    }

    #[test]
    fn write_then_read_through_registers() {
        let mut sim = adder();
        sim.write32(regs::ADDRESS, 40).unwrap();
        sim.write32(regs::DATA_WRITE, (-7i32) as u32).unwrap();
        run(&mut sim, Command::Write);
        assert_eq!(sim.peek(40), -7);

        sim.write32(regs::DATA_WRITE, 0).unwrap();
        run(&mut sim, Command::Read);
        assert_eq!(sim.read32(regs::DATA_READ).unwrap(), (-7i32) as u32);
    }

    #[test]
    fn add_uses_byte_length_and_word_stride() {
        let mut sim = adder();
        for i in 0..3 {
            sim.poke(i * 4, 10 + i as i32);
            sim.poke(100 + i * 4, 100);
        }
        sim.write32(regs::VEC_A_ADDR, 0).unwrap();
        sim.write32(regs::VEC_B_ADDR, 100).unwrap();
        sim.write32(regs::VEC_R_ADDR, 200).unwrap();
        sim.write32(regs::VEC_LEN, 8).unwrap(); // two elements
        run(&mut sim, Command::Add);
        assert_eq!(sim.peek(200), 110);
        assert_eq!(sim.peek(204), 111);
        assert_eq!(sim.peek(208), 0);
    }

    #[test]
    fn latency_is_reported_as_busy_polls() {
        let mut sim = adder().with_latency(5);
        assert_eq!(run(&mut sim, Command::Read), 6);
    }

    #[test]
    fn command_not_retriggered_without_wait() {
        let mut sim = adder();
        sim.write32(regs::COMMAND, Command::Write.bits()).unwrap();
        assert_eq!(sim.read32(regs::STATUS).unwrap(), status::DONE);
        assert_eq!(sim.commands_executed(), 1);

        // Rewriting Write without going through Wait starts nothing.
        sim.write32(regs::COMMAND, Command::Write.bits()).unwrap();
        assert_eq!(sim.pending(), None);
        assert_eq!(sim.read32(regs::STATUS).unwrap(), status::DONE);
        assert_eq!(sim.commands_executed(), 1);

        sim.write32(regs::COMMAND, Command::Wait.bits()).unwrap();
        assert_eq!(sim.read32(regs::STATUS).unwrap(), status::BUSY);
    }

    #[test]
    fn stalled_peripheral_never_completes() {
        let mut sim = adder().with_fault(Fault::Stall);
        sim.write32(regs::COMMAND, Command::Read.bits()).unwrap();
        for _ in 0..1000 {
            assert_eq!(sim.read32(regs::STATUS).unwrap(), status::BUSY);
        }
        assert_eq!(sim.commands_executed(), 0);
    }

    #[test]
    fn read_only_registers_ignore_writes() {
        let mut sim = adder();
        sim.write32(regs::STATUS, 1).unwrap();
        sim.write32(regs::DATA_READ, 99).unwrap();
        assert_eq!(sim.register(Register::Status), 0);
        assert_eq!(sim.register(Register::DataRead), 0);
    }

    #[test]
    fn rejects_bad_offsets() {
        let mut sim = adder();
        assert!(matches!(sim.read32(2), Err(HvaddError::Misaligned { offset: 2 })));
        assert!(matches!(sim.write32(36, 0), Err(HvaddError::OutOfRange { .. })));
    }

    #[test]
    fn addresses_wrap_at_window_size() {
        let mut sim = adder(); // 1 KB
        sim.poke(1024, 5);
        assert_eq!(sim.peek(0), 5);
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Completion polling
//!
//! The peripheral has no interrupt line. After a command is issued the host
//! reads the status register until it reports done. On the bring-up board
//! this loop had no bound, so a wedged bitstream hung the CPU. Here the bound
//! is an explicit [`PollPolicy`] and running out of it is a distinct
//! [`HvaddError::Timeout`].

use crate::bus::RegisterBus;
use crate::error::{HvaddError, Result};
use hvadd_chip::regs::{self, status};
use hvadd_chip::Command;
use std::time::{Duration, Instant};

/// Default poll budget per command.
pub const DEFAULT_MAX_POLLS: u32 = 1_000_000;

/// Default wall-clock budget per command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of polls between `yield_now` calls.
pub const DEFAULT_YIELD_INTERVAL: u32 = 1024;

/// How long to wait for the status register to report done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Give up after this many status reads (`None` = no limit)
    pub max_polls: Option<u32>,
    /// Give up after this much wall-clock time (`None` = no limit)
    pub timeout: Option<Duration>,
    /// Yield the thread every this many polls (`0` = never)
    pub yield_interval: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_polls: Some(DEFAULT_MAX_POLLS),
            timeout: Some(DEFAULT_TIMEOUT),
            yield_interval: DEFAULT_YIELD_INTERVAL,
        }
    }
}

impl PollPolicy {
    /// Spin until done, forever if need be (the bring-up board behaviour).
    pub const fn unbounded() -> Self {
        Self {
            max_polls: None,
            timeout: None,
            yield_interval: 0,
        }
    }

    /// Limit the number of status reads.
    #[must_use]
    pub const fn with_max_polls(mut self, polls: u32) -> Self {
        self.max_polls = Some(polls);
        self
    }

    /// Limit wall-clock time.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether either bound is set.
    pub const fn is_bounded(&self) -> bool {
        self.max_polls.is_some() || self.timeout.is_some()
    }

    /// Read `STATUS` until it reports done, returning the number of reads.
    ///
    /// # Errors
    ///
    /// Returns [`HvaddError::Timeout`] when a bound is exceeded, or any bus error.
    pub fn wait_for_done<B: RegisterBus + ?Sized>(&self, bus: &mut B, command: Command) -> Result<u32> {
        let start = Instant::now();
        let mut polls: u32 = 0;

        loop {
            polls = polls.saturating_add(1);
            if bus.read32(regs::STATUS)? == status::DONE {
                return Ok(polls);
            }

            let out_of_polls = self.max_polls.is_some_and(|max| polls >= max);
            let out_of_time = self.timeout.is_some_and(|t| start.elapsed() >= t);
            if out_of_polls || out_of_time {
                #[allow(clippy::cast_possible_truncation)]
                let elapsed_us = start.elapsed().as_micros() as u64;
                return Err(HvaddError::Timeout {
                    command: command.to_string(),
                    polls,
                    elapsed_us,
                });
            }

            if self.yield_interval != 0 && polls % self.yield_interval == 0 {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Fault, SoftwareAdder};
    use hvadd_chip::MemoryWindow;

    fn issue(sim: &mut SoftwareAdder, cmd: Command) {
        sim.write32(regs::COMMAND, cmd.bits()).unwrap();
    }

    #[test]
    fn counts_polls_until_done() {
        let mut sim = SoftwareAdder::new(MemoryWindow::new(8).unwrap()).with_latency(9);
        issue(&mut sim, Command::Read);
        let polls = PollPolicy::default().wait_for_done(&mut sim, Command::Read).unwrap();
        assert_eq!(polls, 10);
    }

    #[test]
    fn poll_budget_surfaces_timeout() {
        let mut sim = SoftwareAdder::new(MemoryWindow::new(8).unwrap()).with_fault(Fault::Stall);
        issue(&mut sim, Command::Add);
        let policy = PollPolicy::unbounded().with_max_polls(50);
        let err = policy.wait_for_done(&mut sim, Command::Add).unwrap_err();
        match err {
            HvaddError::Timeout { command, polls, .. } => {
                assert_eq!(command, "add");
                assert_eq!(polls, 50);
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[test]
    fn wall_clock_budget_surfaces_timeout() {
        let mut sim = SoftwareAdder::new(MemoryWindow::new(8).unwrap()).with_fault(Fault::Stall);
        issue(&mut sim, Command::Write);
        let policy = PollPolicy::unbounded().with_timeout(Duration::from_millis(5));
        let err = policy.wait_for_done(&mut sim, Command::Write).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn unbounded_policy_has_no_limits() {
        let p = PollPolicy::unbounded();
        assert!(!p.is_bounded());
        assert!(PollPolicy::default().is_bounded());
    }
}

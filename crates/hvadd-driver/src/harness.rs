// SPDX-License-Identifier: AGPL-3.0-only

//! Bring-up test harness
//!
//! A [`TestSuite`] runs an ordered list of [`TestCase`]s against one device
//! handle and stops at the first case that fails. Each case returns an error
//! count; an `Err` (timeout, range violation) aborts the case and the suite.

use crate::bus::RegisterBus;
use crate::config::RandomConfig;
use crate::device::VecAdder;
use crate::error::Result;
use crate::memory::{read_device_vector, write_random_operands};
use crate::reference::{compute_reference, count_mismatches};
use hvadd_chip::Register;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

/// One named check against the peripheral
pub trait TestCase<B: RegisterBus> {
    /// Label printed in reports
    fn name(&self) -> &str;

    /// Run the check, returning the number of errors found
    ///
    /// # Errors
    ///
    /// Returns error if the device stops responding or rejects a request.
    fn run(&mut self, dev: &mut VecAdder<B>) -> Result<usize>;
}

/// How one case ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    /// Zero errors
    Passed,
    /// Completed with mismatches
    Failed {
        /// Mismatch count
        errors: usize,
    },
    /// Stopped by a device error
    Aborted {
        /// Error message
        error: String,
    },
    /// Skipped after an earlier failure
    NotRun,
}

impl std::fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed { errors } => write!(f, "failed ({errors} errors)"),
            Self::Aborted { error } => write!(f, "failed ({error})"),
            Self::NotRun => write!(f, "not run"),
        }
    }
}

/// Result of one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    /// Case label
    pub name: String,
    /// Outcome
    pub outcome: CaseOutcome,
}

/// Result of a whole suite run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    /// One entry per case, in suite order
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// Whether every case passed
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.outcome == CaseOutcome::Passed)
    }

    /// The case that stopped the suite
    pub fn first_failure(&self) -> Option<&CaseReport> {
        self.cases
            .iter()
            .find(|c| !matches!(c.outcome, CaseOutcome::Passed | CaseOutcome::NotRun))
    }

    /// Mismatches summed over completed cases
    pub fn total_errors(&self) -> usize {
        self.cases
            .iter()
            .map(|c| match c.outcome {
                CaseOutcome::Failed { errors } => errors,
                _ => 0,
            })
            .sum()
    }
}

impl std::fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for case in &self.cases {
            writeln!(f, "{} tests: {}", case.name, case.outcome)?;
        }
        Ok(())
    }
}

/// Ordered list of cases
pub struct TestSuite<B: RegisterBus + 'static> {
    cases: Vec<Box<dyn TestCase<B>>>,
}

impl<B: RegisterBus + 'static> Default for TestSuite<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RegisterBus + 'static> TestSuite<B> {
    /// Empty suite
    pub fn new() -> Self {
        Self { cases: Vec::new() }
    }

    /// Bus sanity, functional sanity, then randomized trials
    pub fn standard(random: &RandomConfig) -> Self {
        Self::new()
            .with_case(BusSanity)
            .with_case(FunctionalSanity)
            .with_case(RandomTrials::new(random.clone()))
    }

    /// Append a case
    #[must_use]
    pub fn with_case(mut self, case: impl TestCase<B> + 'static) -> Self {
        self.cases.push(Box::new(case));
        self
    }

    /// Number of cases
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether the suite has no cases
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run cases in order, halting at the first failure
    pub fn run(&mut self, dev: &mut VecAdder<B>) -> SuiteReport {
        let mut report = SuiteReport::default();
        let mut halted = false;

        for case in &mut self.cases {
            let name = case.name().to_string();
            if halted {
                report.cases.push(CaseReport {
                    name,
                    outcome: CaseOutcome::NotRun,
                });
                continue;
            }

            let outcome = match case.run(dev) {
                Ok(0) => CaseOutcome::Passed,
                Ok(errors) => CaseOutcome::Failed { errors },
                Err(e) => CaseOutcome::Aborted {
                    error: e.to_string(),
                },
            };

            if outcome == CaseOutcome::Passed {
                info!("{name} tests: passed");
            } else {
                warn!("{name} tests: {outcome}, halting suite");
                halted = true;
            }
            report.cases.push(CaseReport { name, outcome });
        }

        report
    }
}

/// Pattern written to the address register by [`BusSanity`]
pub const BUS_SANITY_PATTERN: u32 = 0xcafe;

/// Register round trip over the AXI-Lite bus, no command issued
#[derive(Debug, Clone, Copy, Default)]
pub struct BusSanity;

impl<B: RegisterBus> TestCase<B> for BusSanity {
    fn name(&self) -> &str {
        "axil"
    }

    fn run(&mut self, dev: &mut VecAdder<B>) -> Result<usize> {
        dev.write_register(Register::Address, BUS_SANITY_PATTERN)?;
        let read = dev.read_register(Register::Address)?;
        Ok(usize::from(read != BUS_SANITY_PATTERN))
    }
}

/// Two scalar writes, their read-back, one add, one read
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionalSanity;

impl FunctionalSanity {
    const ADDR_A: u32 = 2;
    const ADDR_B: u32 = 4;
    const ADDR_R: u32 = 8;
    const VAL_A: i32 = 16;
    const VAL_B: i32 = 32;
}

impl<B: RegisterBus> TestCase<B> for FunctionalSanity {
    fn name(&self) -> &str {
        "sanity"
    }

    fn run(&mut self, dev: &mut VecAdder<B>) -> Result<usize> {
        dev.write(Self::ADDR_A, Self::VAL_A)?;
        dev.write(Self::ADDR_B, Self::VAL_B)?;

        let mut errors = usize::from(dev.read(Self::ADDR_A)? != Self::VAL_A);
        errors += usize::from(dev.read(Self::ADDR_B)? != Self::VAL_B);

        dev.add_elements(Self::ADDR_A, Self::ADDR_B, Self::ADDR_R, 1)?;
        errors += usize::from(dev.read(Self::ADDR_R)? != Self::VAL_A + Self::VAL_B);
        Ok(errors)
    }
}

/// Randomized adds checked element by element against the reference
#[derive(Debug, Clone)]
pub struct RandomTrials {
    config: RandomConfig,
}

impl RandomTrials {
    /// Trials with the given parameters
    pub const fn new(config: RandomConfig) -> Self {
        Self { config }
    }
}

impl<B: RegisterBus> TestCase<B> for RandomTrials {
    fn name(&self) -> &str {
        "random"
    }

    fn run(&mut self, dev: &mut VecAdder<B>) -> Result<usize> {
        let c = &self.config;
        c.validate(dev.window())?;
        let mut rng = StdRng::seed_from_u64(c.seed);
        let mut errors = 0;

        for trial in 0..c.trials {
            let elements = rng.gen_range(0..c.max_len_words) + 1;
            let addr_a = rng.gen_range(0..c.addr_range) * 4 + c.base_a;
            let addr_b = rng.gen_range(0..c.addr_range) * 4 + c.base_b;
            let addr_r = rng.gen_range(0..c.addr_range) * 4 + c.base_r;

            let (a, b) = write_random_operands(dev, addr_a, addr_b, elements, c.value_range, &mut rng)?;
            let reference = compute_reference(&a, &b);

            dev.add_elements(addr_a, addr_b, addr_r, elements)?;
            let result = read_device_vector(dev, addr_r, elements)?;

            let mismatches = count_mismatches(&result, &reference);
            if mismatches > 0 {
                warn!(
                    "trial {trial}: {mismatches}/{elements} mismatches \
                     ([{addr_a:#x}] + [{addr_b:#x}] -> [{addr_r:#x}])"
                );
            }
            errors += mismatches;
        }

        Ok(errors)
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Harness configuration
//!
//! Everything a bring-up run needs (base addresses, window sizes,
//! random-test parameters, timing layout) lives in one TOML file:
//!
//! ```toml
//! [adder]
//! base_addr = 0x43C00000
//! mem_bits = 14
//! device_path = "/dev/mem"
//!
//! [bram]
//! base_addr = 0x40000000
//! mem_bits = 12
//!
//! [poll]
//! max_polls = 1000000   # 0 = no limit
//! timeout_ms = 1000     # 0 = no limit
//!
//! [random]
//! trials = 16
//! seed = 1
//!
//! [timing]
//! max_shift = 10
//! ```
//!
//! Every field is optional and defaults to the board values.

use crate::error::{HvaddError, Result};
use crate::poll::{PollPolicy, DEFAULT_MAX_POLLS, DEFAULT_TIMEOUT, DEFAULT_YIELD_INTERVAL};
use crate::timing::TimingPlan;
use hvadd_chip::memory::{MAX_MEM_BITS, MIN_MEM_BITS};
use hvadd_chip::{board, MemoryWindow, WORD_BYTES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "HVADD_CONFIG";

/// Device node used to map physical windows
pub const DEFAULT_DEVICE_PATH: &str = "/dev/mem";

/// Complete harness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Vector adder peripheral
    pub adder: AdderConfig,
    /// Block RAM used by the software comparison path
    pub bram: BramConfig,
    /// Completion polling bounds
    pub poll: PollConfig,
    /// Randomized trial parameters
    pub random: RandomConfig,
    /// Timing sweep overrides
    pub timing: TimingConfig,
}

/// Vector adder peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdderConfig {
    /// Physical address of the register window
    pub base_addr: u64,
    /// Memory window width (`2^mem_bits` bytes)
    pub mem_bits: u32,
    /// Device node used to map the register window
    pub device_path: PathBuf,
}

impl Default for AdderConfig {
    fn default() -> Self {
        Self {
            base_addr: board::ADDER_BASE_ADDR,
            mem_bits: board::ADDER_MEM_BITS,
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
        }
    }
}

impl AdderConfig {
    /// Memory window geometry
    ///
    /// # Errors
    ///
    /// Returns error if `mem_bits` is outside the supported range.
    pub fn window(&self) -> Result<MemoryWindow> {
        MemoryWindow::new(self.mem_bits).ok_or_else(|| {
            HvaddError::invalid_config(format!(
                "adder.mem_bits = {} (expected {MIN_MEM_BITS}..={MAX_MEM_BITS})",
                self.mem_bits
            ))
        })
    }
}

/// Block RAM behind the AXI BRAM controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BramConfig {
    /// Physical base address
    pub base_addr: u64,
    /// Size as a power of two in bytes
    pub mem_bits: u32,
    /// Device node used to map the memory
    pub device_path: PathBuf,
}

impl Default for BramConfig {
    fn default() -> Self {
        Self {
            base_addr: board::BRAM_BASE_ADDR,
            mem_bits: board::BRAM_MEM_BITS,
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
        }
    }
}

impl BramConfig {
    /// Size in bytes
    pub const fn size_bytes(&self) -> usize {
        1 << self.mem_bits
    }
}

/// Completion polling bounds; zero disables a bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Status reads per command
    pub max_polls: u32,
    /// Wall-clock milliseconds per command
    pub timeout_ms: u64,
    /// Polls between thread yields
    pub yield_interval: u32,
}

impl Default for PollConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            max_polls: DEFAULT_MAX_POLLS,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            yield_interval: DEFAULT_YIELD_INTERVAL,
        }
    }
}

impl PollConfig {
    /// Policy handed to the device handle
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_polls: (self.max_polls != 0).then_some(self.max_polls),
            timeout: (self.timeout_ms != 0).then(|| Duration::from_millis(self.timeout_ms)),
            yield_interval: self.yield_interval,
        }
    }
}

/// Randomized trial parameters
///
/// Per trial: `1..=max_len_words` elements, each vector based at
/// `base + 4 * rand(0..addr_range)`, values in `-value_range/2 .. value_range/2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomConfig {
    /// Number of trials
    pub trials: u32,
    /// Longest vector in elements
    pub max_len_words: u32,
    /// Number of word offsets a base may be shifted by
    pub addr_range: u32,
    /// Base byte address of A vectors
    pub base_a: u32,
    /// Base byte address of B vectors
    pub base_b: u32,
    /// Base byte address of result vectors
    pub base_r: u32,
    /// Width of the operand value range
    pub value_range: i32,
    /// RNG seed
    pub seed: u64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            trials: 16,
            max_len_words: 16,
            addr_range: 16,
            base_a: 0,
            base_b: 200,
            base_r: 400,
            value_range: 128,
            seed: 1,
        }
    }
}

impl RandomConfig {
    /// Byte span `[start, end)` a vector based at `base` may ever touch
    fn span(&self, base: u32) -> (u64, u64) {
        let start = u64::from(base);
        let end = start
            + u64::from(self.addr_range.saturating_sub(1)) * u64::from(WORD_BYTES)
            + u64::from(self.max_len_words) * u64::from(WORD_BYTES);
        (start, end)
    }

    /// Check the trial vectors stay inside `window` and apart from each other
    ///
    /// # Errors
    ///
    /// Returns [`HvaddError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self, window: MemoryWindow) -> Result<()> {
        if self.max_len_words == 0 || self.addr_range == 0 {
            return Err(HvaddError::invalid_config(
                "random.max_len_words and random.addr_range must be at least 1",
            ));
        }
        if self.value_range <= 0 {
            return Err(HvaddError::invalid_config(format!(
                "random.value_range = {} (must be positive)",
                self.value_range
            )));
        }

        let spans = [
            ("base_a", self.span(self.base_a)),
            ("base_b", self.span(self.base_b)),
            ("base_r", self.span(self.base_r)),
        ];
        for (name, (_, end)) in &spans {
            if *end > u64::from(window.capacity_bytes()) {
                return Err(HvaddError::invalid_config(format!(
                    "random.{name}: vectors reach {end:#x}, window is {:#x} bytes",
                    window.capacity_bytes()
                )));
            }
        }
        for (i, (name_x, (sx, ex))) in spans.iter().enumerate() {
            for (name_y, (sy, ey)) in &spans[i + 1..] {
                if sx < ey && sy < ex {
                    return Err(HvaddError::invalid_config(format!(
                        "random.{name_x} and random.{name_y} vectors may overlap"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Timing sweep overrides; unset fields follow the window geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Smallest sweep size as a power of two
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_shift: Option<u32>,
    /// Largest sweep size as a power of two
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_shift: Option<u32>,
    /// Byte spacing between the A, B and R vectors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_bytes: Option<u32>,
    /// Largest vector for the host-memory sweep, in elements
    pub host_elements: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_shift: None,
            max_shift: None,
            span_bytes: None,
            host_elements: board::HOST_SWEEP_ELEMENTS,
        }
    }
}

impl TimingConfig {
    /// Sweep plan for `window` with overrides applied
    pub fn plan(&self, window: MemoryWindow) -> TimingPlan {
        let mut plan = TimingPlan::for_window(window);
        if let Some(s) = self.min_shift {
            plan.min_shift = s;
        }
        if let Some(s) = self.max_shift {
            plan.max_shift = s;
        }
        if let Some(span) = self.span_bytes {
            plan.span_bytes = span;
        }
        plan
    }
}

impl HarnessConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns error on malformed TOML, unknown keys, or inconsistent values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or does not validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve the configuration for this run
    ///
    /// An explicit path wins, then `$HVADD_CONFIG`, then built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a named file cannot be loaded.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => {
                tracing::debug!("No configuration file, using board defaults");
                Ok(Self::default())
            }
        }
    }

    /// Serialize back to TOML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| HvaddError::invalid_config(e.to_string()))
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    ///
    /// Returns [`HvaddError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let window = self.adder.window()?;

        if self.adder.base_addr % u64::from(WORD_BYTES) != 0 {
            return Err(HvaddError::invalid_config(format!(
                "adder.base_addr {:#x} is not word aligned",
                self.adder.base_addr
            )));
        }
        if !(MIN_MEM_BITS..=MAX_MEM_BITS).contains(&self.bram.mem_bits) {
            return Err(HvaddError::invalid_config(format!(
                "bram.mem_bits = {} (expected {MIN_MEM_BITS}..={MAX_MEM_BITS})",
                self.bram.mem_bits
            )));
        }
        if self.bram.base_addr % u64::from(WORD_BYTES) != 0 {
            return Err(HvaddError::invalid_config(format!(
                "bram.base_addr {:#x} is not word aligned",
                self.bram.base_addr
            )));
        }

        self.random.validate(window)?;
        self.timing.plan(window).validate(window)?;

        if self.timing.host_elements < 4 {
            return Err(HvaddError::invalid_config(
                "timing.host_elements must be at least 4",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_board_program() {
        let c = HarnessConfig::default();
        assert_eq!(c.adder.base_addr, 0x43C0_0000);
        assert_eq!(c.adder.mem_bits, 14);
        assert_eq!(c.bram.mem_bits, 12);
        assert_eq!(c.bram.size_bytes(), 4096);
        assert_eq!(c.random.trials, 16);
        assert_eq!((c.random.base_a, c.random.base_b, c.random.base_r), (0, 200, 400));
        assert_eq!(c.random.seed, 1);
        c.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = HarnessConfig::from_toml_str(
            r#"
            [adder]
            mem_bits = 12

            [random]
            trials = 4
            seed = 99
            "#,
        )
        .unwrap();
        assert_eq!(c.adder.mem_bits, 12);
        assert_eq!(c.adder.base_addr, board::ADDER_BASE_ADDR);
        assert_eq!(c.random.trials, 4);
        assert_eq!(c.random.seed, 99);
        assert_eq!(c.random.max_len_words, 16);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = HarnessConfig::from_toml_str("[adder]\nmem_bit = 14\n").unwrap_err();
        assert!(matches!(err, HvaddError::Config { .. }));
    }

    #[test]
    fn zero_disables_poll_bounds() {
        let c = PollConfig {
            max_polls: 0,
            timeout_ms: 0,
            yield_interval: 0,
        };
        assert_eq!(c.poll_policy(), PollPolicy::unbounded());
        assert_eq!(PollConfig::default().poll_policy(), PollPolicy::default());
    }

    #[test]
    fn random_vectors_must_fit_window() {
        let mut c = HarnessConfig::default();
        c.adder.mem_bits = 8; // 256 bytes, base_r = 400 is outside
        assert!(matches!(c.validate(), Err(HvaddError::InvalidConfig { .. })));
    }

    #[test]
    fn overlapping_random_vectors_are_rejected() {
        let mut c = HarnessConfig::default();
        c.random.base_b = 64;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn bad_mem_bits_is_invalid_config() {
        let mut c = HarnessConfig::default();
        c.adder.mem_bits = 40;
        assert!(matches!(c.validate(), Err(HvaddError::InvalidConfig { .. })));
    }

    #[test]
    fn timing_overrides_apply() {
        let c = TimingConfig {
            max_shift: Some(6),
            ..TimingConfig::default()
        };
        let plan = c.plan(MemoryWindow::new(14).unwrap());
        assert_eq!(plan.max_shift, 6);
        assert_eq!(plan.min_shift, 2);
    }

    #[test]
    fn toml_round_trip() {
        let mut c = HarnessConfig::default();
        c.random.seed = 7;
        c.timing.span_bytes = Some(4096);
        let text = c.to_toml_string().unwrap();
        assert_eq!(HarnessConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn explicit_path_wins() {
        let path = std::env::temp_dir().join(format!("hvadd-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[random]\ntrials = 3\n").unwrap();
        let c = HarnessConfig::discover(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(c.random.trials, 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = HarnessConfig::load(Path::new("/nonexistent/hvadd.toml")).unwrap_err();
        assert!(matches!(err, HvaddError::Io { .. }));
    }
}

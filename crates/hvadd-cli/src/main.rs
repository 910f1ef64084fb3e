//! `hvadd`: command-line interface for the hardware vector adder.
//!
//! ```text
//! USAGE:
//!   hvadd selftest                   Bus, sanity and random tests, then timing
//!   hvadd read <addr>                Read one element
//!   hvadd write <addr> <value>       Write one element
//!   hvadd add <a> <b> <r> <len>      Add vectors (len in bytes)
//!   hvadd regs                       Dump the register window
//!   hvadd timing                     Hardware add latency sweep
//!   hvadd config                     Print the effective configuration
//! ```
//!
//! Global options pick the configuration file (`--config`, or `$HVADD_CONFIG`)
//! and the bus (`--bus auto|mmio|software`). Without `/dev/mem` the simulated
//! adder is used.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hvadd_driver::chip::Register;
use hvadd_driver::timing::hardware_sweep;
use hvadd_driver::{open_bus, BusSelection, HarnessConfig, HostClock, RegisterBus, TestSuite, VecAdder};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hvadd", about = "Hardware vector adder bring-up CLI", version)]
struct Cli {
    /// Configuration file (TOML). Defaults to $HVADD_CONFIG, then board values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Register bus to drive.
    #[arg(long, value_enum, default_value_t = BusArg::Auto, global = true)]
    bus: BusArg,

    /// Status polls per command before giving up (0 = no limit).
    #[arg(long, global = true)]
    max_polls: Option<u32>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum BusArg {
    /// Map the hardware if available, otherwise simulate.
    Auto,
    /// Require the physical register window.
    Mmio,
    /// Simulated adder.
    Software,
}

impl From<BusArg> for BusSelection {
    fn from(arg: BusArg) -> Self {
        match arg {
            BusArg::Auto => Self::Auto,
            BusArg::Mmio => Self::Mmio,
            BusArg::Software => Self::Software,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the bring-up suite, halting at the first failing case.
    Selftest {
        /// Override the random-trial seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Override the number of random trials.
        #[arg(long)]
        trials: Option<u32>,
        /// Skip the timing sweep after the suite.
        #[arg(long)]
        no_timing: bool,
    },
    /// Read one element from the adder memory.
    Read {
        /// Byte address (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_u32)]
        addr: u32,
    },
    /// Write one element to the adder memory.
    Write {
        /// Byte address (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_u32)]
        addr: u32,
        /// Signed 32-bit value.
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Add two vectors: R[i] = A[i] + B[i].
    Add {
        /// Byte address of A.
        #[arg(value_parser = parse_u32)]
        a: u32,
        /// Byte address of B.
        #[arg(value_parser = parse_u32)]
        b: u32,
        /// Byte address of R.
        #[arg(value_parser = parse_u32)]
        r: u32,
        /// Length in bytes (multiple of 4).
        #[arg(value_parser = parse_u32)]
        len: u32,
    },
    /// Dump every register in the window.
    Regs,
    /// Time one add per power-of-two size.
    Timing,
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = HarnessConfig::discover(cli.config.as_deref())?;
    if let Some(polls) = cli.max_polls {
        config.poll.max_polls = polls;
    }
    if let Cmd::Selftest { seed, trials, .. } = &cli.command {
        if let Some(seed) = seed {
            config.random.seed = *seed;
        }
        if let Some(trials) = trials {
            config.random.trials = *trials;
        }
    }
    config.validate()?;

    let selection: BusSelection = cli.bus.into();
    let open = || open_device(&config, selection);

    match cli.command {
        Cmd::Config => print!("{}", config.to_toml_string()?),
        Cmd::Selftest { no_timing, .. } => cmd_selftest(&mut open()?, &config, !no_timing)?,
        Cmd::Read { addr } => {
            let value = open()?.read(addr)?;
            println!("[{addr:#06x}] = {value}");
        }
        Cmd::Write { addr, value } => {
            open()?.write(addr, value)?;
            println!("[{addr:#06x}] <- {value}");
        }
        Cmd::Add { a, b, r, len } => {
            open()?.add(a, b, r, len)?;
            println!("[{r:#06x}] <- [{a:#06x}] + [{b:#06x}], {} elements", len / 4);
        }
        Cmd::Regs => cmd_regs(&mut open()?)?,
        Cmd::Timing => cmd_timing(&mut open()?, &config)?,
    }

    Ok(())
}

type Device = VecAdder<Box<dyn RegisterBus>>;

fn open_device(config: &HarnessConfig, selection: BusSelection) -> Result<Device> {
    let bus = open_bus(selection, &config.adder)
        .with_context(|| format!("opening adder at {:#x}", config.adder.base_addr))?;
    tracing::info!("Driving {} bus", bus.bus_type());
    Ok(VecAdder::new(bus, config.adder.window()?).with_poll_policy(config.poll.poll_policy()))
}

fn cmd_selftest(dev: &mut Device, config: &HarnessConfig, timing: bool) -> Result<()> {
    println!("********************************");
    println!("*********HARD ADDER TEST********");
    println!("********************************");
    println!("bus : {}", dev.bus().bus_type());
    println!("seed: {}", config.random.seed);
    println!();
    println!("hardware add over PL RAM:");

    let report = TestSuite::standard(&config.random).run(dev);
    print!("{report}");

    if let Some(failed) = report.first_failure() {
        bail!("{} tests failed: {}", failed.name, failed.outcome);
    }

    if timing {
        cmd_timing(dev, config)?;
    }

    let stats = dev.stats();
    println!();
    println!("{} commands, {} status polls", stats.commands, stats.polls);
    Ok(())
}

fn cmd_timing(dev: &mut Device, config: &HarnessConfig) -> Result<()> {
    let plan = config.timing.plan(dev.window());
    println!("timing tests:");
    for sample in hardware_sweep(dev, &plan, &HostClock::new())? {
        println!("{sample}");
    }
    println!("timing concluded");
    Ok(())
}

fn cmd_regs(dev: &mut Device) -> Result<()> {
    for reg in Register::ALL {
        let value = dev.read_register(reg)?;
        let access = if reg.is_read_only() { "ro" } else { "rw" };
        println!("{:#04x}  {:<10} {access}  {value:#010x}", reg.offset(), reg.name());
    }
    Ok(())
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("{s}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_parse_in_hex_and_decimal() {
        assert_eq!(parse_u32("0x190"), Ok(400));
        assert_eq!(parse_u32("0X1_0"), Ok(16));
        assert_eq!(parse_u32("200"), Ok(200));
        assert!(parse_u32("0xzz").is_err());
        assert!(parse_u32("-4").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_write_values_parse() {
        let cli = Cli::try_parse_from(["hvadd", "--bus", "software", "write", "0x10", "-64"]).unwrap();
        assert!(matches!(cli.command, Cmd::Write { addr: 16, value: -64 }));
    }
}

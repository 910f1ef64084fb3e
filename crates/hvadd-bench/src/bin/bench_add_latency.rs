//! Hardware add latency: the adder against a CPU add over host memory.
//!
//! Each iteration runs the full hardware sweep (one `add` command per
//! power-of-two size, polling included) and the host-memory sweep over the
//! same sizes. The table reports per-size statistics.
//!
//! Without `/dev/mem` the simulated adder is used, which measures the
//! protocol overhead of the driver alone.
//!
//! Usage:
//!   cargo run --bin bench_add_latency
//!   cargo run --bin bench_add_latency -- --iterations 200

use anyhow::Result;
use hvadd_driver::timing::{hardware_sweep, host_sweep};
use hvadd_driver::{open_bus, BusSelection, HarnessConfig, HostClock, TimingSample, VecAdder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

const DEFAULT_ITERATIONS: usize = 50;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let iterations = parse_arg(&args, "--iterations", DEFAULT_ITERATIONS).max(1);

    let config = HarnessConfig::discover(None)?;
    let window = config.adder.window()?;
    let plan = config.timing.plan(window);

    let bus = open_bus(BusSelection::Auto, &config.adder)?;
    println!("Vector add latency benchmark");
    println!("============================");
    println!("Bus        : {}", bus.bus_type());
    println!("Window     : {} bytes", window.capacity_bytes());
    println!("Sizes      : {:?}", plan.element_counts());
    println!("Iterations : {iterations}");
    println!();

    let mut dev = VecAdder::new(bus, window).with_poll_policy(config.poll.poll_policy());
    let clock = HostClock::new();
    let mut rng = StdRng::seed_from_u64(config.random.seed);
    let largest = plan.element_counts().last().copied().unwrap_or(4) as usize;

    // Warmup
    hardware_sweep(&mut dev, &plan, &clock)?;

    let mut hw: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
    let mut sw: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
    for _ in 0..iterations {
        collect(&mut hw, hardware_sweep(&mut dev, &plan, &clock)?);
        collect(&mut sw, host_sweep(largest, &clock, &mut rng));
    }

    println!(
        "  {:>8}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        "pairs", "hw min ns", "hw p50 ns", "hw max ns", "host p50", "hw/host"
    );
    for (elements, mut samples) in hw {
        samples.sort_unstable();
        let host_p50 = sw.get_mut(&elements).map_or(0, |s| {
            s.sort_unstable();
            s[s.len() / 2]
        });
        let p50 = samples[samples.len() / 2];
        #[allow(clippy::cast_precision_loss)]
        let ratio = if host_p50 == 0 { f64::NAN } else { p50 as f64 / host_p50 as f64 };
        println!(
            "  {:>8}  {:>10}  {:>10}  {:>10}  {:>10}  {:>9.1}×",
            elements,
            samples[0],
            p50,
            samples[samples.len() - 1],
            host_p50,
            ratio
        );
    }

    let stats = dev.stats();
    println!();
    println!(
        "{} commands, {:.1} polls/command, {} timeouts",
        stats.commands,
        stats.polls as f64 / stats.commands.max(1) as f64,
        stats.timeouts
    );

    Ok(())
}

fn collect(into: &mut BTreeMap<u32, Vec<u64>>, samples: Vec<TimingSample>) {
    for s in samples {
        into.entry(s.elements).or_default().push(s.elapsed_ns);
    }
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

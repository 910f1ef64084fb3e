//! Software add baselines: CPU adds over host (PS) memory and over BRAM (PL).
//!
//! Two sweeps the hardware adder is judged against:
//!
//!   PS RAM : heap vectors of random values, lengths 4 ..= --size
//!   PL RAM : words behind the AXI BRAM controller, vectors at word offsets
//!            0, n+1, 2(n+1); the BRAM is primed with random words first
//!
//! Before the PL sweep an 8-element add is checked against the reference.
//! Without `/dev/mem` the BRAM is replaced by a heap-backed memory of the
//! same size.
//!
//! Usage:
//!   cargo run --bin bench_software_add
//!   cargo run --bin bench_software_add -- --size 4096

use anyhow::{ensure, Result};
use hvadd_driver::memory::{add_vectors, fill_random, fill_vector, validate_results};
use hvadd_driver::timing::{host_sweep, memory_sweep};
use hvadd_driver::{
    compute_reference, HarnessConfig, HostClock, MmioRegion, SoftwareBram, WordMemory,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let config = HarnessConfig::discover(None)?;
    let args: Vec<String> = std::env::args().collect();
    let size = parse_arg(&args, "--size", config.timing.host_elements).max(4);

    let clock = HostClock::new();
    let mut rng = StdRng::seed_from_u64(config.random.seed);

    println!("software add over PS RAM:");
    for sample in host_sweep(size, &clock, &mut rng) {
        println!("{sample}");
    }
    println!();

    let bram = &config.bram;
    let mut mem: Box<dyn WordMemory> =
        match MmioRegion::map(&bram.device_path, bram.base_addr, bram.size_bytes(), "bram") {
            Ok(region) => Box::new(region),
            Err(e) => {
                println!("BRAM unavailable ({e}), using host memory");
                Box::new(SoftwareBram::new(bram.mem_bits))
            }
        };

    println!("software add over PL RAM:");
    let len = 8;
    let a = [0, 1, 2, 3, 4, 5, 6, 7];
    let b = [7, 6, 5, 4, 3, 2, 1, 0];
    let (addr_a, addr_b, addr_c) = (0, 2 * len * 4, 4 * len * 4);

    fill_vector(mem.as_mut(), addr_a, &a)?;
    fill_vector(mem.as_mut(), addr_b, &b)?;
    add_vectors(mem.as_mut(), addr_a, addr_b, addr_c, len)?;
    let errors = validate_results(mem.as_ref(), addr_c, &compute_reference(&a, &b))?;
    ensure!(errors == 0, "PL RAM add produced {errors} wrong elements");

    fill_random(mem.as_mut(), &mut rng)?;
    for sample in memory_sweep(mem.as_mut(), &clock)? {
        println!("{sample}");
    }

    Ok(())
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

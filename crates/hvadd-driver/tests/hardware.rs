// SPDX-License-Identifier: AGPL-3.0-only

//! Board tests
//!
//! Run on the target with the bitstream loaded, as root:
//!   cargo test -p hvadd-driver --test hardware -- --ignored

use hvadd_driver::memory::{add_vectors, fill_random, fill_vector, validate_results};
use hvadd_driver::timing::{hardware_sweep, memory_sweep};
use hvadd_driver::{
    compute_reference, open_bus, BusSelection, BusType, HarnessConfig, HostClock, MmioRegion,
    TestSuite, VecAdder,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn board_device() -> VecAdder<Box<dyn hvadd_driver::RegisterBus>> {
    let config = HarnessConfig::discover(None).expect("configuration");
    let bus = open_bus(BusSelection::Mmio, &config.adder).expect("map adder registers");
    assert_eq!(bus.bus_type(), BusType::Mmio);
    VecAdder::new(bus, config.adder.window().unwrap()).with_poll_policy(config.poll.poll_policy())
}

#[test]
#[ignore] // Requires hardware
fn test_standard_suite_on_board() {
    let config = HarnessConfig::discover(None).expect("configuration");
    let mut dev = board_device();
    let report = TestSuite::standard(&config.random).run(&mut dev);
    println!("{report}");
    assert!(report.passed());
}

#[test]
#[ignore] // Requires hardware
fn test_hardware_timing_sweep() {
    let config = HarnessConfig::discover(None).expect("configuration");
    let mut dev = board_device();
    let plan = config.timing.plan(dev.window());
    let samples = hardware_sweep(&mut dev, &plan, &HostClock::new()).expect("sweep");
    for s in &samples {
        println!("{s}");
    }
    assert_eq!(samples.len(), plan.element_counts().len());
}

#[test]
#[ignore] // Requires hardware
fn test_software_add_over_bram() {
    let config = HarnessConfig::discover(None).expect("configuration");
    let bram = &config.bram;
    let mut mem = MmioRegion::map(&bram.device_path, bram.base_addr, bram.size_bytes(), "bram")
        .expect("map BRAM");

    fill_random(&mut mem, &mut StdRng::seed_from_u64(1)).unwrap();

    let a = [0, 1, 2, 3, 4, 5, 6, 7];
    let b = [7, 6, 5, 4, 3, 2, 1, 0];
    fill_vector(&mut mem, 0, &a).unwrap();
    fill_vector(&mut mem, 64, &b).unwrap();
    add_vectors(&mut mem, 0, 64, 128, a.len()).unwrap();
    assert_eq!(validate_results(&mem, 128, &compute_reference(&a, &b)).unwrap(), 0);

    for s in memory_sweep(&mut mem, &HostClock::new()).unwrap() {
        println!("{s}");
    }
}

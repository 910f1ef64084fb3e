// SPDX-License-Identifier: AGPL-3.0-only

//! Property tests for the command protocol over the simulated adder

use hvadd_driver::chip::MemoryWindow;
use hvadd_driver::memory::{fill_device_vector, read_device_vector};
use hvadd_driver::{compute_reference, SoftwareAdder, VecAdder};
use proptest::prelude::*;

const MEM_BITS: u32 = 12;

fn device(latency: u32) -> VecAdder<SoftwareAdder> {
    let window = MemoryWindow::new(MEM_BITS).unwrap();
    VecAdder::new(SoftwareAdder::new(window).with_latency(latency), window)
}

proptest! {
    #[test]
    fn write_then_read_returns_value(word in 0u32..1024, value: i32, latency in 0u32..8) {
        let mut dev = device(latency);
        dev.write(word * 4, value).unwrap();
        prop_assert_eq!(dev.read(word * 4).unwrap(), value);
    }

    #[test]
    fn low_address_bits_are_ignored(word in 0u32..1024, low in 0u32..4, value: i32) {
        let mut dev = device(0);
        dev.write(word * 4 + low, value).unwrap();
        prop_assert_eq!(dev.read(word * 4).unwrap(), value);
    }

    #[test]
    fn repeated_reads_are_idempotent(word in 0u32..1024, value: i32, reads in 2usize..6) {
        let mut dev = device(1);
        dev.write(word * 4, value).unwrap();
        for _ in 0..reads {
            prop_assert_eq!(dev.read(word * 4).unwrap(), value);
        }
    }

    #[test]
    fn add_matches_wrapping_reference(
        pairs in prop::collection::vec((any::<i32>(), any::<i32>()), 0..64),
        latency in 0u32..4,
    ) {
        let (a, b): (Vec<i32>, Vec<i32>) = pairs.into_iter().unzip();
        let mut dev = device(latency);
        // A, B and R in disjoint thirds of the 1024-word window
        fill_device_vector(&mut dev, 0, &a).unwrap();
        fill_device_vector(&mut dev, 1024, &b).unwrap();

        let elements = u32::try_from(a.len()).unwrap();
        dev.add_elements(0, 1024, 2048, elements).unwrap();

        let result = read_device_vector(&mut dev, 2048, elements).unwrap();
        prop_assert_eq!(result, compute_reference(&a, &b));
    }

    #[test]
    fn out_of_window_addresses_are_rejected(word in 1024u32..1_000_000) {
        let mut dev = device(0);
        prop_assert!(dev.read(word * 4).is_err());
        prop_assert!(dev.write(word * 4, 1).is_err());
        prop_assert_eq!(dev.stats().commands, 0);
    }
}

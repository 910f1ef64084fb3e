// SPDX-License-Identifier: AGPL-3.0-only

//! Software reference for the adder
//!
//! Ground truth for every correctness check. The fabric adds 32-bit two's
//! complement words and drops the carry, so the reference uses wrapping
//! arithmetic: no saturation, no overflow panic in debug builds.

/// `c[i] = a[i] + b[i]` with 32-bit wraparound
///
/// Both inputs must have the same length; in release builds the result is
/// truncated to the shorter one.
pub fn compute_reference(a: &[i32], b: &[i32]) -> Vec<i32> {
    debug_assert_eq!(a.len(), b.len(), "reference operands differ in length");
    a.iter().zip(b).map(|(x, y)| x.wrapping_add(*y)).collect()
}

/// Number of indices where `actual` differs from `expected`
///
/// Each differing index counts once. Elements missing from `actual` count as
/// mismatches.
pub fn count_mismatches(actual: &[i32], expected: &[i32]) -> usize {
    let differing = actual.iter().zip(expected).filter(|(a, e)| a != e).count();
    differing + expected.len().saturating_sub(actual.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_element_wise() {
        assert_eq!(compute_reference(&[0, 1, 2, 3], &[7, 6, 5, 4]), vec![7, 7, 7, 7]);
    }

    #[test]
    fn wraps_like_the_fabric() {
        assert_eq!(compute_reference(&[i32::MAX], &[1]), vec![i32::MIN]);
        assert_eq!(compute_reference(&[i32::MIN], &[-1]), vec![i32::MAX]);
    }

    #[test]
    fn empty_vectors_pass_vacuously() {
        let r = compute_reference(&[], &[]);
        assert!(r.is_empty());
        assert_eq!(count_mismatches(&[], &r), 0);
    }

    #[test]
    fn each_differing_index_counts_once() {
        assert_eq!(count_mismatches(&[1, 2, 3, 4], &[1, 0, 3, 0]), 2);
        assert_eq!(count_mismatches(&[1], &[1, 2, 3]), 2);
    }
}

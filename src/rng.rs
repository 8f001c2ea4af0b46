//! Deterministic seed derivation for parallel Monte Carlo streams.
//!
//! Every random stream in the pipeline is a `Xoshiro256PlusPlus` seeded from
//! a key derived from (base seed, field id, draw index, replicate index).
//! Streams are therefore statistically independent and reproducible
//! regardless of the order in which parallel workers run, replacing any
//! notion of a single global sequential RNG.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// SplitMix64 finalization step: full-avalanche mixing of one word.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Derive a well-distributed seed from a base seed and up to three indices.
///
/// Nearby counter values map to distant seeds, so per-draw and per-replicate
/// streams do not overlap even though the inputs are small consecutive
/// integers.
pub fn derived_seed(base: u64, a: u64, b: u64, c: u64) -> u64 {
    let mut s = splitmix64(base);
    s = splitmix64(s ^ a.wrapping_mul(0xa076_1d64_78bd_642f));
    s = splitmix64(s ^ b.wrapping_mul(0xe703_7ed1_a0b4_28db));
    splitmix64(s ^ c.wrapping_mul(0x8ebc_6af0_9c88_c6e3))
}

/// Construct the RNG for one (field, draw, replicate) simulation stream.
pub fn replicate_rng(base: u64, field: u64, draw: u64, replicate: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(derived_seed(base, field, draw, replicate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_derived_seed_deterministic() {
        assert_eq!(derived_seed(42, 1, 2, 3), derived_seed(42, 1, 2, 3));
    }

    #[test]
    fn test_derived_seed_distinct_for_adjacent_counters() {
        let mut seen = std::collections::HashSet::new();
        for draw in 0..100u64 {
            for rep in 0..100u64 {
                assert!(seen.insert(derived_seed(42, 0, draw, rep)));
            }
        }
    }

    #[test]
    fn test_replicate_rng_streams_differ() {
        let a: f64 = replicate_rng(42, 1, 0, 0).random();
        let b: f64 = replicate_rng(42, 1, 0, 1).random();
        assert_ne!(a, b);
    }
}

// src/rng.rs

//! Deterministic random number generation for the pipeline.
//!
//! Downsampling decisions and shuffle-slot selection both draw from an
//! explicit seeded generator owned by the pipeline, never from implicit
//! global randomness. Same seed, same record stream.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded RNG with deterministic forking for per-worker streams.
#[derive(Clone, Debug)]
pub struct PipelineRng {
    inner: ChaCha8Rng,
    seed: u64,
    fork_counter: u64,
}

impl PipelineRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
            fork_counter: 0,
        }
    }

    /// Create an RNG seeded from the OS.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(rand::rngs::OsRng.gen())
    }

    /// Fork an independent stream, e.g. one per decode worker.
    ///
    /// Each fork produces a different but deterministic sequence.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        self.fork_counter += 1;
        let fork_seed = self
            .seed
            .wrapping_add(self.fork_counter.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        Self {
            inner: ChaCha8Rng::seed_from_u64(fork_seed),
            seed: fork_seed,
            fork_counter: 0,
        }
    }

    /// Generate a uniformly random index in `[0, bound)`.
    pub fn index(&mut self, bound: usize) -> usize {
        self.inner.gen_range(0..bound)
    }

    /// Downsampling draw: keep one record in `sample` on average.
    pub fn keep_one_in(&mut self, sample: u32) -> bool {
        sample <= 1 || self.inner.gen_range(0..sample) == 0
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        slice.shuffle(&mut self.inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut rng1 = PipelineRng::new(42);
        let mut rng2 = PipelineRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.index(1000), rng2.index(1000));
        }
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = PipelineRng::new(1);
        let mut rng2 = PipelineRng::new(2);

        let seq1: Vec<_> = (0..10).map(|_| rng1.index(1000)).collect();
        let seq2: Vec<_> = (0..10).map(|_| rng2.index(1000)).collect();

        assert_ne!(seq1, seq2);
    }

    #[test]
    fn test_fork_is_deterministic() {
        let mut rng1 = PipelineRng::new(42);
        let mut rng2 = PipelineRng::new(42);

        let mut forked1 = rng1.fork();
        let mut forked2 = rng2.fork();

        for _ in 0..10 {
            assert_eq!(forked1.index(1000), forked2.index(1000));
        }
    }

    #[test]
    fn test_fork_produces_different_sequence() {
        let mut rng = PipelineRng::new(42);
        let mut forked = rng.fork();

        let seq1: Vec<_> = (0..10).map(|_| rng.index(1000)).collect();
        let seq2: Vec<_> = (0..10).map(|_| forked.index(1000)).collect();

        assert_ne!(seq1, seq2);
    }

    #[test]
    fn test_keep_one_in_one_always_keeps() {
        let mut rng = PipelineRng::new(0);
        for _ in 0..100 {
            assert!(rng.keep_one_in(1));
        }
    }

    #[test]
    fn test_keep_one_in_ratio() {
        let mut rng = PipelineRng::new(1234);
        let sample = 16u32;
        let trials = 100_000;
        let kept = (0..trials).filter(|_| rng.keep_one_in(sample)).count();

        // Expected trials/sample = 6250, binomial std dev ~76.5. Allow 5 sigma.
        let expected = trials as f64 / sample as f64;
        let sigma = (trials as f64 * (1.0 / 16.0) * (15.0 / 16.0)).sqrt();
        assert!(
            (kept as f64 - expected).abs() < 5.0 * sigma,
            "kept {kept} of {trials}, expected ~{expected}"
        );
    }
}

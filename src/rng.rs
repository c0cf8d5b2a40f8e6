//! Deterministic xorshift64* generator.
//!
//! Every stochastic minimizer in the crate draws from this generator so that
//! a run is reproducible from its seed alone.

use rand::{RngCore, SeedableRng};

/// Replacement state for a zero seed; xorshift never leaves the all-zero state.
const ZERO_SEED_STATE: u64 = 0x9E37_79B9_7F4A_7C15;
const MULTIPLIER: u64 = 0x2545_F491_4F6C_DD1D;
const INV_2_POW_53: f64 = 1.0 / (1u64 << 53) as f64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    pub fn new(seed: u64) -> Self {
        let mut rng = XorShift64Star { state: 0 };
        rng.seed(seed);
        rng
    }

    /// Reset the generator. A zero seed is mapped to a fixed nonzero word and
    /// the generator is advanced once.
    pub fn seed(&mut self, seed: u64) {
        self.state = if seed == 0 { ZERO_SEED_STATE } else { seed };
        self.step();
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    fn step(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(MULTIPLIER)
    }

    /// Uniform deviate in `[0, 1)` built from the top 53 bits.
    pub fn uniform01(&mut self) -> f64 {
        (self.step() >> 11) as f64 * INV_2_POW_53
    }

    /// Uniform deviate in `(0, 1]`, safe to pass to `ln`.
    pub fn uniform_open0(&mut self) -> f64 {
        1.0 - self.uniform01()
    }

    /// Uniform deviate in `[-span, span)`.
    pub fn uniform_span(&mut self, span: f64) -> f64 {
        (self.uniform01() * 2.0 - 1.0) * span
    }

    /// Uniform index in `0..n`. `n` must be nonzero.
    pub fn index(&mut self, n: usize) -> usize {
        let i = (self.uniform01() * n as f64) as usize;
        i.min(n - 1)
    }
}

impl Default for XorShift64Star {
    fn default() -> Self {
        XorShift64Star::new(1)
    }
}

impl RngCore for XorShift64Star {
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.step()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(8) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl SeedableRng for XorShift64Star {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        XorShift64Star::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        XorShift64Star::new(state)
    }
}

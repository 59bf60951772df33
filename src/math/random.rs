//! Linear congruential pseudo-random numbers
//!
//! This is the portable generator from the C standard's example, so a
//! given seed yields the same sequence on every platform. The state
//! lives in a [`Rand`] value rather than a process global.

/// Largest value [`Rand::rand`] returns
pub const RAND_MAX: u32 = 32767;

const MULTIPLIER: u32 = 1_103_515_245;
const INCREMENT: u32 = 12_345;

/// Seed used when none is given
pub const DEFAULT_SEED: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rand {
    seed: u32,
}

impl Default for Rand {
    fn default() -> Self {
        Rand::new(DEFAULT_SEED)
    }
}

impl Rand {
    pub fn new(seed: u32) -> Self {
        Rand { seed }
    }

    /// Restart the sequence from `seed`
    pub fn srand(&mut self, seed: u32) {
        self.seed = seed;
    }

    /// Next value in `0..=RAND_MAX`
    pub fn rand(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        (self.seed / 65536) % (RAND_MAX + 1)
    }
}

impl Iterator for Rand {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        Some(self.rand())
    }
}

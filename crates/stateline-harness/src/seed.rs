//! Splittable random seeds and the generation size parameter.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;

/// A splittable random seed.
///
/// Splitting is the only way to derive new seeds, so any value generated
/// from a `Seed` is a pure function of it: re-running with the same seed
/// replays the same choices. The mixing function is splitmix64.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Seed(u64);

const GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl Seed {
    pub fn from_u64(v: u64) -> Self {
        Seed(splitmix64(v))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Split into two independent seeds.
    pub fn split(self) -> (Seed, Seed) {
        let left = splitmix64(self.0);
        let right = splitmix64(self.0 ^ 0xda94_2042_e4dd_58b5);
        (Seed(left), Seed(right))
    }

    /// An RNG determined entirely by this seed.
    pub fn rng(self) -> StdRng {
        StdRng::seed_from_u64(self.0)
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({:016x})", self.0)
    }
}

/// Generation size, ramped from small to large over a test run.
///
/// Generators use it to bound structure: list lengths, integer magnitudes,
/// program lengths. Size 0 is valid and means "as small as possible".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Size(pub usize);

impl Size {
    pub fn get(self) -> usize {
        self.0
    }

    /// Cap the size at `max`.
    pub fn min(self, max: usize) -> Size {
        Size(self.0.min(max))
    }
}

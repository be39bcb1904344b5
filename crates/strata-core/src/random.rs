//! Random sources
//!
//! Randomized algorithms in Strata (bounding spheres, debug colours) take their
//! randomness through [`RandomSource`] so callers can seed them for
//! reproducible builds.

use glam::Vec3;

/// Source of uniformly distributed random numbers
pub trait RandomSource {
    /// Generates the next u32
    fn next_u32(&mut self) -> u32;

    /// Generates a u32 in range [0, bound); `bound` must be non-zero
    fn next_below(&mut self, bound: u32) -> u32 {
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u32();
            if r >= threshold {
                return r % bound;
            }
        }
    }

    /// Generates a float in [0, 1)
    fn next_f32(&mut self) -> f32 {
        // Upper 24 bits fit the f32 mantissa exactly
        (self.next_u32() >> 8) as f32 * (1.0 / 16777216.0)
    }

    /// Generates a float in [min, max)
    fn next_f32_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }
}

/// PCG random number generator (32-bit output, 64-bit state)
#[derive(Clone, Copy, Debug)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// Default increment (must be odd)
    const DEFAULT_INC: u64 = 1442695040888963407;

    /// Creates a new PCG with the given seed
    pub const fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: Self::DEFAULT_INC,
        };
        rng.state = seed.wrapping_add(rng.inc);
        rng.step();
        rng
    }

    /// Creates a PCG with seed and stream
    pub const fn with_stream(seed: u64, stream: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (stream << 1) | 1,
        };
        rng.state = seed.wrapping_add(rng.inc);
        rng.step();
        rng
    }

    const fn step(&mut self) {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(self.inc);
    }

    /// Generates a Vec3 with components in [min, max)
    pub fn next_vec3_range(&mut self, min: f32, max: f32) -> Vec3 {
        Vec3::new(
            self.next_f32_range(min, max),
            self.next_f32_range(min, max),
            self.next_f32_range(min, max),
        )
    }
}

impl Default for Pcg32 {
    fn default() -> Self {
        Self::new(0x853c49e6748fea9b)
    }
}

impl RandomSource for Pcg32 {
    fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.step();

        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Pcg32::new(42);
        let mut b = Pcg32::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_streams_differ() {
        let mut a = Pcg32::with_stream(7, 1);
        let mut b = Pcg32::with_stream(7, 2);
        let same = (0..16).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 16);
    }

    #[test]
    fn test_next_below_in_range() {
        let mut rng = Pcg32::new(3);
        for bound in 1..50 {
            assert!(rng.next_below(bound) < bound);
        }
    }

    #[test]
    fn test_next_f32_range() {
        let mut rng = Pcg32::new(9);
        for _ in 0..1000 {
            let value = rng.next_f32_range(0.15, 1.0);
            assert!((0.15..1.0).contains(&value));
        }
    }
}

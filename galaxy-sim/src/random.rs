//! Seeded, reproducible random stream.
//!
//! A [`RandomStream`] wraps a ChaCha8 generator, whose output is fixed by
//! its seed across platforms and releases. Independent sub-streams for
//! parallel work come from ChaCha's 64-bit stream id rather than from
//! reseeding with neighboring integers.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed this stream was last started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart from `seed`, discarding the current position.
    pub fn reseed(&mut self, seed: u64) {
        *self = RandomStream::new(seed);
    }

    /// An independent stream derived from this stream's seed.
    ///
    /// Sub-streams do not advance `self` and do not overlap each other or the
    /// parent stream.
    pub fn substream(&self, id: u64) -> RandomStream {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(id.wrapping_add(1));
        RandomStream {
            seed: self.seed,
            rng,
        }
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.rng.fill_bytes(dst)
    }
}

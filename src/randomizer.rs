//! Uniform random piece generation
//!
//! Every kind is drawn independently with probability 1/7. There is no bag
//! or anti-repeat rule, so droughts and repeats are possible.

use crate::tetromino::PieceKind;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seedable source for piece kinds and skill targets
#[derive(Debug, Clone)]
pub struct Randomizer {
    rng: ChaCha8Rng,
}

impl Default for Randomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Randomizer {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draw a kind uniformly from all 7
    pub fn next_kind(&mut self) -> PieceKind {
        let kinds = PieceKind::all();
        kinds[self.rng.gen_range(0..kinds.len())]
    }

    /// Pick one element uniformly, None for an empty slice
    pub fn choose<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        Some(items[self.rng.gen_range(0..items.len())])
    }
}

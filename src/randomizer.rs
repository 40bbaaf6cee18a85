//! Seeded piece generation
//!
//! Every simulation owns its own generator so a seed fully determines the
//! piece sequence. The default draws each piece uniformly at random; the
//! 7-bag variant shuffles all 7 pieces and deals them out before reshuffling.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::tetromino::TetrominoType;

/// How the next piece is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomizerKind {
    #[default]
    Uniform,
    SevenBag,
}

/// Deterministic piece source
#[derive(Debug, Clone)]
pub struct Randomizer {
    kind: RandomizerKind,
    rng: ChaCha8Rng,
    /// Pieces left in the current bag (7-bag only)
    bag: Vec<TetrominoType>,
}

impl Randomizer {
    pub fn new(kind: RandomizerKind, seed: u64) -> Self {
        Self {
            kind,
            rng: ChaCha8Rng::seed_from_u64(seed),
            bag: Vec::with_capacity(7),
        }
    }

    pub fn kind(&self) -> RandomizerKind {
        self.kind
    }

    /// Draw the next piece type
    pub fn next_type(&mut self) -> TetrominoType {
        match self.kind {
            RandomizerKind::Uniform => {
                let all = TetrominoType::all();
                all[self.rng.gen_range(0..all.len())]
            }
            RandomizerKind::SevenBag => loop {
                if let Some(next) = self.bag.pop() {
                    break next;
                }
                self.refill();
            },
        }
    }

    /// Refill the bag with a new shuffled set
    fn refill(&mut self) {
        let mut new_bag = TetrominoType::all().to_vec();
        new_bag.shuffle(&mut self.rng);
        self.bag = new_bag;
    }
}

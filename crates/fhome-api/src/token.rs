use std::sync::{Mutex, PoisonError};

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Length of every request token.
pub const TOKEN_LENGTH: usize = 13;

/// Source of per-request correlation tokens.
///
/// Owned by the client and shared by both connections. Seed it with
/// [`TokenGenerator::seeded`] to get a reproducible token sequence.
#[derive(Debug)]
pub struct TokenGenerator {
    rng: Mutex<StdRng>,
}

impl TokenGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// A fresh 13-character token drawn from `[0-9A-Za-z]`.
    pub fn next_token(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (&mut *rng)
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

//! Game sampling over the post-filter stream.
//!
//! Both variants own the seeded PRNG; nothing else may advance it, so a
//! fixed seed and a fixed post-filter input order reproduce the same
//! accept/replace sequence run after run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Outcome of a sampling decision for one candidate game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Skip the game body.
    Reject,
    /// Keep the game in a fresh slot.
    Accept,
    /// Keep the game, discarding the previous occupant of the given slot.
    Replace(usize),
}

#[derive(Debug)]
pub enum Sampler {
    /// Classic reservoir sampling with a fixed capacity: every post-filter
    /// candidate ends up retained with equal probability.
    Reservoir {
        limit: usize,
        seen: u64,
        rng: StdRng,
    },
    /// Accept each game independently with probability `1/one_in`. The coin
    /// is tossed at `start_pgn` for every game on the stream.
    Bernoulli {
        one_in: u32,
        accept_next: bool,
        rng: StdRng,
    },
}

impl Sampler {
    pub fn reservoir(limit: usize, seed: u64) -> Self {
        Self::Reservoir {
            limit,
            seen: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn bernoulli(one_in: u32, seed: u64) -> Self {
        Self::Bernoulli {
            one_in,
            accept_next: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn start_pgn(&mut self) {
        if let Self::Bernoulli {
            one_in,
            accept_next,
            rng,
        } = self
        {
            *accept_next = *one_in <= 1 || rng.gen_range(0..*one_in) == 0;
        }
    }

    /// Decide the fate of a candidate that passed every deterministic
    /// filter. `accepted` is the number of games currently retained.
    ///
    /// Must be called last in the filter chain: a reservoir decision
    /// allocates or replaces a slot, so it may not run for games other
    /// filters have already excluded.
    pub fn decide(&mut self, accepted: usize) -> Decision {
        match self {
            Self::Reservoir { limit, seen, rng } => {
                if *limit == 0 {
                    return Decision::Reject;
                }
                *seen += 1;
                if accepted < *limit {
                    return Decision::Accept;
                }
                if rng.gen::<f64>() > *limit as f64 / *seen as f64 {
                    return Decision::Reject;
                }
                Decision::Replace(rng.gen_range(0..*limit))
            }
            Self::Bernoulli { accept_next, .. } => {
                if *accept_next {
                    Decision::Accept
                } else {
                    Decision::Reject
                }
            }
        }
    }
}

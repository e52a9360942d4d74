use super::customer::CustomerRecord;
use crate::error::{Result, SagaError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeSet;

/// Chooses which authorized customers get captured.
pub trait SelectionPolicy: Send + Sync {
    /// Returns the winner index into `cohort`.
    ///
    /// A successful run captures exactly one customer, so anything other than
    /// one distinct in-range index is rejected by [`Selection::partition`].
    fn select(&self, cohort: &[CustomerRecord]) -> Vec<usize>;

    fn name(&self) -> &'static str;
}

/// The first customer in the cohort always wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstWins;

impl SelectionPolicy for FirstWins {
    fn select(&self, cohort: &[CustomerRecord]) -> Vec<usize> {
        if cohort.is_empty() { Vec::new() } else { vec![0] }
    }

    fn name(&self) -> &'static str {
        "first"
    }
}

/// Picks a single winner uniformly at random.
///
/// With a seed the pick is reproducible: the same seed and cohort size always
/// give the same winner.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomWinner {
    seed: Option<u64>,
}

impl RandomWinner {
    /// Draws from the thread-local RNG.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws from an RNG seeded with `seed` on every call.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl SelectionPolicy for RandomWinner {
    fn select(&self, cohort: &[CustomerRecord]) -> Vec<usize> {
        if cohort.is_empty() {
            return Vec::new();
        }
        let index = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..cohort.len()),
            None => rand::thread_rng().gen_range(0..cohort.len()),
        };
        vec![index]
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Winners and losers of a cohort. Together they cover every index exactly once.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct Selection {
    pub winners: Vec<usize>,
    pub losers: Vec<usize>,
}

impl Selection {
    /// Splits `0..cohort_len` into the given winners and their complement.
    ///
    /// Duplicate winners collapse. Anything but a single in-range winner is rejected.
    pub fn partition(winners: &[usize], cohort_len: usize) -> Result<Self> {
        let winners: BTreeSet<usize> = winners.iter().copied().collect();
        if winners.is_empty() {
            return Err(SagaError::Selection("policy chose no winner".to_string()));
        }
        if winners.len() > 1 {
            return Err(SagaError::Selection(format!(
                "policy chose {} winners {winners:?}, expected exactly one",
                winners.len()
            )));
        }
        if let Some(out_of_range) = winners.iter().find(|&&i| i >= cohort_len) {
            return Err(SagaError::Selection(format!(
                "winner index {out_of_range} is outside a cohort of {cohort_len}"
            )));
        }
        let losers = (0..cohort_len).filter(|i| !winners.contains(i)).collect();
        Ok(Self {
            winners: winners.into_iter().collect(),
            losers,
        })
    }

    /// Runs `policy` over `cohort` and partitions the result.
    pub fn apply(policy: &dyn SelectionPolicy, cohort: &[CustomerRecord]) -> Result<Self> {
        Self::partition(&policy.select(cohort), cohort.len())
    }
}

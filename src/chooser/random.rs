use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::QueryChooser;
use super::weighted::WeightedChoice;
use crate::constants::MAX_CHOOSE_ATTEMPTS;
use crate::storage::{QueryStore, StorageResult};

/// Picks any query, ignoring what has been judged.
///
/// A set is drawn with probability proportional to its size among the active sets,
/// then a query uniformly within it, so every active query is equally likely.
pub struct RandomQueryChooser<Q> {
    queries: Q,
    rng: Mutex<StdRng>,
}

impl<Q: QueryStore + Sync> RandomQueryChooser<Q> {
    pub fn new(queries: Q, rng: StdRng) -> Self {
        Self {
            queries,
            rng: Mutex::new(rng),
        }
    }

    pub fn seeded(queries: Q, seed: u64) -> Self {
        Self::new(queries, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(queries: Q) -> Self {
        Self::new(queries, StdRng::from_os_rng())
    }

    /// A query from any active set; `None` if every active set is empty.
    pub fn choose_any(&self) -> StorageResult<Option<String>> {
        for _ in 0..MAX_CHOOSE_ATTEMPTS {
            let sizes = WeightedChoice::new(self.queries.active_names().into_iter().filter_map(
                |name| {
                    let size = self.queries.size(&name)?;
                    Some((name, size as u64))
                },
            ));
            let Some(set) = sizes.into_choice(&mut *self.rng.lock()) else {
                return Ok(None);
            };
            // The set can vanish or shrink between the size read and this one.
            if let Some(query) = self.choose_in(&set)? {
                return Ok(Some(query));
            }
            debug!(set = %set, "Drawn set no longer has queries, retrying");
        }
        Ok(None)
    }

    /// A query from `set`; `None` if it is missing or empty.
    pub fn choose_in(&self, set: &str) -> StorageResult<Option<String>> {
        let Some(list) = self.queries.get(set)? else {
            return Ok(None);
        };
        if list.is_empty() {
            return Ok(None);
        }
        let index = self.rng.lock().random_range(0..list.len());
        Ok(list.get(index).map(str::to_string))
    }
}

impl<Q: QueryStore + Sync> QueryChooser for RandomQueryChooser<Q> {
    fn choose(&self, _assessor: &str) -> StorageResult<Option<String>> {
        self.choose_any()
    }

    fn choose_from(&self, _assessor: &str, set: &str) -> StorageResult<Option<String>> {
        self.choose_in(set)
    }
}

impl<Q> std::fmt::Debug for RandomQueryChooser<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomQueryChooser").finish_non_exhaustive()
    }
}

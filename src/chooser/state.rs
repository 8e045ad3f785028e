//! Per-assessor judged state.

use std::collections::HashMap;

use bitvec::prelude::*;
use rand::Rng;

use super::weighted::WeightedChoice;
use crate::constants::UNRESOLVED_QUEUE_CAPACITY;
use crate::model::{JudgmentRecord, QueryList};

/// One query set as seen by one assessor: set bits are queries still unjudged.
#[derive(Debug, Clone)]
pub(crate) struct SetState {
    queries: QueryList,
    unjudged: BitVec,
    remaining: usize,
}

impl SetState {
    pub(crate) fn new(queries: QueryList) -> Self {
        let len = queries.len();
        Self {
            queries,
            unjudged: BitVec::repeat(true, len),
            remaining: len,
        }
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    /// Marks position `index` judged. `false` if it already was.
    pub(crate) fn clear(&mut self, index: usize) -> bool {
        if index >= self.unjudged.len() || !self.unjudged[index] {
            return false;
        }
        self.unjudged.set(index, false);
        self.remaining -= 1;
        true
    }

    /// Marks `query` judged if this set contains it.
    pub(crate) fn mark(&mut self, query: &str) -> bool {
        match self.queries.position(query) {
            Some(index) => self.clear(index),
            None => false,
        }
    }

    pub(crate) fn query(&self, index: usize) -> Option<&str> {
        self.queries.get(index)
    }

    /// Uniform draw among unjudged positions.
    pub(crate) fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        WeightedChoice::uniform(self.unjudged.iter_ones()).into_choice(rng)
    }
}

/// What [`JudgedState::mark_judged`] did with a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkOutcome {
    /// Matched the last pick; its bit was cleared directly.
    Cleared,
    /// Queued for resolution at the next draw.
    Queued,
    /// The queue was full; the state must be rebuilt from the log.
    Overflow,
}

/// Result of drawing from a prepared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Draw {
    Picked(String),
    /// Nothing unjudged among the candidate sets.
    Exhausted,
}

/// Which queries one assessor has judged under one profile pair.
#[derive(Debug, Clone)]
pub(crate) struct JudgedState {
    first: String,
    second: String,
    sets: HashMap<String, SetState>,
    unresolved: Vec<String>,
    last_pick: Option<(String, usize)>,
}

impl JudgedState {
    /// Marks every query `records` judged under the `first`/`second` pair, in either
    /// order, across all `sets`.
    pub(crate) fn build(
        first: String,
        second: String,
        sets: impl IntoIterator<Item = (String, QueryList)>,
        records: &[JudgmentRecord],
    ) -> Self {
        let mut state = Self {
            first,
            second,
            sets: sets
                .into_iter()
                .map(|(name, queries)| (name, SetState::new(queries)))
                .collect(),
            unresolved: Vec::new(),
            last_pick: None,
        };
        for record in records {
            if state.matches(record) {
                state.mark_everywhere(&record.query);
            }
        }
        state
    }

    #[inline]
    pub(crate) fn matches(&self, record: &JudgmentRecord) -> bool {
        record.compares(&self.first, &self.second)
    }

    /// Whether this state was built for the `first`/`second` pair, in either order.
    pub(crate) fn is_for(&self, first: &str, second: &str) -> bool {
        (self.first == first && self.second == second)
            || (self.first == second && self.second == first)
    }

    pub(crate) fn set(&self, name: &str) -> Option<&SetState> {
        self.sets.get(name)
    }

    pub(crate) fn unresolved_len(&self) -> usize {
        self.unresolved.len()
    }

    pub(crate) fn mark_everywhere(&mut self, query: &str) {
        for set in self.sets.values_mut() {
            set.mark(query);
        }
    }

    pub(crate) fn mark_judged(&mut self, query: &str) -> MarkOutcome {
        if let Some((name, index)) = &self.last_pick {
            if let Some(set) = self.sets.get_mut(name) {
                if set.query(*index) == Some(query) {
                    set.clear(*index);
                    self.last_pick = None;
                    return MarkOutcome::Cleared;
                }
            }
        }

        if self.unresolved.len() >= UNRESOLVED_QUEUE_CAPACITY {
            self.unresolved.clear();
            return MarkOutcome::Overflow;
        }
        self.unresolved.push(query.to_string());
        MarkOutcome::Queued
    }

    /// Applies every queued query to every set.
    pub(crate) fn resolve_unresolved(&mut self) {
        for query in std::mem::take(&mut self.unresolved) {
            self.mark_everywhere(&query);
        }
    }

    pub(crate) fn remove_set(&mut self, name: &str) {
        self.sets.remove(name);
        if self.last_pick.as_ref().is_some_and(|(set, _)| set == name) {
            self.last_pick = None;
        }
    }

    pub(crate) fn rename_set(&mut self, old: &str, new: &str) {
        if let Some(set) = self.sets.remove(old) {
            self.sets.insert(new.to_string(), set);
        }
        if let Some((set, _)) = &mut self.last_pick {
            if set == old {
                *set = new.to_string();
            }
        }
    }

    /// Draws among `candidates`, weighting each set by its unjudged count.
    pub(crate) fn draw<R: Rng + ?Sized>(&mut self, candidates: &[String], rng: &mut R) -> Draw {
        let by_remaining = WeightedChoice::new(candidates.iter().filter_map(|name| {
            self.sets
                .get(name)
                .map(|set| (name.as_str(), set.remaining() as u64))
        }));
        match by_remaining.into_choice(rng) {
            Some(name) => {
                let name = name.to_string();
                self.draw_from(&name, rng)
            }
            None => Draw::Exhausted,
        }
    }

    /// Draws an unjudged query from one set.
    pub(crate) fn draw_from<R: Rng + ?Sized>(&mut self, name: &str, rng: &mut R) -> Draw {
        let Some(set) = self.sets.get(name) else {
            return Draw::Exhausted;
        };
        let Some(index) = set.draw(rng) else {
            return Draw::Exhausted;
        };
        let Some(query) = set.query(index).map(str::to_string) else {
            return Draw::Exhausted;
        };
        self.last_pick = Some((name.to_string(), index));
        Draw::Picked(query)
    }
}

/// Lifecycle of one assessor inside the engine. Absence means uninitialized.
#[derive(Debug)]
pub(crate) enum AssessorState {
    /// Some thread is reading the log; judgments arriving meanwhile wait here.
    Building(Vec<JudgmentRecord>),
    Ready(JudgedState),
    /// The unresolved queue overflowed; rebuild on next use.
    PendingReinit,
}

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, instrument, warn};

use super::QueryChooser;
use super::random::RandomQueryChooser;
use super::state::{AssessorState, Draw, JudgedState, MarkOutcome};
use crate::constants::{MAX_CHOOSE_ATTEMPTS, UNRESOLVED_QUEUE_CAPACITY};
use crate::model::JudgmentRecord;
use crate::storage::{
    JudgmentStore, PreferencesStore, QueryStore, StorageListener, StorageResult,
};

/// Where one assessor stands with the chooser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessorStatus {
    Uninitialized,
    Building,
    Ready,
    PendingReinit,
}

struct EngineState {
    rng: StdRng,
    assessors: HashMap<String, AssessorState>,
    /// Bumped by every invalidation; a build started under an older value is dropped.
    generation: u64,
}

enum Plan {
    Picked(String),
    Fallback,
    Build { generation: u64 },
}

/// Prefers queries the assessor has not yet judged under the active profile pair.
///
/// Per assessor it keeps one bitset per query set, built lazily from the judgment
/// log and kept current through [`StorageListener`] events. Store reads happen
/// outside the engine lock; only in-memory draws and bookkeeping happen under it.
/// When nothing unjudged remains, or preferring unjudged queries is switched off,
/// it degrades to [`RandomQueryChooser`].
pub struct UnjudgedQueryChooser<P, Q, J> {
    preferences: P,
    queries: Q,
    judgments: J,
    fallback: RandomQueryChooser<Q>,
    state: Mutex<EngineState>,
}

impl<P, Q, J> UnjudgedQueryChooser<P, Q, J>
where
    P: PreferencesStore + Sync,
    Q: QueryStore + Clone + Sync,
    J: JudgmentStore + Sync,
{
    /// `seed` makes every draw reproducible; `None` seeds from the OS.
    pub fn new(preferences: P, queries: Q, judgments: J, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let fallback = RandomQueryChooser::new(queries.clone(), StdRng::from_rng(&mut rng));
        Self {
            preferences,
            queries,
            judgments,
            fallback,
            state: Mutex::new(EngineState {
                rng,
                assessors: HashMap::new(),
                generation: 0,
            }),
        }
    }

    pub fn status(&self, assessor: &str) -> AssessorStatus {
        match self.state.lock().assessors.get(assessor) {
            None => AssessorStatus::Uninitialized,
            Some(AssessorState::Building(_)) => AssessorStatus::Building,
            Some(AssessorState::Ready(_)) => AssessorStatus::Ready,
            Some(AssessorState::PendingReinit) => AssessorStatus::PendingReinit,
        }
    }

    /// Unjudged queries left in `set` for `assessor`, if that state is built.
    pub fn unjudged_count(&self, assessor: &str, set: &str) -> Option<usize> {
        match self.state.lock().assessors.get(assessor) {
            Some(AssessorState::Ready(state)) => state.set(set).map(|s| s.remaining()),
            _ => None,
        }
    }

    /// Records that `assessor` judged `query` under the current profile pair.
    ///
    /// Clears the bit directly when `query` is the assessor's last pick; otherwise
    /// queues it, and a full queue sends the assessor back to a rebuild.
    pub fn mark_judged(&self, assessor: &str, query: &str) {
        let mut guard = self.state.lock();
        let Some(entry) = guard.assessors.get_mut(assessor) else {
            return;
        };
        if let AssessorState::Ready(state) = &mut *entry {
            if state.mark_judged(query) == MarkOutcome::Overflow {
                debug!(assessor, "Unresolved queue overflowed, rebuilding on next choice");
                *entry = AssessorState::PendingReinit;
            }
        }
    }

    /// Drops every assessor's state.
    pub fn invalidate_all(&self) {
        let mut guard = self.state.lock();
        guard.assessors.clear();
        guard.generation += 1;
    }

    fn plan(
        &self,
        assessor: &str,
        set: Option<&str>,
        active: &[String],
        (first, second): (&str, &str),
    ) -> Plan {
        let mut guard = self.state.lock();
        let EngineState {
            rng,
            assessors,
            generation,
        } = &mut *guard;

        let stale = matches!(
            assessors.get(assessor),
            Some(AssessorState::Ready(state)) if !state.is_for(first, second)
        );
        if stale {
            debug!(assessor, "Judged state built for another profile pair, rebuilding");
            assessors.remove(assessor);
        }

        match assessors.get_mut(assessor) {
            Some(AssessorState::Ready(state)) => {
                state.resolve_unresolved();
                let draw = match set {
                    Some(set) => state.draw_from(set, rng),
                    None => state.draw(active, rng),
                };
                match draw {
                    Draw::Picked(query) => Plan::Picked(query),
                    Draw::Exhausted => Plan::Fallback,
                }
            }
            Some(AssessorState::Building(_)) => Plan::Build {
                generation: *generation,
            },
            _ => {
                assessors.insert(assessor.to_string(), AssessorState::Building(Vec::new()));
                Plan::Build {
                    generation: *generation,
                }
            }
        }
    }

    /// Reads the profile pair, the assessor's log and every set. `None` when the
    /// pair is incomplete, in which case there is nothing to scope judgments to.
    #[instrument(skip(self))]
    fn build(&self, assessor: &str) -> StorageResult<Option<JudgedState>> {
        let (Some(first), Some(second)) = (
            self.preferences.first_profile(),
            self.preferences.second_profile(),
        ) else {
            return Ok(None);
        };

        let records = self.judgments.list(assessor)?;
        let mut sets = Vec::new();
        for name in self.queries.names() {
            if let Some(list) = self.queries.get(&name)? {
                sets.push((name, list));
            }
        }
        debug!(records = records.len(), sets = sets.len(), "Built judged state");
        Ok(Some(JudgedState::build(first.name, second.name, sets, &records)))
    }

    /// Installs a freshly built state unless something invalidated it meanwhile.
    fn install(&self, assessor: &str, generation: u64, built: Option<JudgedState>) {
        let mut guard = self.state.lock();
        if guard.generation != generation {
            return;
        }
        let Some(entry) = guard.assessors.get_mut(assessor) else {
            return;
        };
        let AssessorState::Building(missed) = &mut *entry else {
            return;
        };
        match built {
            Some(mut state) => {
                for record in std::mem::take(missed) {
                    if state.matches(&record) {
                        state.mark_everywhere(&record.query);
                    }
                }
                *entry = AssessorState::Ready(state);
            }
            None => {
                guard.assessors.remove(assessor);
            }
        }
    }

    fn choose_scoped(&self, assessor: &str, set: Option<&str>) -> StorageResult<Option<String>> {
        let (Some(first), Some(second)) = (
            self.preferences.first_profile(),
            self.preferences.second_profile(),
        ) else {
            debug!(assessor, "Profile pair incomplete, choosing at random");
            return self.fallback_choice(set);
        };
        let active = match set {
            Some(_) => Vec::new(),
            None => self.queries.active_names(),
        };

        for _ in 0..MAX_CHOOSE_ATTEMPTS {
            match self.plan(assessor, set, &active, (&first.name, &second.name)) {
                Plan::Picked(query) => {
                    debug!(assessor, query = %query, "Chose unjudged query");
                    return Ok(Some(query));
                }
                Plan::Fallback => {
                    debug!(assessor, "Nothing unjudged left, choosing at random");
                    return self.fallback_choice(set);
                }
                Plan::Build { generation } => {
                    let built = self.build(assessor)?;
                    let incomplete = built.is_none();
                    self.install(assessor, generation, built);
                    if incomplete {
                        debug!(assessor, "Profile pair incomplete, choosing at random");
                        return self.fallback_choice(set);
                    }
                }
            }
        }

        warn!(assessor, "Judged state kept being invalidated, choosing at random");
        self.fallback_choice(set)
    }

    fn fallback_choice(&self, set: Option<&str>) -> StorageResult<Option<String>> {
        match set {
            Some(set) => self.fallback.choose_in(set),
            None => self.fallback.choose_any(),
        }
    }

    fn for_each_ready(&self, f: impl Fn(&mut JudgedState)) {
        let mut guard = self.state.lock();
        for entry in guard.assessors.values_mut() {
            if let AssessorState::Ready(state) = &mut *entry {
                f(state);
            }
        }
        guard.generation += 1;
    }
}

impl<P, Q, J> QueryChooser for UnjudgedQueryChooser<P, Q, J>
where
    P: PreferencesStore + Sync,
    Q: QueryStore + Clone + Sync,
    J: JudgmentStore + Sync,
{
    fn choose(&self, assessor: &str) -> StorageResult<Option<String>> {
        if !self.queries.is_preferring_unjudged() {
            return self.fallback.choose_any();
        }
        self.choose_scoped(assessor, None)
    }

    fn choose_from(&self, assessor: &str, set: &str) -> StorageResult<Option<String>> {
        if self.queries.size(set).is_none() {
            return Ok(None);
        }
        if !self.queries.is_preferring_unjudged() {
            return self.fallback.choose_in(set);
        }
        self.choose_scoped(assessor, Some(set))
    }
}

impl<P, Q, J> StorageListener for UnjudgedQueryChooser<P, Q, J>
where
    P: PreferencesStore + Sync,
    Q: QueryStore + Clone + Sync,
    J: JudgmentStore + Sync,
{
    fn judgment_added(&self, assessor: &str, record: &JudgmentRecord) {
        let mut guard = self.state.lock();
        let Some(entry) = guard.assessors.get_mut(assessor) else {
            return;
        };
        match &mut *entry {
            AssessorState::Ready(state) => {
                if state.matches(record) && state.mark_judged(&record.query) == MarkOutcome::Overflow
                {
                    debug!(assessor, "Unresolved queue overflowed, rebuilding on next choice");
                    *entry = AssessorState::PendingReinit;
                }
            }
            AssessorState::Building(missed) => {
                if missed.len() >= UNRESOLVED_QUEUE_CAPACITY {
                    *entry = AssessorState::PendingReinit;
                } else {
                    missed.push(record.clone());
                }
            }
            AssessorState::PendingReinit => {}
        }
    }

    fn assessors_removed(&self, assessors: &BTreeSet<String>) {
        let mut guard = self.state.lock();
        for assessor in assessors {
            guard.assessors.remove(assessor);
        }
        guard.generation += 1;
    }

    fn query_set_created(&self, _name: &str) {
        self.invalidate_all();
    }

    fn query_set_removed(&self, name: &str) {
        self.for_each_ready(|state| state.remove_set(name));
    }

    fn query_set_renamed(&self, old: &str, new: &str) {
        self.for_each_ready(|state| state.rename_set(old, new));
    }

    fn query_sets_reloaded(&self) {
        self.invalidate_all();
    }

    fn prefer_unjudged_changed(&self, _prefer: bool) {
        self.invalidate_all();
    }

    fn profiles_changed(&self) {
        self.invalidate_all();
    }
}

impl<P, Q, J> std::fmt::Debug for UnjudgedQueryChooser<P, Q, J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.state.lock();
        f.debug_struct("UnjudgedQueryChooser")
            .field("assessors", &guard.assessors.len())
            .field("generation", &guard.generation)
            .finish_non_exhaustive()
    }
}

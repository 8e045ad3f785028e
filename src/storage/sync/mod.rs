//! Cloneable, lock-protected store handles.


use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::StorageResult;
use super::store::{JudgmentStore, PreferencesStore, QueryStore};
use crate::model::{
    JudgmentRecord, QueryList, ResultPairHandle, ResultPrefs, ResultSnapshot, ScoringProfile,
};

/// Shared handle that runs every store operation under the store's own lock.
///
/// Clones share the store. The lock is never exposed; [`Synchronized::with`] runs a
/// closure under it for operations outside the store traits.
pub struct Synchronized<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Synchronized<S> {
    #[inline]
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Runs `f` with exclusive access to the wrapped store.
    ///
    /// `f` must not call back into a handle of the same store.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Number of live handles sharing the store.
    #[inline]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<S> Clone for Synchronized<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for Synchronized<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronized")
            .field("strong_count", &self.strong_count())
            .finish()
    }
}

impl<S: PreferencesStore> PreferencesStore for Synchronized<S> {
    fn add_profile(&mut self, profile: ScoringProfile) -> StorageResult<bool> {
        self.inner.lock().add_profile(profile)
    }

    fn remove_profile(&mut self, name: &str) -> StorageResult<bool> {
        self.inner.lock().remove_profile(name)
    }

    fn profile(&self, name: &str) -> Option<ScoringProfile> {
        self.inner.lock().profile(name)
    }

    fn profiles(&self) -> Vec<ScoringProfile> {
        self.inner.lock().profiles()
    }

    fn first_profile(&self) -> Option<ScoringProfile> {
        self.inner.lock().first_profile()
    }

    fn second_profile(&self) -> Option<ScoringProfile> {
        self.inner.lock().second_profile()
    }

    fn set_first_profile(&mut self, name: &str) -> StorageResult<bool> {
        self.inner.lock().set_first_profile(name)
    }

    fn set_second_profile(&mut self, name: &str) -> StorageResult<bool> {
        self.inner.lock().set_second_profile(name)
    }

    fn has_password(&self) -> bool {
        self.inner.lock().has_password()
    }

    fn check_password(&self, password: &str) -> bool {
        self.inner.lock().check_password(password)
    }

    fn set_password(&mut self, password: &str, hint: &str) -> StorageResult<()> {
        self.inner.lock().set_password(password, hint)
    }

    fn password_hint(&self) -> Option<String> {
        self.inner.lock().password_hint()
    }

    fn administrators(&self) -> BTreeSet<String> {
        self.inner.lock().administrators()
    }

    fn set_administrators(&mut self, administrators: BTreeSet<String>) -> StorageResult<()> {
        self.inner.lock().set_administrators(administrators)
    }

    fn is_administrator(&self, name: &str) -> bool {
        self.inner.lock().is_administrator(name)
    }
}

impl<S: QueryStore> QueryStore for Synchronized<S> {
    fn create(&mut self, name: &str, queries: &[String]) -> StorageResult<bool> {
        self.inner.lock().create(name, queries)
    }

    fn rename(&mut self, old: &str, new: &str) -> StorageResult<bool> {
        self.inner.lock().rename(old, new)
    }

    fn remove(&mut self, name: &str) -> StorageResult<bool> {
        self.inner.lock().remove(name)
    }

    fn get(&self, name: &str) -> StorageResult<Option<QueryList>> {
        self.inner.lock().get(name)
    }

    fn size(&self, name: &str) -> Option<usize> {
        self.inner.lock().size(name)
    }

    fn names(&self) -> Vec<String> {
        self.inner.lock().names()
    }

    fn active_names(&self) -> Vec<String> {
        self.inner.lock().active_names()
    }

    fn is_active(&self, name: &str) -> bool {
        self.inner.lock().is_active(name)
    }

    fn set_active(&mut self, name: &str, active: bool) -> StorageResult<bool> {
        self.inner.lock().set_active(name, active)
    }

    fn is_preferring_unjudged(&self) -> bool {
        self.inner.lock().is_preferring_unjudged()
    }

    fn set_preferring_unjudged(&mut self, prefer: bool) -> StorageResult<()> {
        self.inner.lock().set_preferring_unjudged(prefer)
    }

    fn is_showing_sets(&self) -> bool {
        self.inner.lock().is_showing_sets()
    }

    fn set_showing_sets(&mut self, show: bool) -> StorageResult<()> {
        self.inner.lock().set_showing_sets(show)
    }

    fn reload(&mut self) -> StorageResult<()> {
        self.inner.lock().reload()
    }
}

impl<S: JudgmentStore> JudgmentStore for Synchronized<S> {
    fn append(
        &mut self,
        assessor: &str,
        record: JudgmentRecord,
        first: Option<&ResultSnapshot>,
        second: Option<&ResultSnapshot>,
    ) -> StorageResult<JudgmentRecord> {
        self.inner.lock().append(assessor, record, first, second)
    }

    fn list(&self, assessor: &str) -> StorageResult<Vec<JudgmentRecord>> {
        self.inner.lock().list(assessor)
    }

    fn list_for_query(&self, assessor: &str, query: &str) -> StorageResult<Vec<JudgmentRecord>> {
        self.inner.lock().list_for_query(assessor, query)
    }

    fn assessors(&self) -> BTreeSet<String> {
        self.inner.lock().assessors()
    }

    fn remove_assessors(&mut self, assessors: &BTreeSet<String>) -> StorageResult<bool> {
        self.inner.lock().remove_assessors(assessors)
    }

    fn result_pair(
        &self,
        handle: &ResultPairHandle,
    ) -> StorageResult<Option<(ResultSnapshot, ResultSnapshot)>> {
        self.inner.lock().result_pair(handle)
    }

    fn result_prefs(&self) -> ResultPrefs {
        self.inner.lock().result_prefs()
    }

    fn set_result_prefs(&mut self, prefs: ResultPrefs) -> StorageResult<()> {
        self.inner.lock().set_result_prefs(prefs)
    }
}

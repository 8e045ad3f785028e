//! Change notification for the outermost storage layer.
//!
//! [`Observed`] forwards every call and, after a mutation succeeds, tells its
//! [`StorageListener`]. Wrap it around [`crate::storage::Synchronized`] so the
//! store's lock has already been released when the listener runs.
//!
//! Settings writes are reported even when they store the value already there:
//! comparing against a value read under a separate lock acquisition can miss a
//! concurrent change in between.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::StorageResult;
use super::store::{JudgmentStore, PreferencesStore, QueryStore};
use crate::model::{
    JudgmentRecord, QueryList, ResultPairHandle, ResultPrefs, ResultSnapshot, ScoringProfile,
};

/// Receives successful storage mutations. Every method defaults to doing nothing.
pub trait StorageListener: Send + Sync {
    fn judgment_added(&self, _assessor: &str, _record: &JudgmentRecord) {}

    fn assessors_removed(&self, _assessors: &BTreeSet<String>) {}

    fn query_set_created(&self, _name: &str) {}

    fn query_set_removed(&self, _name: &str) {}

    fn query_set_renamed(&self, _old: &str, _new: &str) {}

    fn query_sets_reloaded(&self) {}

    fn prefer_unjudged_changed(&self, _prefer: bool) {}

    /// The active profile pair changed.
    fn profiles_changed(&self) {}
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl StorageListener for NoopListener {}

/// Store decorator that reports successful mutations.
#[derive(Clone)]
pub struct Observed<S> {
    inner: S,
    listener: Arc<dyn StorageListener>,
}

impl<S> Observed<S> {
    pub fn new(inner: S, listener: Arc<dyn StorageListener>) -> Self {
        Self { inner, listener }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> std::fmt::Debug for Observed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observed").finish_non_exhaustive()
    }
}

impl<S: PreferencesStore> PreferencesStore for Observed<S> {
    fn add_profile(&mut self, profile: ScoringProfile) -> StorageResult<bool> {
        self.inner.add_profile(profile)
    }

    fn remove_profile(&mut self, name: &str) -> StorageResult<bool> {
        let removed = self.inner.remove_profile(name)?;
        if removed {
            self.listener.profiles_changed();
        }
        Ok(removed)
    }

    fn profile(&self, name: &str) -> Option<ScoringProfile> {
        self.inner.profile(name)
    }

    fn profiles(&self) -> Vec<ScoringProfile> {
        self.inner.profiles()
    }

    fn first_profile(&self) -> Option<ScoringProfile> {
        self.inner.first_profile()
    }

    fn second_profile(&self) -> Option<ScoringProfile> {
        self.inner.second_profile()
    }

    fn set_first_profile(&mut self, name: &str) -> StorageResult<bool> {
        let set = self.inner.set_first_profile(name)?;
        if set {
            self.listener.profiles_changed();
        }
        Ok(set)
    }

    fn set_second_profile(&mut self, name: &str) -> StorageResult<bool> {
        let set = self.inner.set_second_profile(name)?;
        if set {
            self.listener.profiles_changed();
        }
        Ok(set)
    }

    fn has_password(&self) -> bool {
        self.inner.has_password()
    }

    fn check_password(&self, password: &str) -> bool {
        self.inner.check_password(password)
    }

    fn set_password(&mut self, password: &str, hint: &str) -> StorageResult<()> {
        self.inner.set_password(password, hint)
    }

    fn password_hint(&self) -> Option<String> {
        self.inner.password_hint()
    }

    fn administrators(&self) -> BTreeSet<String> {
        self.inner.administrators()
    }

    fn set_administrators(&mut self, administrators: BTreeSet<String>) -> StorageResult<()> {
        self.inner.set_administrators(administrators)
    }

    fn is_administrator(&self, name: &str) -> bool {
        self.inner.is_administrator(name)
    }
}

impl<S: QueryStore> QueryStore for Observed<S> {
    fn create(&mut self, name: &str, queries: &[String]) -> StorageResult<bool> {
        let created = self.inner.create(name, queries)?;
        if created {
            self.listener.query_set_created(name);
        }
        Ok(created)
    }

    fn rename(&mut self, old: &str, new: &str) -> StorageResult<bool> {
        let renamed = self.inner.rename(old, new)?;
        if renamed && old != new {
            self.listener.query_set_renamed(old, new);
        }
        Ok(renamed)
    }

    fn remove(&mut self, name: &str) -> StorageResult<bool> {
        let removed = self.inner.remove(name)?;
        if removed {
            self.listener.query_set_removed(name);
        }
        Ok(removed)
    }

    fn get(&self, name: &str) -> StorageResult<Option<QueryList>> {
        self.inner.get(name)
    }

    fn size(&self, name: &str) -> Option<usize> {
        self.inner.size(name)
    }

    fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    fn active_names(&self) -> Vec<String> {
        self.inner.active_names()
    }

    fn is_active(&self, name: &str) -> bool {
        self.inner.is_active(name)
    }

    fn set_active(&mut self, name: &str, active: bool) -> StorageResult<bool> {
        self.inner.set_active(name, active)
    }

    fn is_preferring_unjudged(&self) -> bool {
        self.inner.is_preferring_unjudged()
    }

    fn set_preferring_unjudged(&mut self, prefer: bool) -> StorageResult<()> {
        self.inner.set_preferring_unjudged(prefer)?;
        self.listener.prefer_unjudged_changed(prefer);
        Ok(())
    }

    fn is_showing_sets(&self) -> bool {
        self.inner.is_showing_sets()
    }

    fn set_showing_sets(&mut self, show: bool) -> StorageResult<()> {
        self.inner.set_showing_sets(show)
    }

    fn reload(&mut self) -> StorageResult<()> {
        let result = self.inner.reload();
        // Even a failed reload may have replaced part of the in-memory view.
        self.listener.query_sets_reloaded();
        result
    }
}

impl<S: JudgmentStore> JudgmentStore for Observed<S> {
    fn append(
        &mut self,
        assessor: &str,
        record: JudgmentRecord,
        first: Option<&ResultSnapshot>,
        second: Option<&ResultSnapshot>,
    ) -> StorageResult<JudgmentRecord> {
        let appended = self.inner.append(assessor, record, first, second)?;
        self.listener.judgment_added(assessor, &appended);
        Ok(appended)
    }

    fn list(&self, assessor: &str) -> StorageResult<Vec<JudgmentRecord>> {
        self.inner.list(assessor)
    }

    fn list_for_query(&self, assessor: &str, query: &str) -> StorageResult<Vec<JudgmentRecord>> {
        self.inner.list_for_query(assessor, query)
    }

    fn assessors(&self) -> BTreeSet<String> {
        self.inner.assessors()
    }

    fn remove_assessors(&mut self, assessors: &BTreeSet<String>) -> StorageResult<bool> {
        let present: BTreeSet<String> = self
            .inner
            .assessors()
            .intersection(assessors)
            .cloned()
            .collect();
        let removed = self.inner.remove_assessors(assessors);
        if !present.is_empty() {
            // Notify on failure too: some of the logs may already be gone.
            self.listener.assessors_removed(&present);
        }
        removed
    }

    fn result_pair(
        &self,
        handle: &ResultPairHandle,
    ) -> StorageResult<Option<(ResultSnapshot, ResultSnapshot)>> {
        self.inner.result_pair(handle)
    }

    fn result_prefs(&self) -> ResultPrefs {
        self.inner.result_prefs()
    }

    fn set_result_prefs(&mut self, prefs: ResultPrefs) -> StorageResult<()> {
        self.inner.set_result_prefs(prefs)
    }
}

/// One notification captured by [`RecordingListener`].
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    JudgmentAdded { assessor: String, query: String },
    AssessorsRemoved(BTreeSet<String>),
    QuerySetCreated(String),
    QuerySetRemoved(String),
    QuerySetRenamed { old: String, new: String },
    QuerySetsReloaded,
    PreferUnjudgedChanged(bool),
    ProfilesChanged,
}

/// Listener that records every notification, for tests.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: parking_lot::Mutex<Vec<StorageEvent>>,
}

#[cfg(any(test, feature = "mock"))]
impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StorageEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<StorageEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: StorageEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(any(test, feature = "mock"))]
impl StorageListener for RecordingListener {
    fn judgment_added(&self, assessor: &str, record: &JudgmentRecord) {
        self.push(StorageEvent::JudgmentAdded {
            assessor: assessor.to_string(),
            query: record.query.clone(),
        });
    }

    fn assessors_removed(&self, assessors: &BTreeSet<String>) {
        self.push(StorageEvent::AssessorsRemoved(assessors.clone()));
    }

    fn query_set_created(&self, name: &str) {
        self.push(StorageEvent::QuerySetCreated(name.to_string()));
    }

    fn query_set_removed(&self, name: &str) {
        self.push(StorageEvent::QuerySetRemoved(name.to_string()));
    }

    fn query_set_renamed(&self, old: &str, new: &str) {
        self.push(StorageEvent::QuerySetRenamed {
            old: old.to_string(),
            new: new.to_string(),
        });
    }

    fn query_sets_reloaded(&self) {
        self.push(StorageEvent::QuerySetsReloaded);
    }

    fn prefer_unjudged_changed(&self, prefer: bool) {
        self.push(StorageEvent::PreferUnjudgedChanged(prefer));
    }

    fn profiles_changed(&self) {
        self.push(StorageEvent::ProfilesChanged);
    }
}

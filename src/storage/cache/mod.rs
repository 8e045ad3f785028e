//! Bounded LRU read caches in front of the query and judgment stores.
//!
//! Both decorators are write-through: a mutation goes to the wrapped store first and
//! only then updates or evicts the affected cache entries, so a reader that follows a
//! writer through the same handle always sees the write. Place them inside
//! [`crate::storage::Synchronized`] so the cache and the files change under one lock.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use super::error::StorageResult;
use super::store::{JudgmentStore, QueryStore};
use crate::constants::{
    DEFAULT_JUDGMENT_CACHE_CAPACITY, DEFAULT_QUERY_CACHE_CAPACITY, DEFAULT_RESULT_CACHE_CAPACITY,
};
use crate::model::{JudgmentRecord, QueryList, ResultPairHandle, ResultPrefs, ResultSnapshot};

/// Entry limits for every cache the storage stack builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCapacities {
    /// Query sets held by [`CachingQueryStore`].
    pub query_sets: u64,
    /// Assessor logs held by [`CachingJudgmentStore`].
    pub judgment_logs: u64,
    /// Snapshot pairs held by [`CachingJudgmentStore`].
    pub result_pairs: u64,
}

impl Default for CacheCapacities {
    fn default() -> Self {
        Self {
            query_sets: DEFAULT_QUERY_CACHE_CAPACITY,
            judgment_logs: DEFAULT_JUDGMENT_CACHE_CAPACITY,
            result_pairs: DEFAULT_RESULT_CACHE_CAPACITY,
        }
    }
}

fn lru<K, V>(capacity: u64) -> Cache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(capacity)
        .eviction_policy(EvictionPolicy::lru())
        .build()
}

/// Caches query lists by set name.
pub struct CachingQueryStore<S> {
    inner: S,
    lists: Cache<String, QueryList>,
}

impl<S: QueryStore> CachingQueryStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_QUERY_CACHE_CAPACITY)
    }

    pub fn with_capacity(inner: S, capacity: u64) -> Self {
        Self {
            inner,
            lists: lru(capacity),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Sets currently cached. Call [`Self::run_pending_tasks`] first for an exact count.
    pub fn cached_sets(&self) -> u64 {
        self.lists.entry_count()
    }

    pub fn run_pending_tasks(&self) {
        self.lists.run_pending_tasks();
    }
}

impl<S> std::fmt::Debug for CachingQueryStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingQueryStore")
            .field("cached_sets", &self.lists.entry_count())
            .finish()
    }
}

impl<S: QueryStore> QueryStore for CachingQueryStore<S> {
    fn create(&mut self, name: &str, queries: &[String]) -> StorageResult<bool> {
        let created = self.inner.create(name, queries)?;
        if created {
            self.lists.invalidate(name);
        }
        Ok(created)
    }

    fn rename(&mut self, old: &str, new: &str) -> StorageResult<bool> {
        let renamed = self.inner.rename(old, new)?;
        if renamed && old != new {
            let moved = self.lists.remove(old);
            self.lists.invalidate(new);
            if let Some(list) = moved {
                self.lists.insert(new.to_string(), list);
            }
        }
        Ok(renamed)
    }

    fn remove(&mut self, name: &str) -> StorageResult<bool> {
        let removed = self.inner.remove(name)?;
        if removed {
            self.lists.invalidate(name);
        }
        Ok(removed)
    }

    fn get(&self, name: &str) -> StorageResult<Option<QueryList>> {
        if let Some(list) = self.lists.get(name) {
            return Ok(Some(list));
        }
        let list = self.inner.get(name)?;
        if let Some(list) = &list {
            self.lists.insert(name.to_string(), list.clone());
        }
        Ok(list)
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
        self.inner.set_preferring_unjudged(prefer)
    }

    fn is_showing_sets(&self) -> bool {
        self.inner.is_showing_sets()
    }

    fn set_showing_sets(&mut self, show: bool) -> StorageResult<()> {
        self.inner.set_showing_sets(show)
    }

    fn reload(&mut self) -> StorageResult<()> {
        let result = self.inner.reload();
        self.lists.invalidate_all();
        debug!("Query set cache cleared");
        result
    }
}

/// Caches each assessor's judgment log and recently viewed snapshot pairs.
pub struct CachingJudgmentStore<S> {
    inner: S,
    logs: Cache<String, Arc<Vec<JudgmentRecord>>>,
    pairs: Cache<ResultPairHandle, (ResultSnapshot, ResultSnapshot)>,
}

impl<S: JudgmentStore> CachingJudgmentStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacities(
            inner,
            DEFAULT_JUDGMENT_CACHE_CAPACITY,
            DEFAULT_RESULT_CACHE_CAPACITY,
        )
    }

    pub fn with_capacities(inner: S, logs: u64, pairs: u64) -> Self {
        Self {
            inner,
            logs: lru(logs),
            pairs: lru(pairs),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn cached_logs(&self) -> u64 {
        self.logs.entry_count()
    }

    pub fn cached_pairs(&self) -> u64 {
        self.pairs.entry_count()
    }

    pub fn run_pending_tasks(&self) {
        self.logs.run_pending_tasks();
        self.pairs.run_pending_tasks();
    }
}

impl<S> std::fmt::Debug for CachingJudgmentStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingJudgmentStore")
            .field("cached_logs", &self.logs.entry_count())
            .field("cached_pairs", &self.pairs.entry_count())
            .finish()
    }
}

impl<S: JudgmentStore> JudgmentStore for CachingJudgmentStore<S> {
    fn append(
        &mut self,
        assessor: &str,
        record: JudgmentRecord,
        first: Option<&ResultSnapshot>,
        second: Option<&ResultSnapshot>,
    ) -> StorageResult<JudgmentRecord> {
        let appended = match self.inner.append(assessor, record, first, second) {
            Ok(appended) => appended,
            Err(e) => {
                // The log may or may not have grown; reread it next time.
                self.logs.invalidate(assessor);
                return Err(e);
            }
        };

        if let Some(cached) = self.logs.get(assessor) {
            let mut records = Vec::with_capacity(cached.len() + 1);
            records.extend(cached.iter().cloned());
            records.push(appended.clone());
            self.logs.insert(assessor.to_string(), Arc::new(records));
        }
        if let (Some(handle), Some(first), Some(second)) = (appended.handle, first, second) {
            self.pairs.insert(handle, (first.clone(), second.clone()));
        }
        Ok(appended)
    }

    fn list(&self, assessor: &str) -> StorageResult<Vec<JudgmentRecord>> {
        if let Some(records) = self.logs.get(assessor) {
            return Ok(records.as_ref().clone());
        }
        let records = self.inner.list(assessor)?;
        self.logs
            .insert(assessor.to_string(), Arc::new(records.clone()));
        Ok(records)
    }

    fn assessors(&self) -> BTreeSet<String> {
        self.inner.assessors()
    }

    fn remove_assessors(&mut self, assessors: &BTreeSet<String>) -> StorageResult<bool> {
        let result = self.inner.remove_assessors(assessors);
        for name in assessors {
            self.logs.invalidate(name.as_str());
        }
        // Compaction may have dropped snapshots behind any cached pair.
        self.pairs.invalidate_all();
        result
    }

    fn result_pair(
        &self,
        handle: &ResultPairHandle,
    ) -> StorageResult<Option<(ResultSnapshot, ResultSnapshot)>> {
        if let Some(pair) = self.pairs.get(handle) {
            return Ok(Some(pair));
        }
        let pair = self.inner.result_pair(handle)?;
        if let Some(pair) = &pair {
            self.pairs.insert(*handle, pair.clone());
        }
        Ok(pair)
    }

    fn result_prefs(&self) -> ResultPrefs {
        self.inner.result_prefs()
    }

    fn set_result_prefs(&mut self, prefs: ResultPrefs) -> StorageResult<()> {
        self.inner.set_result_prefs(prefs)
    }
}

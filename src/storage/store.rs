//! Store contracts shared by the text stores and every decorator.
//!
//! Readers take `&self`, mutators take `&mut self`. Sharing across threads is the
//! job of [`crate::storage::Synchronized`], a cloneable handle that implements the
//! same traits under a per-store lock.

use std::collections::BTreeSet;

use super::error::StorageResult;
use crate::model::{
    JudgmentRecord, QueryList, ResultPairHandle, ResultPrefs, ResultSnapshot, ScoringProfile,
};

/// Scoring profiles, the active comparison pair, admin password and administrators.
pub trait PreferencesStore: Send {
    /// Adds a profile. `false` if one with the same name exists.
    fn add_profile(&mut self, profile: ScoringProfile) -> StorageResult<bool>;

    /// Removes a profile, clearing any active slot that referenced it.
    fn remove_profile(&mut self, name: &str) -> StorageResult<bool>;

    fn profile(&self, name: &str) -> Option<ScoringProfile>;

    fn profiles(&self) -> Vec<ScoringProfile>;

    fn first_profile(&self) -> Option<ScoringProfile>;

    fn second_profile(&self) -> Option<ScoringProfile>;

    /// `false` if no profile is called `name`.
    fn set_first_profile(&mut self, name: &str) -> StorageResult<bool>;

    /// `false` if no profile is called `name`.
    fn set_second_profile(&mut self, name: &str) -> StorageResult<bool>;

    fn has_password(&self) -> bool;

    /// `false` when no password has been set.
    fn check_password(&self, password: &str) -> bool;

    /// Rotates the password with a fresh salt.
    fn set_password(&mut self, password: &str, hint: &str) -> StorageResult<()>;

    fn password_hint(&self) -> Option<String>;

    fn administrators(&self) -> BTreeSet<String>;

    fn set_administrators(&mut self, administrators: BTreeSet<String>) -> StorageResult<()>;

    fn is_administrator(&self, name: &str) -> bool {
        self.administrators().contains(name)
    }
}

/// Named benchmark query sets and the flags that steer query selection.
pub trait QueryStore: Send {
    /// Creates an active set. `false` if the name is taken or empty.
    fn create(&mut self, name: &str, queries: &[String]) -> StorageResult<bool>;

    /// `false` if `old` is missing or `new` is taken; renaming to itself succeeds.
    fn rename(&mut self, old: &str, new: &str) -> StorageResult<bool>;

    fn remove(&mut self, name: &str) -> StorageResult<bool>;

    fn get(&self, name: &str) -> StorageResult<Option<QueryList>>;

    /// Cached size; never reads the set file.
    fn size(&self, name: &str) -> Option<usize>;

    /// All set names, sorted.
    fn names(&self) -> Vec<String>;

    /// Active set names, sorted.
    fn active_names(&self) -> Vec<String>;

    fn is_active(&self, name: &str) -> bool;

    /// `false` if the set does not exist.
    fn set_active(&mut self, name: &str, active: bool) -> StorageResult<bool>;

    fn is_preferring_unjudged(&self) -> bool;

    fn set_preferring_unjudged(&mut self, prefer: bool) -> StorageResult<()>;

    fn is_showing_sets(&self) -> bool;

    fn set_showing_sets(&mut self, show: bool) -> StorageResult<()>;

    /// Rescans the backing directory, picking up sets changed outside this store.
    fn reload(&mut self) -> StorageResult<()>;
}

/// Per-assessor append-only judgment logs and the snapshots they cite.
pub trait JudgmentStore: Send {
    /// Appends `record` to `assessor`'s log.
    ///
    /// When both snapshots are given they are stored and the returned record carries
    /// their handle; otherwise the returned record has no handle. Any handle already
    /// on `record` is ignored.
    fn append(
        &mut self,
        assessor: &str,
        record: JudgmentRecord,
        first: Option<&ResultSnapshot>,
        second: Option<&ResultSnapshot>,
    ) -> StorageResult<JudgmentRecord>;

    /// The assessor's records in submission order; empty for unknown assessors.
    fn list(&self, assessor: &str) -> StorageResult<Vec<JudgmentRecord>>;

    fn list_for_query(&self, assessor: &str, query: &str) -> StorageResult<Vec<JudgmentRecord>> {
        let mut records = self.list(assessor)?;
        records.retain(|r| r.query == query);
        Ok(records)
    }

    fn assessors(&self) -> BTreeSet<String>;

    /// Deletes the named assessors' logs and releases their saved snapshots.
    /// Returns whether any assessor was removed.
    fn remove_assessors(&mut self, assessors: &BTreeSet<String>) -> StorageResult<bool>;

    /// Both snapshots behind `handle`, or `None` if either is not (or no longer) stored.
    fn result_pair(
        &self,
        handle: &ResultPairHandle,
    ) -> StorageResult<Option<(ResultSnapshot, ResultSnapshot)>>;

    fn result_prefs(&self) -> ResultPrefs;

    fn set_result_prefs(&mut self, prefs: ResultPrefs) -> StorageResult<()>;
}

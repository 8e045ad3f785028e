//! One storage root and the three stores opened under it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use super::atomic::remove_if_exists;
use super::cache::{CacheCapacities, CachingJudgmentStore, CachingQueryStore};
use super::error::StorageResult;
use super::judgments::TextJudgmentStore;
use super::observed::{Observed, StorageListener};
use super::prefs::TextPreferencesStore;
use super::queries::TextQueryStore;
use super::sync::Synchronized;
use crate::constants::{PREFS_FILE, QUERIES_DIR, RESULTS_FILE, RESULT_PREFS_FILE, USERS_DIR};

/// Preferences are fully memory-resident already, so they are not cached again.
pub type ManagedPreferencesStore = Synchronized<TextPreferencesStore>;
pub type ManagedQueryStore = Synchronized<CachingQueryStore<TextQueryStore>>;
pub type ManagedJudgmentStore = Synchronized<CachingJudgmentStore<TextJudgmentStore>>;

/// Owns the storage root and one handle to each store.
#[derive(Debug, Clone)]
pub struct StorageManager<P, Q, J> {
    root: PathBuf,
    preferences: P,
    queries: Q,
    judgments: J,
}

impl StorageManager<ManagedPreferencesStore, ManagedQueryStore, ManagedJudgmentStore> {
    /// Opens (creating as needed) the cached, synchronized stores under `root`.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn open(root: &Path, capacities: CacheCapacities) -> StorageResult<Self> {
        fs::create_dir_all(root)?;

        let preferences = Synchronized::new(TextPreferencesStore::open(root)?);
        let queries = Synchronized::new(CachingQueryStore::with_capacity(
            TextQueryStore::open(root)?,
            capacities.query_sets,
        ));
        let judgments = Synchronized::new(CachingJudgmentStore::with_capacities(
            TextJudgmentStore::open(root)?,
            capacities.judgment_logs,
            capacities.result_pairs,
        ));

        info!("Storage opened");
        Ok(Self::from_parts(root, preferences, queries, judgments))
    }
}

impl<P, Q, J> StorageManager<P, Q, J> {
    pub fn from_parts(root: &Path, preferences: P, queries: Q, judgments: J) -> Self {
        Self {
            root: root.to_path_buf(),
            preferences,
            queries,
            judgments,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preferences(&self) -> &P {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut P {
        &mut self.preferences
    }

    pub fn queries(&self) -> &Q {
        &self.queries
    }

    pub fn queries_mut(&mut self) -> &mut Q {
        &mut self.queries
    }

    pub fn judgments(&self) -> &J {
        &self.judgments
    }

    pub fn judgments_mut(&mut self) -> &mut J {
        &mut self.judgments
    }

    /// Wraps every store so `listener` hears about its mutations.
    pub fn observe(
        self,
        listener: Arc<dyn StorageListener>,
    ) -> StorageManager<Observed<P>, Observed<Q>, Observed<J>> {
        StorageManager {
            root: self.root,
            preferences: Observed::new(self.preferences, Arc::clone(&listener)),
            queries: Observed::new(self.queries, Arc::clone(&listener)),
            judgments: Observed::new(self.judgments, listener),
        }
    }

    /// Deletes everything the stores created under the root, leaving the root itself.
    ///
    /// Consumes the manager; other handles to the same stores are left describing
    /// files that no longer exist.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn delete_all(self) -> StorageResult<()> {
        let root = self.root;
        drop((self.preferences, self.queries, self.judgments));

        for file in [PREFS_FILE, RESULTS_FILE, RESULT_PREFS_FILE] {
            remove_if_exists(&root.join(file))?;
        }
        for dir in [QUERIES_DIR, USERS_DIR] {
            match fs::remove_dir_all(root.join(dir)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!("Storage deleted");
        Ok(())
    }
}

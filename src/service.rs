//! The assembled storage stack with its query chooser attached.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::chooser::{QueryChooser, UnjudgedQueryChooser};
use crate::config::Config;
use crate::model::{JudgmentRecord, ResultSnapshot};
use crate::storage::{
    JudgmentStore, ManagedJudgmentStore, ManagedPreferencesStore, ManagedQueryStore, Observed,
    StorageManager, StorageResult,
};

pub type EvaluationStorage = StorageManager<
    Observed<ManagedPreferencesStore>,
    Observed<ManagedQueryStore>,
    Observed<ManagedJudgmentStore>,
>;

pub type EvaluationChooser =
    UnjudgedQueryChooser<ManagedPreferencesStore, ManagedQueryStore, ManagedJudgmentStore>;

/// Storage opened under one root, observed by an unjudged-query chooser.
///
/// Clones share the stores and the chooser. Mutate through [`EvaluationService::storage_mut`]
/// or cloned store handles; either way the chooser hears about it.
#[derive(Debug, Clone)]
pub struct EvaluationService {
    storage: EvaluationStorage,
    chooser: Arc<EvaluationChooser>,
}

impl EvaluationService {
    #[instrument(skip_all, fields(root = %config.storage_path.display()))]
    pub fn open(config: &Config) -> StorageResult<Self> {
        let storage = StorageManager::open(&config.storage_path, config.cache_capacities())?;
        let chooser = Arc::new(UnjudgedQueryChooser::new(
            storage.preferences().clone(),
            storage.queries().clone(),
            storage.judgments().clone(),
            config.chooser_seed,
        ));
        let storage = storage.observe(chooser.clone());

        info!(seeded = config.chooser_seed.is_some(), "Evaluation service ready");
        Ok(Self { storage, chooser })
    }

    pub fn storage(&self) -> &EvaluationStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut EvaluationStorage {
        &mut self.storage
    }

    pub fn chooser(&self) -> &Arc<EvaluationChooser> {
        &self.chooser
    }

    /// Next query for `assessor`, from `set` when given.
    pub fn next_query(&self, assessor: &str, set: Option<&str>) -> StorageResult<Option<String>> {
        match set {
            Some(set) => self.chooser.choose_from(assessor, set),
            None => self.chooser.choose(assessor),
        }
    }

    /// Records a judgment, saving both snapshots when given.
    pub fn submit(
        &mut self,
        assessor: &str,
        record: JudgmentRecord,
        snapshots: Option<(&ResultSnapshot, &ResultSnapshot)>,
    ) -> StorageResult<JudgmentRecord> {
        let (first, second) = snapshots.unzip();
        self.storage
            .judgments_mut()
            .append(assessor, record, first, second)
    }

    /// Consumes the service and deletes every file it created.
    pub fn delete_all(self) -> StorageResult<()> {
        self.chooser.invalidate_all();
        self.storage.delete_all()
    }
}

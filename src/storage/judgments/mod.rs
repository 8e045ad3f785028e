//! Per-assessor judgment logs backed by the shared result store.
//!
//! Each assessor owns one append-only file under `users/`, named by the encoded
//! assessor name. Records are never rewritten; removing an assessor deletes the
//! whole file and releases every snapshot it cited.


use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::atomic::{remove_if_exists, replace_file};
use super::error::{StorageError, StorageResult};
use super::results::ResultStore;
use super::store::JudgmentStore;
use crate::constants::{RESULTS_FILE, RESULT_PREFS_FILE, USERS_DIR};
use crate::format::{decode_file_name, encode_file_name, KvReader, KvWriter};
use crate::hashing::{Blake3Hasher, ContentHasher, Digest};
use crate::model::{JudgmentRecord, ResultPairHandle, ResultPrefs, ResultSnapshot};

/// Judgment logs plus the result store their handles point into.
#[derive(Debug)]
pub struct TextJudgmentStore {
    users_dir: PathBuf,
    result_prefs_path: PathBuf,
    results: ResultStore,
    assessors: BTreeSet<String>,
    result_prefs: ResultPrefs,
}

impl TextJudgmentStore {
    /// Opens the store under `root` with the default content hasher.
    pub fn open(root: &Path) -> StorageResult<Self> {
        Self::open_with_hasher(root, Arc::new(Blake3Hasher))
    }

    /// Opens the store under `root`.
    ///
    /// Every log is read once to count snapshot citations; the result store is then
    /// opened against those counts. A corrupt log fails the open, since the result
    /// store must never be compacted against an incomplete count.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn open_with_hasher(root: &Path, hasher: Arc<dyn ContentHasher>) -> StorageResult<Self> {
        let users_dir = root.join(USERS_DIR);
        fs::create_dir_all(&users_dir)?;

        let mut assessors = BTreeSet::new();
        let mut citations: HashMap<Digest, u64> = HashMap::new();
        let mut records = 0usize;

        for entry in fs::read_dir(&users_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry
                .file_name()
                .to_str()
                .and_then(decode_file_name)
                .filter(|n| !n.is_empty())
            else {
                debug!(file = ?entry.file_name(), "Skipping foreign file in users directory");
                continue;
            };

            for_each_record(&entry.path(), |record| {
                records += 1;
                count_citations(&mut citations, &record);
            })?;
            assessors.insert(name);
        }

        let results = ResultStore::open(&root.join(RESULTS_FILE), hasher, &citations)?;
        let result_prefs_path = root.join(RESULT_PREFS_FILE);
        let result_prefs = load_result_prefs(&result_prefs_path)?;

        info!(
            assessors = assessors.len(),
            records,
            snapshots = results.len(),
            "Judgment store opened"
        );

        Ok(Self {
            users_dir,
            result_prefs_path,
            results,
            assessors,
            result_prefs,
        })
    }

    pub fn result_store(&self) -> &ResultStore {
        &self.results
    }

    /// Drops orphaned snapshots left behind by an interrupted removal.
    pub fn compact_results(&mut self) -> StorageResult<usize> {
        self.results.compact()
    }

    fn log_path(&self, assessor: &str) -> PathBuf {
        self.users_dir.join(encode_file_name(assessor))
    }

    fn write_record(path: &Path, record: &JudgmentRecord) -> io::Result<()> {
        let mut writer = KvWriter::new(Vec::new());
        record.write_to(&mut writer)?;
        let bytes = writer.into_inner();

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let before = file.metadata()?.len();
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_data()) {
            let _ = file.set_len(before);
            return Err(e);
        }
        Ok(())
    }

    fn store_pair(
        &mut self,
        first: &ResultSnapshot,
        second: &ResultSnapshot,
    ) -> StorageResult<ResultPairHandle> {
        let first = self.results.put(first)?;
        match self.results.put(second) {
            Ok(second) => Ok(ResultPairHandle::new(first, second)),
            Err(e) => {
                self.results.release(&first, 1);
                Err(e)
            }
        }
    }
}

impl JudgmentStore for TextJudgmentStore {
    #[instrument(skip(self, record, first, second), fields(query = %record.query))]
    fn append(
        &mut self,
        assessor: &str,
        mut record: JudgmentRecord,
        first: Option<&ResultSnapshot>,
        second: Option<&ResultSnapshot>,
    ) -> StorageResult<JudgmentRecord> {
        if assessor.is_empty() {
            return Err(StorageError::InvalidName {
                name: assessor.to_string(),
            });
        }

        record.handle = match (first, second) {
            (Some(first), Some(second)) => Some(self.store_pair(first, second)?),
            _ => None,
        };

        if let Err(e) = Self::write_record(&self.log_path(assessor), &record) {
            if let Some(handle) = record.handle {
                let released = handle.digests().map(|d| (d, 1));
                if let Err(release_err) = self.results.release_all(released) {
                    warn!(error = %release_err, "Compaction after failed append did not complete");
                }
            }
            return Err(e.into());
        }

        self.assessors.insert(assessor.to_string());
        debug!(handle = ?record.handle, "Judgment appended");
        Ok(record)
    }

    fn list(&self, assessor: &str) -> StorageResult<Vec<JudgmentRecord>> {
        if !self.assessors.contains(assessor) {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for_each_record(&self.log_path(assessor), |record| records.push(record))?;
        Ok(records)
    }

    fn assessors(&self) -> BTreeSet<String> {
        self.assessors.clone()
    }

    #[instrument(skip(self))]
    fn remove_assessors(&mut self, assessors: &BTreeSet<String>) -> StorageResult<bool> {
        let mut removed = 0usize;
        let mut orphaned = false;

        for name in assessors {
            if !self.assessors.contains(name) {
                continue;
            }
            let path = self.log_path(name);
            let mut citations = HashMap::new();
            for_each_record(&path, |record| count_citations(&mut citations, &record))?;

            remove_if_exists(&path)?;
            self.assessors.remove(name);
            removed += 1;

            for (digest, count) in citations {
                orphaned |= self.results.release(&digest, count);
            }
        }

        if orphaned {
            self.results.compact()?;
        }
        if removed > 0 {
            info!(removed, "Assessors removed");
        }
        Ok(removed > 0)
    }

    fn result_pair(
        &self,
        handle: &ResultPairHandle,
    ) -> StorageResult<Option<(ResultSnapshot, ResultSnapshot)>> {
        let Some(first) = self.results.get(&handle.first)? else {
            return Ok(None);
        };
        let Some(second) = self.results.get(&handle.second)? else {
            return Ok(None);
        };
        Ok(Some((first, second)))
    }

    fn result_prefs(&self) -> ResultPrefs {
        self.result_prefs
    }

    fn set_result_prefs(&mut self, prefs: ResultPrefs) -> StorageResult<()> {
        replace_file(&self.result_prefs_path, |w| prefs.write_to(w))?;
        self.result_prefs = prefs;
        Ok(())
    }
}

fn count_citations(citations: &mut HashMap<Digest, u64>, record: &JudgmentRecord) {
    if let Some(handle) = &record.handle {
        for digest in handle.digests() {
            *citations.entry(digest).or_default() += 1;
        }
    }
}

/// Streams the records of one log. A missing file has no records.
fn for_each_record<F>(path: &Path, mut visit: F) -> StorageResult<()>
where
    F: FnMut(JudgmentRecord),
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let mut reader = KvReader::new(BufReader::new(file));
    let decode = |e| StorageError::decode(path, e);

    while !reader.is_eof().map_err(decode)? {
        visit(JudgmentRecord::read_from(&mut reader).map_err(decode)?);
    }
    Ok(())
}

fn load_result_prefs(path: &Path) -> StorageResult<ResultPrefs> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ResultPrefs::default()),
        Err(e) => return Err(e.into()),
    };
    let mut reader = KvReader::new(BufReader::new(file));
    ResultPrefs::read_from(&mut reader).map_err(|e| StorageError::decode(path, e))
}

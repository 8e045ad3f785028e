//! Query sets stored one file per set under `queries/`.
//!
//! Set files hold one escaped query per line, already trimmed, sorted and
//! deduplicated. Which sets are active and the two selection flags live in
//! `queries/queryPrefs`. Set sizes are kept in memory so [`QueryStore::size`]
//! never touches the disk.


use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::atomic::{remove_if_exists, replace_file};
use super::error::{StorageError, StorageResult};
use super::store::QueryStore;
use crate::constants::{QUERIES_DIR, QUERY_PREFS_FILE, QUERY_SET_PREFIX};
use crate::format::{decode_file_name, encode_file_name, escape, unescape, FormatError, KvReader};
use crate::model::QueryList;

const KEY_ACTIVE: &str = "active";
const KEY_PREFER_UNJUDGED: &str = "preferUnjudged";
const KEY_SHOW_SETS: &str = "showSets";

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryPrefs {
    active: BTreeSet<String>,
    prefer_unjudged: bool,
    show_sets: bool,
}

impl Default for QueryPrefs {
    fn default() -> Self {
        Self {
            active: BTreeSet::new(),
            prefer_unjudged: true,
            show_sets: false,
        }
    }
}

/// File-backed [`QueryStore`].
#[derive(Debug)]
pub struct TextQueryStore {
    dir: PathBuf,
    sizes: BTreeMap<String, usize>,
    prefs: QueryPrefs,
}

impl TextQueryStore {
    pub fn open(root: &Path) -> StorageResult<Self> {
        let dir = root.join(QUERIES_DIR);
        fs::create_dir_all(&dir)?;
        let (sizes, prefs) = Self::load(&dir)?;

        info!(
            sets = sizes.len(),
            active = prefs.active.len(),
            "Query store opened"
        );
        Ok(Self { dir, sizes, prefs })
    }

    fn load(dir: &Path) -> StorageResult<(BTreeMap<String, usize>, QueryPrefs)> {
        let mut sizes = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|f| f.strip_prefix(QUERY_SET_PREFIX))
                .and_then(decode_file_name)
                .filter(|n| !n.is_empty())
            else {
                continue;
            };
            let queries = read_set(&entry.path())?;
            sizes.insert(name, queries.len());
        }

        let mut prefs = read_prefs(&dir.join(QUERY_PREFS_FILE))?;
        prefs.active.retain(|name| {
            let known = sizes.contains_key(name);
            if !known {
                warn!(set = %name, "Dropping unknown set from the active list");
            }
            known
        });
        Ok((sizes, prefs))
    }

    fn set_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", QUERY_SET_PREFIX, encode_file_name(name)))
    }

    fn save_prefs(&mut self, prefs: QueryPrefs) -> StorageResult<()> {
        replace_file(&self.dir.join(QUERY_PREFS_FILE), |w| {
            w.write_list(KEY_ACTIVE, &prefs.active)?;
            w.write_bool(KEY_PREFER_UNJUDGED, prefs.prefer_unjudged)?;
            w.write_bool(KEY_SHOW_SETS, prefs.show_sets)
        })?;
        self.prefs = prefs;
        Ok(())
    }
}

impl QueryStore for TextQueryStore {
    #[instrument(skip(self, queries), fields(raw = queries.len()))]
    fn create(&mut self, name: &str, queries: &[String]) -> StorageResult<bool> {
        if name.is_empty() || self.sizes.contains_key(name) {
            return Ok(false);
        }

        let list = QueryList::from_unsorted(queries);
        replace_file(&self.set_path(name), |w| {
            for query in list.iter() {
                writeln!(w.get_mut(), "{}", escape(query))?;
            }
            Ok(())
        })?;
        self.sizes.insert(name.to_string(), list.len());

        let mut prefs = self.prefs.clone();
        prefs.active.insert(name.to_string());
        self.save_prefs(prefs)?;

        info!(set = name, size = list.len(), "Query set created");
        Ok(true)
    }

    fn rename(&mut self, old: &str, new: &str) -> StorageResult<bool> {
        if !self.sizes.contains_key(old) {
            return Ok(false);
        }
        if old == new {
            return Ok(true);
        }
        if new.is_empty() || self.sizes.contains_key(new) {
            return Ok(false);
        }

        fs::rename(self.set_path(old), self.set_path(new))?;
        if let Some(size) = self.sizes.remove(old) {
            self.sizes.insert(new.to_string(), size);
        }

        if self.prefs.active.contains(old) {
            let mut prefs = self.prefs.clone();
            prefs.active.remove(old);
            prefs.active.insert(new.to_string());
            self.save_prefs(prefs)?;
        }

        info!(old, new, "Query set renamed");
        Ok(true)
    }

    fn remove(&mut self, name: &str) -> StorageResult<bool> {
        if !self.sizes.contains_key(name) {
            return Ok(false);
        }

        remove_if_exists(&self.set_path(name))?;
        self.sizes.remove(name);

        if self.prefs.active.contains(name) {
            let mut prefs = self.prefs.clone();
            prefs.active.remove(name);
            self.save_prefs(prefs)?;
        }

        info!(set = name, "Query set removed");
        Ok(true)
    }

    fn get(&self, name: &str) -> StorageResult<Option<QueryList>> {
        if !self.sizes.contains_key(name) {
            return Ok(None);
        }
        read_set(&self.set_path(name)).map(Some)
    }

    fn size(&self, name: &str) -> Option<usize> {
        self.sizes.get(name).copied()
    }

    fn names(&self) -> Vec<String> {
        self.sizes.keys().cloned().collect()
    }

    fn active_names(&self) -> Vec<String> {
        self.prefs.active.iter().cloned().collect()
    }

    fn is_active(&self, name: &str) -> bool {
        self.prefs.active.contains(name)
    }

    fn set_active(&mut self, name: &str, active: bool) -> StorageResult<bool> {
        if !self.sizes.contains_key(name) {
            return Ok(false);
        }
        if self.prefs.active.contains(name) == active {
            return Ok(true);
        }

        let mut prefs = self.prefs.clone();
        if active {
            prefs.active.insert(name.to_string());
        } else {
            prefs.active.remove(name);
        }
        self.save_prefs(prefs)?;
        debug!(set = name, active, "Query set activation changed");
        Ok(true)
    }

    fn is_preferring_unjudged(&self) -> bool {
        self.prefs.prefer_unjudged
    }

    fn set_preferring_unjudged(&mut self, prefer: bool) -> StorageResult<()> {
        let prefs = QueryPrefs {
            prefer_unjudged: prefer,
            ..self.prefs.clone()
        };
        self.save_prefs(prefs)
    }

    fn is_showing_sets(&self) -> bool {
        self.prefs.show_sets
    }

    fn set_showing_sets(&mut self, show: bool) -> StorageResult<()> {
        let prefs = QueryPrefs {
            show_sets: show,
            ..self.prefs.clone()
        };
        self.save_prefs(prefs)
    }

    #[instrument(skip(self))]
    fn reload(&mut self) -> StorageResult<()> {
        let (sizes, prefs) = Self::load(&self.dir)?;
        self.sizes = sizes;
        self.prefs = prefs;
        info!(sets = self.sizes.len(), "Query sets reloaded");
        Ok(())
    }
}

/// Reads a set file. Blank lines are skipped; the list is re-normalized so a file
/// edited by hand still satisfies the sorted, deduplicated invariant.
fn read_set(path: &Path) -> StorageResult<QueryList> {
    let reader = BufReader::new(File::open(path)?);
    let mut queries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let query = unescape(&line).ok_or_else(|| {
            StorageError::decode(path, FormatError::MalformedLine { line: index + 1 })
        })?;
        queries.push(query);
    }
    Ok(QueryList::from_unsorted(queries))
}

fn read_prefs(path: &Path) -> StorageResult<QueryPrefs> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(QueryPrefs::default()),
        Err(e) => return Err(e.into()),
    };
    let mut reader = KvReader::new(BufReader::new(file));
    let decode = |e| StorageError::decode(path, e);

    Ok(QueryPrefs {
        active: reader
            .expect_list(KEY_ACTIVE)
            .map_err(decode)?
            .into_iter()
            .collect(),
        prefer_unjudged: reader.expect_bool(KEY_PREFER_UNJUDGED).map_err(decode)?,
        show_sets: reader.expect_bool(KEY_SHOW_SETS).map_err(decode)?,
    })
}

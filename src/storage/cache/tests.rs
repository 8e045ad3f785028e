use super::*;
use crate::model::{Judgment, ResultEntry, ScoringProfile};
use crate::storage::{TextJudgmentStore, TextQueryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Counts the reads that get past the cache.
struct Counting<S> {
    inner: S,
    reads: Arc<AtomicUsize>,
}

impl<S> Counting<S> {
    fn new(inner: S) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                reads: Arc::clone(&reads),
            },
            reads,
        )
    }
}

impl<S: QueryStore> QueryStore for Counting<S> {
    fn create(&mut self, name: &str, queries: &[String]) -> StorageResult<bool> {
        self.inner.create(name, queries)
    }
    fn rename(&mut self, old: &str, new: &str) -> StorageResult<bool> {
        self.inner.rename(old, new)
    }
    fn remove(&mut self, name: &str) -> StorageResult<bool> {
        self.inner.remove(name)
    }
    fn get(&self, name: &str) -> StorageResult<Option<QueryList>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
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
        self.inner.set_preferring_unjudged(prefer)
    }
    fn is_showing_sets(&self) -> bool {
        self.inner.is_showing_sets()
    }
    fn set_showing_sets(&mut self, show: bool) -> StorageResult<()> {
        self.inner.set_showing_sets(show)
    }
    fn reload(&mut self) -> StorageResult<()> {
        self.inner.reload()
    }
}

impl<S: JudgmentStore> JudgmentStore for Counting<S> {
    fn append(
        &mut self,
        assessor: &str,
        record: JudgmentRecord,
        first: Option<&ResultSnapshot>,
        second: Option<&ResultSnapshot>,
    ) -> StorageResult<JudgmentRecord> {
        self.inner.append(assessor, record, first, second)
    }
    fn list(&self, assessor: &str) -> StorageResult<Vec<JudgmentRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list(assessor)
    }
    fn assessors(&self) -> BTreeSet<String> {
        self.inner.assessors()
    }
    fn remove_assessors(&mut self, assessors: &BTreeSet<String>) -> StorageResult<bool> {
        self.inner.remove_assessors(assessors)
    }
    fn result_pair(
        &self,
        handle: &ResultPairHandle,
    ) -> StorageResult<Option<(ResultSnapshot, ResultSnapshot)>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.result_pair(handle)
    }
    fn result_prefs(&self) -> ResultPrefs {
        self.inner.result_prefs()
    }
    fn set_result_prefs(&mut self, prefs: ResultPrefs) -> StorageResult<()> {
        self.inner.set_result_prefs(prefs)
    }
}

fn query_store(dir: &TempDir, capacity: u64) -> (CachingQueryStore<Counting<TextQueryStore>>, Arc<AtomicUsize>) {
    let (counting, reads) = Counting::new(TextQueryStore::open(dir.path()).unwrap());
    (CachingQueryStore::with_capacity(counting, capacity), reads)
}

fn judgment_store(dir: &TempDir) -> (CachingJudgmentStore<Counting<TextJudgmentStore>>, Arc<AtomicUsize>) {
    let (counting, reads) = Counting::new(TextJudgmentStore::open(dir.path()).unwrap());
    (CachingJudgmentStore::with_capacities(counting, 8, 8), reads)
}

fn record(query: &str) -> JudgmentRecord {
    JudgmentRecord::new(
        query,
        Judgment::SecondBetter,
        ScoringProfile::snippets("a", "https://a/?q={query}", "li"),
        ScoringProfile::snippets("b", "https://b/?q={query}", "li"),
    )
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_query_get_hits_cache() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, reads) = query_store(&dir, 4);
    store.create("s", &list(&["a", "b"])).unwrap();

    let first = store.get("s").unwrap().unwrap();
    let second = store.get("s").unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_query_missing_set_not_cached() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, _) = query_store(&dir, 4);

    assert!(store.get("later").unwrap().is_none());
    store.create("later", &list(&["x"])).unwrap();

    assert_eq!(store.get("later").unwrap().unwrap().as_slice(), &["x"]);
}

#[test]
fn test_query_rename_moves_cached_list() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, reads) = query_store(&dir, 4);
    store.create("old", &list(&["a"])).unwrap();
    store.get("old").unwrap();

    assert!(store.rename("old", "new").unwrap());

    assert!(store.get("old").unwrap().is_none());
    assert_eq!(store.get("new").unwrap().unwrap().as_slice(), &["a"]);
    // One read to warm "old", one for the miss after the rename; "new" is served from cache.
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_query_remove_and_recreate_is_not_stale() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, _) = query_store(&dir, 4);
    store.create("s", &list(&["old"])).unwrap();
    store.get("s").unwrap();

    store.remove("s").unwrap();
    store.create("s", &list(&["new"])).unwrap();

    assert_eq!(store.get("s").unwrap().unwrap().as_slice(), &["new"]);
}

#[test]
fn test_query_reload_clears_cache() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, reads) = query_store(&dir, 4);
    store.create("s", &list(&["a"])).unwrap();
    store.get("s").unwrap();

    store.reload().unwrap();
    store.get("s").unwrap();

    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_query_cache_is_bounded() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, _) = query_store(&dir, 2);
    for name in ["a", "b", "c", "d"] {
        store.create(name, &list(&[name])).unwrap();
        store.get(name).unwrap();
    }

    store.run_pending_tasks();
    assert!(store.cached_sets() <= 2);
}

#[test]
fn test_judgment_list_is_write_through() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, reads) = judgment_store(&dir);
    store.append("alice", record("one"), None, None).unwrap();

    assert_eq!(store.list("alice").unwrap().len(), 1);
    store.append("alice", record("two"), None, None).unwrap();
    let records = store.list("alice").unwrap();

    assert_eq!(
        records.iter().map(|r| r.query.as_str()).collect::<Vec<_>>(),
        vec!["one", "two"]
    );
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner().inner.list("alice").unwrap(), records);
}

#[test]
fn test_judgment_pair_cached_on_append() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, reads) = judgment_store(&dir);
    let a: ResultSnapshot = vec![ResultEntry::new("a", "", "https://a")].into();
    let b: ResultSnapshot = vec![ResultEntry::new("b", "", "https://b")].into();

    let handle = store
        .append("alice", record("q"), Some(&a), Some(&b))
        .unwrap()
        .handle
        .unwrap();

    assert_eq!(store.result_pair(&handle).unwrap(), Some((a, b)));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn test_judgment_remove_assessors_invalidates() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (mut store, _) = judgment_store(&dir);
    let a: ResultSnapshot = vec![ResultEntry::new("a", "", "https://a")].into();
    let b: ResultSnapshot = vec![ResultEntry::new("b", "", "https://b")].into();
    let handle = store
        .append("bob", record("q"), Some(&a), Some(&b))
        .unwrap()
        .handle
        .unwrap();
    store.list("bob").unwrap();
    store.result_pair(&handle).unwrap();

    store
        .remove_assessors(&BTreeSet::from(["bob".to_string()]))
        .unwrap();

    assert!(store.list("bob").unwrap().is_empty());
    assert_eq!(store.result_pair(&handle).unwrap(), None);
}

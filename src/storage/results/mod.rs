//! Content-addressed, reference-counted store of result snapshots.
//!
//! All snapshots live in one append-only arena file. Each block is a `digest=`
//! line followed by the snapshot body:
//!
//! ```text
//! digest=<hex>
//! results=<n>
//! title=... snippet=... url=... size=... crowded=...   (n times, one per line)
//! ```
//!
//! The in-memory index maps digest → {reference count, offset, length}. Counts are
//! not persisted: they are rebuilt on open from the judgment logs, which are the
//! source of truth for who cites what. A block whose count drops to zero is
//! orphaned and dropped by the next [`ResultStore::compact`].


use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use super::error::{StorageError, StorageResult};
use crate::format::{FormatError, KvReader};
use crate::hashing::{ContentHasher, Digest};
use crate::model::ResultSnapshot;

const KEY_DIGEST: &str = "digest";

/// Index entry for one stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredDigestEntry {
    /// Judgment citations currently pointing at this snapshot.
    pub reference_count: u64,
    /// Byte offset of the block's `digest=` line.
    pub offset: u64,
    /// Block length in bytes, digest line included.
    pub length: u64,
}

impl StoredDigestEntry {
    pub fn is_orphaned(&self) -> bool {
        self.reference_count == 0
    }
}

/// The arena file plus its digest index.
pub struct ResultStore {
    path: PathBuf,
    hasher: Arc<dyn ContentHasher>,
    index: HashMap<Digest, StoredDigestEntry>,
    end: u64,
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("path", &self.path)
            .field("entries", &self.index.len())
            .field("end", &self.end)
            .finish()
    }
}

impl ResultStore {
    /// Opens (or prepares to create) the arena at `path`.
    ///
    /// Scans the file once to rebuild offsets, then takes reference counts from
    /// `reference_counts`. Stored digests missing from that map start orphaned and
    /// are compacted away before this returns.
    #[instrument(skip(hasher, reference_counts), fields(cited = reference_counts.len()))]
    pub fn open(
        path: &Path,
        hasher: Arc<dyn ContentHasher>,
        reference_counts: &HashMap<Digest, u64>,
    ) -> StorageResult<Self> {
        let (mut index, end) = Self::scan(path)?;

        for (digest, count) in reference_counts {
            match index.get_mut(digest) {
                Some(entry) => entry.reference_count = *count,
                None => warn!(%digest, count, "Judgments cite a snapshot missing from the result store"),
            }
        }

        let mut store = Self {
            path: path.to_path_buf(),
            hasher,
            index,
            end,
        };

        info!(
            entries = store.index.len(),
            orphans = store.orphan_count(),
            bytes = end,
            "Result store opened"
        );

        if store.orphan_count() > 0 {
            store.compact()?;
        }

        Ok(store)
    }

    fn scan(path: &Path) -> StorageResult<(HashMap<Digest, StoredDigestEntry>, u64)> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((HashMap::new(), 0)),
            Err(e) => return Err(e.into()),
        };

        let mut index = HashMap::new();
        let mut reader = KvReader::new(BufReader::new(file));
        let decode = |e| StorageError::decode(path, e);

        while !reader.is_eof().map_err(decode)? {
            let offset = reader.position();
            let digest = reader.expect_digest(KEY_DIGEST).map_err(decode)?;
            ResultSnapshot::read_body(&mut reader).map_err(decode)?;
            let length = reader.position() - offset;

            if index.contains_key(&digest) {
                warn!(%digest, offset, "Duplicate snapshot block; keeping the first");
                continue;
            }
            index.insert(
                digest,
                StoredDigestEntry {
                    reference_count: 0,
                    offset,
                    length,
                },
            );
        }

        Ok((index, reader.position()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored snapshots, orphans included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.index.contains_key(digest)
    }

    pub fn entry(&self, digest: &Digest) -> Option<StoredDigestEntry> {
        self.index.get(digest).copied()
    }

    pub fn reference_count(&self, digest: &Digest) -> Option<u64> {
        self.index.get(digest).map(|e| e.reference_count)
    }

    pub fn orphan_count(&self) -> usize {
        self.index.values().filter(|e| e.is_orphaned()).count()
    }

    /// Size of the arena file in bytes.
    pub fn file_len(&self) -> u64 {
        self.end
    }

    /// Stores `snapshot` and counts one citation of it.
    ///
    /// Identical content maps to the same digest; a second `put` only bumps the
    /// reference count.
    pub fn put(&mut self, snapshot: &ResultSnapshot) -> StorageResult<Digest> {
        let body = snapshot.canonical_bytes();
        let digest = self.hasher.digest(&body);

        if let Some(entry) = self.index.get_mut(&digest) {
            entry.reference_count += 1;
            debug!(%digest, count = entry.reference_count, "Snapshot deduplicated");
            return Ok(digest);
        }

        let mut block = format!("{}={}\n", KEY_DIGEST, digest.to_hex()).into_bytes();
        block.extend_from_slice(&body);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if let Err(e) = file.write_all(&block).and_then(|_| file.sync_data()) {
            // Drop any partial block so the next scan does not see a torn tail.
            let _ = file.set_len(self.end);
            return Err(e.into());
        }

        let entry = StoredDigestEntry {
            reference_count: 1,
            offset: self.end,
            length: block.len() as u64,
        };
        self.end += entry.length;
        self.index.insert(digest, entry);
        debug!(%digest, offset = entry.offset, "Snapshot stored");

        Ok(digest)
    }

    /// Reads the snapshot stored under `digest`.
    ///
    /// `Ok(None)` for digests that are not stored; callers racing a compaction treat
    /// that as "not visible yet", not as corruption.
    pub fn get(&self, digest: &Digest) -> StorageResult<Option<ResultSnapshot>> {
        let Some(entry) = self.index.get(digest) else {
            return Ok(None);
        };

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(entry.offset))?;
        let mut reader = KvReader::with_offset(
            BufReader::new(file.take(entry.length)),
            entry.offset,
        );
        let decode = |e| StorageError::decode(&self.path, e);

        let stored = reader.expect_digest(KEY_DIGEST).map_err(decode)?;
        if stored != *digest {
            return Err(decode(FormatError::Inconsistent(
                "block at indexed offset carries another digest",
            )));
        }
        ResultSnapshot::read_body(&mut reader).map(Some).map_err(decode)
    }

    /// Drops `count` citations of `digest`. Returns `true` if it is now orphaned.
    ///
    /// Does not compact; see [`ResultStore::release_all`].
    pub fn release(&mut self, digest: &Digest, count: u64) -> bool {
        let Some(entry) = self.index.get_mut(digest) else {
            warn!(%digest, count, "Release of unknown snapshot ignored");
            return false;
        };
        if count > entry.reference_count {
            warn!(
                %digest,
                count,
                held = entry.reference_count,
                "Releasing more citations than held"
            );
        }
        entry.reference_count = entry.reference_count.saturating_sub(count);
        entry.is_orphaned()
    }

    /// Releases a batch of citations, then compacts if anything became orphaned.
    pub fn release_all<I>(&mut self, counts: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (Digest, u64)>,
    {
        let mut orphaned = false;
        for (digest, count) in counts {
            orphaned |= self.release(&digest, count);
        }
        if orphaned {
            self.compact()?;
        }
        Ok(())
    }

    /// Removes every orphaned block. Returns how many were removed.
    ///
    /// When everything is orphaned the file is truncated. Otherwise live blocks are
    /// copied, in file order, into a temp sibling that is synced and renamed over
    /// the arena; the index only switches to the new offsets after the rename, so a
    /// failure leaves both the old file and the old index authoritative.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn compact(&mut self) -> StorageResult<usize> {
        let orphans = self.orphan_count();
        if orphans == 0 {
            return Ok(0);
        }

        if orphans == self.index.len() {
            if self.path.exists() {
                File::create(&self.path)?.sync_all()?;
            }
            self.index.clear();
            self.end = 0;
            info!(removed = orphans, "Result store emptied");
            return Ok(orphans);
        }

        let mut live: Vec<(Digest, StoredDigestEntry)> = self
            .index
            .iter()
            .filter(|(_, e)| !e.is_orphaned())
            .map(|(d, e)| (*d, *e))
            .collect();
        live.sort_by_key(|(_, e)| e.offset);

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        let mut source = BufReader::new(File::open(&self.path)?);
        let mut relocated = HashMap::with_capacity(live.len());
        let mut end = 0u64;
        {
            let mut out = BufWriter::new(temp.as_file_mut());
            for (digest, entry) in &live {
                source.seek(SeekFrom::Start(entry.offset))?;
                let copied = io::copy(&mut (&mut source).take(entry.length), &mut out)?;
                if copied != entry.length {
                    return Err(StorageError::decode(
                        &self.path,
                        FormatError::UnexpectedEof { expected: KEY_DIGEST },
                    ));
                }
                relocated.insert(
                    *digest,
                    StoredDigestEntry {
                        offset: end,
                        ..*entry
                    },
                );
                end += entry.length;
            }
            out.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        let before = self.end;
        self.index = relocated;
        self.end = end;
        info!(
            removed = orphans,
            kept = self.index.len(),
            bytes_before = before,
            bytes_after = end,
            "Result store compacted"
        );
        Ok(orphans)
    }
}

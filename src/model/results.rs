use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::format::{FormatResult, KvReader, KvWriter};
use crate::hashing::{ContentHasher, Digest};

/// One search result as the assessor saw it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultEntry {
    pub title: String,
    pub snippet: String,
    pub url: String,
    /// Display size string such as `"12k"`; may be empty.
    pub size: String,
    /// Set when the host collapsed further results from the same site under this one.
    pub crowded: bool,
}

impl ResultEntry {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
            size: String::new(),
            crowded: false,
        }
    }
}

/// Ordered results one scoring profile returned for one query.
///
/// Identity is the digest of [`ResultSnapshot::canonical_bytes`], so two snapshots
/// with the same entries in a different order are different snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSnapshot {
    entries: Vec<ResultEntry>,
}

impl ResultSnapshot {
    const KEY_COUNT: &'static str = "results";
    const KEY_TITLE: &'static str = "title";
    const KEY_SNIPPET: &'static str = "snippet";
    const KEY_URL: &'static str = "url";
    const KEY_SIZE: &'static str = "size";
    const KEY_CROWDED: &'static str = "crowded";

    pub fn new(entries: Vec<ResultEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ResultEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the count line followed by every entry.
    pub fn write_body<W: Write>(&self, writer: &mut KvWriter<W>) -> io::Result<()> {
        writer.write_u64(Self::KEY_COUNT, self.entries.len() as u64)?;
        for entry in &self.entries {
            writer.write(Self::KEY_TITLE, &entry.title)?;
            writer.write(Self::KEY_SNIPPET, &entry.snippet)?;
            writer.write(Self::KEY_URL, &entry.url)?;
            writer.write(Self::KEY_SIZE, &entry.size)?;
            writer.write_bool(Self::KEY_CROWDED, entry.crowded)?;
        }
        Ok(())
    }

    pub fn read_body<R: BufRead>(reader: &mut KvReader<R>) -> FormatResult<Self> {
        let count = reader.expect_u64(Self::KEY_COUNT)?;
        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(ResultEntry {
                title: reader.expect(Self::KEY_TITLE)?,
                snippet: reader.expect(Self::KEY_SNIPPET)?,
                url: reader.expect(Self::KEY_URL)?,
                size: reader.expect(Self::KEY_SIZE)?,
                crowded: reader.expect_bool(Self::KEY_CROWDED)?,
            });
        }
        Ok(Self { entries })
    }

    /// The exact bytes [`ResultSnapshot::write_body`] produces.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut writer = KvWriter::new(Vec::new());
        // Writing into a Vec cannot fail.
        let _ = self.write_body(&mut writer);
        writer.into_inner()
    }

    pub fn digest_with(&self, hasher: &dyn ContentHasher) -> Digest {
        hasher.digest(&self.canonical_bytes())
    }
}

impl From<Vec<ResultEntry>> for ResultSnapshot {
    fn from(entries: Vec<ResultEntry>) -> Self {
        Self::new(entries)
    }
}

/// How results are displayed and whether they are saved with a judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPrefs {
    /// Randomly swap which profile appears on the left.
    pub swap_sides: bool,
    /// Save both snapshots alongside each judgment.
    pub store_results: bool,
    /// Submit as soon as a preference is clicked.
    pub auto_submit: bool,
    /// Timeout for fetching results from a search host.
    pub timeout_millis: u64,
    /// Results kept per side.
    pub max_results: u64,
}

impl Default for ResultPrefs {
    fn default() -> Self {
        Self {
            swap_sides: true,
            store_results: true,
            auto_submit: false,
            timeout_millis: 5_000,
            max_results: 10,
        }
    }
}

impl ResultPrefs {
    const KEY_SWAP: &'static str = "swapSides";
    const KEY_STORE: &'static str = "storeResults";
    const KEY_AUTO_SUBMIT: &'static str = "autoSubmit";
    const KEY_TIMEOUT: &'static str = "timeoutMillis";
    const KEY_MAX_RESULTS: &'static str = "maxResults";

    pub fn write_to<W: Write>(&self, writer: &mut KvWriter<W>) -> io::Result<()> {
        writer.write_bool(Self::KEY_SWAP, self.swap_sides)?;
        writer.write_bool(Self::KEY_STORE, self.store_results)?;
        writer.write_bool(Self::KEY_AUTO_SUBMIT, self.auto_submit)?;
        writer.write_u64(Self::KEY_TIMEOUT, self.timeout_millis)?;
        writer.write_u64(Self::KEY_MAX_RESULTS, self.max_results)
    }

    pub fn read_from<R: BufRead>(reader: &mut KvReader<R>) -> FormatResult<Self> {
        Ok(Self {
            swap_sides: reader.expect_bool(Self::KEY_SWAP)?,
            store_results: reader.expect_bool(Self::KEY_STORE)?,
            auto_submit: reader.expect_bool(Self::KEY_AUTO_SUBMIT)?,
            timeout_millis: reader.expect_u64(Self::KEY_TIMEOUT)?,
            max_results: reader.expect_u64(Self::KEY_MAX_RESULTS)?,
        })
    }
}

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::ScoringProfile;
use crate::constants::DIGEST_LEN;
use crate::format::{FormatError, FormatResult, KvReader, KvWriter};
use crate::hashing::Digest;

/// Which side the assessor preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Judgment {
    FirstBetter,
    SecondBetter,
    Equal,
}

impl Judgment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::FirstBetter => "FIRST_BETTER",
            Judgment::SecondBetter => "SECOND_BETTER",
            Judgment::Equal => "EQUAL",
        }
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Judgment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIRST_BETTER" => Ok(Judgment::FirstBetter),
            "SECOND_BETTER" => Ok(Judgment::SecondBetter),
            "EQUAL" => Ok(Judgment::Equal),
            _ => Err(format!("Unknown judgment: {}", s)),
        }
    }
}

/// Digests of the two snapshots saved with a judgment, first profile first.
///
/// The external form is both digests' hex concatenated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResultPairHandle {
    pub first: Digest,
    pub second: Digest,
}

impl ResultPairHandle {
    pub fn new(first: Digest, second: Digest) -> Self {
        Self { first, second }
    }

    pub fn digests(&self) -> [Digest; 2] {
        [self.first, self.second]
    }
}

impl fmt::Display for ResultPairHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.first, self.second)
    }
}

impl fmt::Debug for ResultPairHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResultPairHandle")
            .field(&self.first)
            .field(&self.second)
            .finish()
    }
}

impl FromStr for ResultPairHandle {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DIGEST_LEN * 4 || !s.is_ascii() {
            return Err(FormatError::InvalidDigest {
                value: s.to_string(),
            });
        }
        let (first, second) = s.split_at(DIGEST_LEN * 2);
        Ok(Self {
            first: Digest::from_hex(first)?,
            second: Digest::from_hex(second)?,
        })
    }
}

impl From<ResultPairHandle> for String {
    fn from(handle: ResultPairHandle) -> Self {
        handle.to_string()
    }
}

impl TryFrom<String> for ResultPairHandle {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One comparative judgment in an assessor's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentRecord {
    pub query: String,
    pub judgment: Judgment,
    /// Submission time, millisecond precision.
    pub timestamp: DateTime<Utc>,
    pub first: ScoringProfile,
    pub second: ScoringProfile,
    /// Saved snapshots, if the comparison was stored.
    pub handle: Option<ResultPairHandle>,
}

impl JudgmentRecord {
    const KEY_QUERY: &'static str = "query";
    const KEY_JUDGMENT: &'static str = "judgment";
    const KEY_TIMESTAMP: &'static str = "timestamp";
    const KEY_PROFILE: &'static str = "profile";
    const KEY_DIGEST: &'static str = "digest";

    /// Creates a record stamped with the current time.
    pub fn new(
        query: impl Into<String>,
        judgment: Judgment,
        first: ScoringProfile,
        second: ScoringProfile,
    ) -> Self {
        Self {
            query: query.into(),
            judgment,
            timestamp: truncate_to_millis(Utc::now()),
            first,
            second,
            handle: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = truncate_to_millis(timestamp);
        self
    }

    /// True if this record compares exactly the profiles `first` and `second`,
    /// on either side.
    pub fn compares(&self, first: &str, second: &str) -> bool {
        (self.first.name == first && self.second.name == second)
            || (self.first.name == second && self.second.name == first)
    }

    pub fn write_to<W: Write>(&self, writer: &mut KvWriter<W>) -> io::Result<()> {
        writer.write(Self::KEY_QUERY, &self.query)?;
        writer.write(Self::KEY_JUDGMENT, self.judgment.as_str())?;
        writer.write_i64(Self::KEY_TIMESTAMP, self.timestamp.timestamp_millis())?;

        let (first_digest, second_digest) = match &self.handle {
            Some(handle) => (Some(handle.first), Some(handle.second)),
            None => (None, None),
        };
        for (profile, digest) in [(&self.first, first_digest), (&self.second, second_digest)] {
            profile.write_to(writer, Self::KEY_PROFILE)?;
            if let Some(digest) = digest {
                writer.write_digest(Self::KEY_DIGEST, &digest)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: BufRead>(reader: &mut KvReader<R>) -> FormatResult<Self> {
        let query = reader.expect(Self::KEY_QUERY)?;
        let judgment = reader.expect_parsed(Self::KEY_JUDGMENT, |v| v.parse::<Judgment>().ok())?;
        let timestamp = reader.expect_parsed(Self::KEY_TIMESTAMP, |v| {
            v.parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
        })?;

        let first = ScoringProfile::read_from(reader, Self::KEY_PROFILE)?;
        let first_digest = reader.optional_digest(Self::KEY_DIGEST)?;
        let second = ScoringProfile::read_from(reader, Self::KEY_PROFILE)?;
        let second_digest = reader.optional_digest(Self::KEY_DIGEST)?;

        let handle = match (first_digest, second_digest) {
            (Some(a), Some(b)) => Some(ResultPairHandle::new(a, b)),
            (None, None) => None,
            _ => return Err(FormatError::Inconsistent("only one side carries a digest")),
        };

        Ok(Self {
            query,
            judgment,
            timestamp,
            first,
            second,
            handle,
        })
    }
}

fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}

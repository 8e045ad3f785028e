//! Builders and fixtures shared by the integration tests.

use chrono::{DateTime, TimeZone, Utc};
use sxs::config::Config;
use sxs::model::{Judgment, JudgmentRecord, ResultEntry, ResultSnapshot, ScoringProfile};
use sxs::service::EvaluationService;
use sxs::storage::{PreferencesStore, QueryStore};
use tempfile::TempDir;

pub const FIRST_PROFILE: &str = "production";
pub const SECOND_PROFILE: &str = "candidate";
pub const FIXED_TIMESTAMP_MILLIS: i64 = 1_700_000_000_000;

pub fn fixed_timestamp() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(FIXED_TIMESTAMP_MILLIS)
        .single()
        .expect("valid timestamp")
}

pub fn profile(name: &str) -> ScoringProfile {
    ScoringProfile::snippets(
        name,
        format!("https://{name}.example/search?q={{query}}"),
        "li.result",
    )
}

#[derive(Debug, Clone, Default)]
pub struct JudgmentRecordBuilder {
    query: Option<String>,
    judgment: Option<Judgment>,
    first: Option<String>,
    second: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl JudgmentRecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: &str) -> Self {
        self.query = Some(query.to_string());
        self
    }

    pub fn judgment(mut self, judgment: Judgment) -> Self {
        self.judgment = Some(judgment);
        self
    }

    pub fn profiles(mut self, first: &str, second: &str) -> Self {
        self.first = Some(first.to_string());
        self.second = Some(second.to_string());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> JudgmentRecord {
        JudgmentRecord::new(
            self.query.unwrap_or_else(|| "query".to_string()),
            self.judgment.unwrap_or(Judgment::Equal),
            profile(self.first.as_deref().unwrap_or(FIRST_PROFILE)),
            profile(self.second.as_deref().unwrap_or(SECOND_PROFILE)),
        )
        .with_timestamp(self.timestamp.unwrap_or_else(fixed_timestamp))
    }
}

pub fn record(query: &str) -> JudgmentRecord {
    JudgmentRecordBuilder::new().query(query).build()
}

/// A snapshot of `count` results whose content depends on `seed`.
pub fn snapshot(seed: u64, count: usize) -> ResultSnapshot {
    (0..count)
        .map(|i| {
            ResultEntry::new(
                format!("Result {seed}-{i}"),
                format!("Snippet for result {i} of page {seed}"),
                format!("https://site{seed}.example/{i}"),
            )
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn queries(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// An evaluation service over a fresh root, with both profiles active.
pub struct TestService {
    pub dir: TempDir,
    pub service: EvaluationService,
}

impl TestService {
    pub fn new(seed: u64) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let service = Self::open_at(&dir, seed);
        let mut test = Self { dir, service };
        let prefs = test.service.storage_mut().preferences_mut();
        prefs.add_profile(profile(FIRST_PROFILE)).unwrap();
        prefs.add_profile(profile(SECOND_PROFILE)).unwrap();
        prefs.set_first_profile(FIRST_PROFILE).unwrap();
        prefs.set_second_profile(SECOND_PROFILE).unwrap();
        test
    }

    pub fn open_at(dir: &TempDir, seed: u64) -> EvaluationService {
        let config = Config {
            storage_path: dir.path().to_path_buf(),
            chooser_seed: Some(seed),
            ..Config::default()
        };
        EvaluationService::open(&config).expect("Failed to open service")
    }

    /// Closes the service and opens a new one over the same root.
    pub fn reopen(self, seed: u64) -> Self {
        let Self { dir, service } = self;
        drop(service);
        let service = Self::open_at(&dir, seed);
        Self { dir, service }
    }

    pub fn create_set(&mut self, name: &str, items: &[&str]) {
        assert!(
            self.service
                .storage_mut()
                .queries_mut()
                .create(name, &queries(items))
                .unwrap()
        );
    }
}

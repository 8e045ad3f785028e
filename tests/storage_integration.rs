//! Integration tests for the storage stack.

mod common;

use std::collections::BTreeSet;

use common::fixtures::{JudgmentRecordBuilder, TestService, queries, record, snapshot};
use sxs::hashing::{Blake3Hasher, Digest};
use sxs::model::{Judgment, ResultPrefs};
use sxs::service::EvaluationService;
use sxs::storage::{JudgmentStore, PreferencesStore, QueryStore};

fn reference_count(service: &EvaluationService, digest: &Digest) -> Option<u64> {
    service
        .storage()
        .judgments()
        .inner()
        .with(|store| store.inner().result_store().reference_count(digest))
}

fn stored_entries(service: &EvaluationService) -> usize {
    service
        .storage()
        .judgments()
        .inner()
        .with(|store| store.inner().result_store().len())
}

#[test]
fn test_submitted_record_round_trips() {
    let mut test = TestService::new(1);
    let first = snapshot(1, 3);
    let second = snapshot(2, 3);
    let submitted = JudgmentRecordBuilder::new()
        .query("rust borrow checker")
        .judgment(Judgment::SecondBetter)
        .build();

    let appended = test
        .service
        .submit("alice", submitted.clone(), Some((&first, &second)))
        .unwrap();

    assert!(appended.handle.is_some());
    assert_eq!(appended.query, submitted.query);
    assert_eq!(appended.timestamp, submitted.timestamp);

    let test = test.reopen(1);
    let listed = test.service.storage().judgments().list("alice").unwrap();
    assert_eq!(listed, vec![appended.clone()]);
    let pair = test
        .service
        .storage()
        .judgments()
        .result_pair(&appended.handle.unwrap())
        .unwrap();
    assert_eq!(pair, Some((first, second)));
}

#[test]
fn test_shared_snapshots_are_deduplicated() {
    let mut test = TestService::new(2);
    let shared = snapshot(7, 5);
    let digest = shared.digest_with(&Blake3Hasher);

    for (i, assessor) in ["alice", "bob", "alice"].into_iter().enumerate() {
        let own = snapshot(100 + i as u64, 2);
        test.service
            .submit(assessor, record(&format!("q{i}")), Some((&shared, &own)))
            .unwrap();
    }

    assert_eq!(reference_count(&test.service, &digest), Some(3));
    assert_eq!(stored_entries(&test.service), 4);
}

#[test]
fn test_remove_assessor_releases_only_their_citations() {
    let mut test = TestService::new(3);
    let shared = snapshot(1, 4);
    let alice_only = snapshot(2, 4);
    let bob_only = snapshot(3, 4);
    let shared_digest = shared.digest_with(&Blake3Hasher);
    let bob_digest = bob_only.digest_with(&Blake3Hasher);

    test.service
        .submit("alice", record("q1"), Some((&shared, &alice_only)))
        .unwrap();
    test.service
        .submit("bob", record("q1"), Some((&shared, &bob_only)))
        .unwrap();
    test.service
        .submit("bob", record("q2"), Some((&bob_only, &bob_only)))
        .unwrap();
    assert_eq!(reference_count(&test.service, &bob_digest), Some(3));

    let removed = test
        .service
        .storage_mut()
        .judgments_mut()
        .remove_assessors(&BTreeSet::from(["bob".to_string()]))
        .unwrap();

    assert!(removed);
    assert_eq!(
        test.service.storage().judgments().assessors(),
        BTreeSet::from(["alice".to_string()])
    );
    assert_eq!(reference_count(&test.service, &shared_digest), Some(1));
    assert_eq!(reference_count(&test.service, &bob_digest), None);
    assert_eq!(stored_entries(&test.service), 2);

    let test = test.reopen(3);
    assert_eq!(reference_count(&test.service, &shared_digest), Some(1));
    assert_eq!(stored_entries(&test.service), 2);
}

#[test]
fn test_live_snapshots_survive_compaction() {
    let mut test = TestService::new(4);
    let mut handles = Vec::new();
    for (i, assessor) in ["alice", "bob", "carol", "bob"].into_iter().enumerate() {
        let first = snapshot(i as u64 * 2, 6);
        let second = snapshot(i as u64 * 2 + 1, 6);
        let appended = test
            .service
            .submit(assessor, record(&format!("q{i}")), Some((&first, &second)))
            .unwrap();
        handles.push((assessor, appended.handle.unwrap(), first, second));
    }
    let results_len = |service: &EvaluationService| {
        std::fs::metadata(service.storage().root().join("results"))
            .unwrap()
            .len()
    };
    let before = results_len(&test.service);

    test.service
        .storage_mut()
        .judgments_mut()
        .remove_assessors(&BTreeSet::from(["bob".to_string()]))
        .unwrap();

    assert!(results_len(&test.service) < before);
    for (assessor, handle, first, second) in handles {
        let pair = test.service.storage().judgments().result_pair(&handle).unwrap();
        if assessor == "bob" {
            assert_eq!(pair, None);
        } else {
            assert_eq!(pair, Some((first, second)));
        }
    }
}

#[test]
fn test_clones_read_each_others_writes() {
    let test = TestService::new(5);
    let mut writer = test.service.storage().judgments().clone();
    let reader = test.service.storage().judgments().clone();

    assert!(reader.list("alice").unwrap().is_empty());
    writer.append("alice", record("first"), None, None).unwrap();
    writer.append("alice", record("second"), None, None).unwrap();

    let listed: Vec<String> = reader
        .list("alice")
        .unwrap()
        .into_iter()
        .map(|r| r.query)
        .collect();
    assert_eq!(listed, vec!["first", "second"]);
}

#[test]
fn test_settings_persist_across_reopen() {
    let mut test = TestService::new(6);
    test.create_set("news", &["election", "  weather ", "election"]);
    test.create_set("shopping", &["shoes"]);
    {
        let storage = test.service.storage_mut();
        storage.queries_mut().set_active("shopping", false).unwrap();
        storage.queries_mut().set_showing_sets(true).unwrap();
        storage
            .queries_mut()
            .rename("news", "current events")
            .unwrap();
        storage
            .preferences_mut()
            .set_password("hunter2", "a classic")
            .unwrap();
        storage
            .preferences_mut()
            .set_administrators(BTreeSet::from(["root".to_string()]))
            .unwrap();
        storage
            .judgments_mut()
            .set_result_prefs(ResultPrefs {
                max_results: 7,
                ..ResultPrefs::default()
            })
            .unwrap();
    }

    let test = test.reopen(6);
    let storage = test.service.storage();
    assert_eq!(
        storage.queries().names(),
        queries(&["current events", "shopping"])
    );
    assert_eq!(storage.queries().active_names(), queries(&["current events"]));
    assert_eq!(
        storage.queries().get("current events").unwrap().unwrap().as_slice(),
        queries(&["election", "weather"]).as_slice()
    );
    assert!(storage.queries().is_showing_sets());
    assert!(storage.preferences().check_password("hunter2"));
    assert!(!storage.preferences().check_password("hunter3"));
    assert_eq!(
        storage.preferences().password_hint().as_deref(),
        Some("a classic")
    );
    assert!(storage.preferences().is_administrator("root"));
    assert_eq!(storage.judgments().result_prefs().max_results, 7);
}

#[test]
fn test_delete_all_leaves_empty_root() {
    let mut test = TestService::new(7);
    test.create_set("s", &["q"]);
    test.service
        .submit("alice", record("q"), Some((&snapshot(1, 1), &snapshot(2, 1))))
        .unwrap();

    let TestService { dir, service } = test;
    service.delete_all().unwrap();

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

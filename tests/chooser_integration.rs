//! Integration tests for query selection over real storage.

mod common;

use std::collections::BTreeSet;
use std::thread;

use common::fixtures::{FIRST_PROFILE, JudgmentRecordBuilder, TestService, record};
use sxs::chooser::{AssessorStatus, QueryChooser};
use sxs::storage::{JudgmentStore, QueryStore};

#[test]
fn test_judged_query_never_chosen_again_after_reopen() {
    let mut test = TestService::new(1);
    test.create_set("S1", &["cat", "dog"]);
    test.service.submit("alice", record("cat"), None).unwrap();

    let test = test.reopen(2);

    for _ in 0..100 {
        assert_eq!(
            test.service.next_query("alice", Some("S1")).unwrap().as_deref(),
            Some("dog")
        );
    }
}

#[test]
fn test_assessor_walks_every_query_once() {
    let mut test = TestService::new(3);
    let animals = ["ant", "bee", "cat", "dog", "eel"];
    let plants = ["ash", "elm", "fir", "oak"];
    test.create_set("animals", &animals);
    test.create_set("plants", &plants);
    let total = animals.len() + plants.len();

    let mut seen = BTreeSet::new();
    for _ in 0..total {
        let query = test.service.next_query("alice", None).unwrap().unwrap();
        assert!(seen.insert(query.clone()), "{query} chosen twice");
        test.service.submit("alice", record(&query), None).unwrap();
    }

    assert_eq!(seen.len(), total);
    assert_eq!(test.service.chooser().unjudged_count("alice", "animals"), Some(0));
    assert_eq!(test.service.chooser().unjudged_count("alice", "plants"), Some(0));
    // Exhausted: still answers, from anything active.
    assert!(test.service.next_query("alice", None).unwrap().is_some());
}

#[test]
fn test_rename_keeps_progress() {
    let mut test = TestService::new(4);
    test.create_set("S1", &["cat", "dog", "eel"]);
    test.service.submit("alice", record("cat"), None).unwrap();
    test.service.next_query("alice", Some("S1")).unwrap();

    test.service
        .storage_mut()
        .queries_mut()
        .rename("S1", "S2")
        .unwrap();

    let chooser = test.service.chooser();
    assert_eq!(chooser.status("alice"), AssessorStatus::Ready);
    assert_eq!(chooser.unjudged_count("alice", "S2"), Some(2));
    for _ in 0..50 {
        assert_ne!(chooser.choose_from("alice", "S2").unwrap().as_deref(), Some("cat"));
    }
}

#[test]
fn test_judgments_under_other_pair_are_ignored() {
    let mut test = TestService::new(5);
    test.create_set("S1", &["cat", "dog"]);
    let other = JudgmentRecordBuilder::new()
        .query("cat")
        .profiles(FIRST_PROFILE, "experimental")
        .build();
    test.service.submit("alice", other, None).unwrap();

    let seen: BTreeSet<String> = (0..100)
        .filter_map(|_| test.service.next_query("alice", Some("S1")).unwrap())
        .collect();

    assert!(seen.contains("cat"));
}

#[test]
fn test_concurrent_assessors_never_repeat() {
    let mut test = TestService::new(6);
    let items: Vec<String> = (0..40).map(|i| format!("query {i:02}")).collect();
    let refs: Vec<&str> = items.iter().map(String::as_str).collect();
    test.create_set("bench", &refs);

    let service = &test.service;
    thread::scope(|scope| {
        for worker in 0..4 {
            let mut judgments = service.storage().judgments().clone();
            let chooser = service.chooser().clone();
            let expected = items.len();
            scope.spawn(move || {
                let assessor = format!("assessor-{worker}");
                let mut seen = BTreeSet::new();
                for _ in 0..expected {
                    let query = chooser.choose(&assessor).unwrap().unwrap();
                    assert!(seen.insert(query.clone()), "{assessor} got {query} twice");
                    judgments
                        .append(&assessor, record(&query), None, None)
                        .unwrap();
                }
                assert_eq!(seen.len(), expected);
            });
        }
    });

    assert_eq!(service.storage().judgments().assessors().len(), 4);
}

#[test]
fn test_choosing_while_sets_change() {
    let mut test = TestService::new(7);
    test.create_set("base", &["one", "two", "three"]);

    let service = &test.service;
    thread::scope(|scope| {
        let mut queries = service.storage().queries().clone();
        scope.spawn(move || {
            for i in 0..20 {
                let name = format!("extra {i}");
                queries.create(&name, &[format!("extra query {i}")]).unwrap();
                if i % 3 == 0 {
                    queries.remove(&name).unwrap();
                }
            }
        });
        for worker in 0..3 {
            let mut judgments = service.storage().judgments().clone();
            let chooser = service.chooser().clone();
            scope.spawn(move || {
                let assessor = format!("assessor-{worker}");
                for _ in 0..30 {
                    if let Some(query) = chooser.choose(&assessor).unwrap() {
                        judgments
                            .append(&assessor, record(&query), None, None)
                            .unwrap();
                    }
                }
            });
        }
    });

    let names = service.storage().queries().names();
    assert_eq!(names.len(), 1 + 20 - 7);
}

#[test]
fn test_same_seed_same_sequence() {
    let mut first = TestService::new(42);
    let mut second = TestService::new(42);
    for test in [&mut first, &mut second] {
        test.create_set("a", &["a1", "a2", "a3"]);
        test.create_set("b", &["b1", "b2", "b3", "b4"]);
    }

    let draw = |test: &TestService| -> Vec<Option<String>> {
        (0..25)
            .map(|_| test.service.next_query("alice", None).unwrap())
            .collect()
    };

    assert_eq!(draw(&first), draw(&second));
}

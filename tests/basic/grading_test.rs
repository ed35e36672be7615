use gradesync::error::ErrorKind;
use gradesync::submissions::grading::GradeEngine;
use gradesync::submissions::store::SubmissionStore;
use gradesync::submissions::{Category, Status};

use crate::common::{self, raw_issue, snapshot, FakeTracker, Listing, GRADER, JAN_15};

#[test]
fn test_refresh_expect_latest_grader_issue_per_category_stored() {
    let td = common::tempdir();
    let config = common::test_config(td.path());
    let store = common::open_store(&config);
    let tracker = FakeTracker::default();
    tracker.set(
        "hugokar-task-1",
        Listing::Issues(vec![
            raw_issue("Komplettera", GRADER, "2024-01-20T08:00:00Z"),
            raw_issue("Pass", GRADER, "2024-01-25T08:00:00Z"),
            raw_issue("Pass", "hugokar", "2024-01-30T08:00:00Z"),
            raw_issue("Question", GRADER, "2024-01-31T08:00:00Z"),
        ]),
    );
    let engine = GradeEngine::new(tracker, store.clone(), GRADER);

    let actual = engine.refresh("hugokar", 1);

    assert_eq!(actual.status, Status::Success);
    assert_eq!(
        actual.issues.keys().copied().collect::<Vec<_>>(),
        vec![Category::Pass, Category::Komplettera]
    );
    assert_eq!(actual.issues[&Category::Pass].body, "Pass from ta1");
    let record = store.read("hugokar", 1).unwrap().unwrap();
    assert_eq!(record.issues, actual.issues);
}

#[test]
fn test_refresh_replaces_issues_and_keeps_snapshots() {
    let td = common::tempdir();
    let config = common::test_config(td.path());
    let store = common::open_store(&config);
    store
        .update("hugokar", 1, |mut record| {
            record.record_snapshot(snapshot("hugokar", "h1", JAN_15));
            Ok(record)
        })
        .unwrap();
    let tracker = FakeTracker::default();
    tracker.set(
        "hugokar-task-1",
        Listing::Issues(vec![raw_issue("Fail", GRADER, "2024-01-20T08:00:00Z")]),
    );
    let engine = GradeEngine::new(tracker.clone(), store.clone(), GRADER);
    assert!(engine.refresh("hugokar", 1).is_success());

    tracker.set("hugokar-task-1", Listing::Issues(Vec::new()));
    let actual = engine.refresh("hugokar", 1);

    assert!(actual.is_success());
    let record = store.read("hugokar", 1).unwrap().unwrap();
    assert!(record.issues.is_empty());
    assert_eq!(record.clone.unwrap().hash, "h1");
}

#[test]
fn test_refresh_when_repository_missing_expect_empty_success_and_no_record() {
    let td = common::tempdir();
    let config = common::test_config(td.path());
    let store = common::open_store(&config);
    let tracker = FakeTracker::default();
    tracker.set("ghost-task-1", Listing::Missing);
    let engine = GradeEngine::new(tracker, store.clone(), GRADER);

    let actual = engine.refresh("ghost", 1);

    assert_eq!(actual.status, Status::Success);
    assert!(actual.issues.is_empty());
    assert!(store.read("ghost", 1).unwrap().is_none());
}

#[test]
fn test_refresh_when_transport_fails_expect_failed_and_store_unchanged() {
    let td = common::tempdir();
    let config = common::test_config(td.path());
    let store = common::open_store(&config);
    let tracker = FakeTracker::default();
    tracker.set(
        "hugokar-task-1",
        Listing::Issues(vec![raw_issue("Pass", GRADER, "2024-01-20T08:00:00Z")]),
    );
    let engine = GradeEngine::new(tracker.clone(), store.clone(), GRADER);
    engine.refresh("hugokar", 1);
    let before = store.read("hugokar", 1).unwrap();

    tracker.set("hugokar-task-1", Listing::Offline);
    let actual = engine.refresh("hugokar", 1);

    assert_eq!(actual.status, Status::Failed);
    assert_eq!(actual.kind, Some(ErrorKind::Transport));
    assert!(actual.reason.unwrap().contains("502"));
    assert_eq!(store.read("hugokar", 1).unwrap(), before);
}

#[test]
fn test_refresh_many_expect_one_result_per_student() {
    let td = common::tempdir();
    let config = common::test_config(td.path());
    let store = common::open_store(&config);
    let tracker = FakeTracker::default();
    tracker.set(
        "anna-task-4",
        Listing::Issues(vec![raw_issue("Pass", GRADER, "2024-02-01T08:00:00Z")]),
    );
    tracker.set("bertil-task-4", Listing::Offline);
    let engine = GradeEngine::new(tracker, store.clone(), GRADER);
    let students = vec!["anna".to_owned(), "bertil".to_owned()];

    let actual = engine.refresh_many(&students, 4, 2);

    assert_eq!(actual.len(), 2);
    assert!(actual[0].1.is_success());
    assert_eq!(actual[1].1.status, Status::Failed);
    assert!(store.read("anna", 4).unwrap().is_some());
    assert!(store.read("bertil", 4).unwrap().is_none());
}

#[test]
fn test_create_issue_expect_assigned_to_student_and_store_untouched() {
    let td = common::tempdir();
    let config = common::test_config(td.path());
    let store = common::open_store(&config);
    let tracker = FakeTracker::default();
    let engine = GradeEngine::new(tracker.clone(), store.clone(), GRADER);

    let actual = engine.create_issue("hugokar", 1, "Komplettera", "Fix the tests");

    assert_eq!(actual.status, Status::Success);
    let created = tracker.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].repo, "hugokar-task-1");
    assert_eq!(created[0].title, "Komplettera");
    assert_eq!(created[0].body, "Fix the tests");
    assert_eq!(created[0].assignee, "hugokar");
    assert!(store.student("hugokar").unwrap().is_empty());
}

#[test]
fn test_create_issue_when_tracker_fails_expect_failed_outcome() {
    let td = common::tempdir();
    let config = common::test_config(td.path());
    let store = common::open_store(&config);
    let tracker = FakeTracker::default();
    tracker.set("hugokar-task-1", Listing::Offline);
    let engine = GradeEngine::new(tracker.clone(), store, GRADER);

    let actual = engine.create_issue("hugokar", 1, "Pass", "");

    assert_eq!(actual.status, Status::Failed);
    assert_eq!(actual.kind, Some(ErrorKind::Transport));
    assert!(tracker.created.lock().unwrap().is_empty());
}

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use url2md_core::{
    JobStatus, LifecycleError, LifecycleStore, RetentionPolicy, MAX_LIST_LIMIT,
};

fn at(minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
}

#[test]
fn new_jobs_start_pending_with_nothing_set() {
    let store = LifecycleStore::default();
    let job = store.create("https://example.com/a", true, false);

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.markdown, None);
    assert_eq!(job.error_message, None);
    assert_eq!(job.completed_at, None);
    assert_eq!(store.get(job.id), Some(job));
}

#[test]
fn completed_job_carries_markdown_and_completion_time() {
    let store = LifecycleStore::default();
    let job = store.create("https://example.com/a", true, false);

    let processing = store.start_processing(job.id).unwrap();
    assert_eq!(processing.status, JobStatus::Processing);
    assert_eq!(processing.completed_at, None);

    let done = store.complete(job.id, "# Hello", "Hello").unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.markdown.as_deref(), Some("# Hello"));
    assert_eq!(done.title.as_deref(), Some("Hello"));
    assert_eq!(done.error_message, None);
    assert!(done.completed_at.is_some());
}

#[test]
fn failed_job_carries_error_and_no_markdown() {
    let store = LifecycleStore::default();
    let job = store.create("https://example.com/a", true, false);
    store.start_processing(job.id).unwrap();

    let failed = store.fail(job.id, "HTTP 404 Not Found").unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("HTTP 404 Not Found"));
    assert_eq!(failed.markdown, None);
    assert!(failed.completed_at.is_some());
}

#[test]
fn terminal_jobs_reject_further_transitions_and_stay_unchanged() {
    let store = LifecycleStore::default();
    let job = store.create("https://example.com/a", true, false);
    store.start_processing(job.id).unwrap();
    let done = store.complete(job.id, "body", "Title").unwrap();

    let err = store.fail(job.id, "late failure").unwrap_err();
    assert_eq!(
        err,
        LifecycleError::InvalidTransition {
            id: job.id,
            from: JobStatus::Completed,
            to: JobStatus::Failed,
        }
    );
    assert!(store.complete(job.id, "other", "Other").is_err());
    assert!(store.start_processing(job.id).is_err());
    assert_eq!(store.get(job.id), Some(done));
}

#[test]
fn unknown_ids_are_not_found() {
    let store = LifecycleStore::default();
    let id = uuid::Uuid::new_v4();
    assert_eq!(store.get(id), None);
    assert_eq!(
        store.start_processing(id).unwrap_err(),
        LifecycleError::NotFound(id)
    );
}

#[test]
fn list_recent_is_newest_first_and_respects_limit() {
    let store = LifecycleStore::default();
    for minute in [3, 1, 7, 5, 2, 9, 4] {
        store.create_at(&format!("https://e.com/{minute}"), true, false, at(minute));
    }

    let recent = store.list_recent(5);
    assert_eq!(recent.len(), 5);
    let urls: Vec<_> = recent.iter().map(|job| job.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://e.com/9",
            "https://e.com/7",
            "https://e.com/5",
            "https://e.com/4",
            "https://e.com/3"
        ]
    );
    assert!(recent
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
}

#[test]
fn same_instant_jobs_list_in_reverse_insertion_order() {
    let store = LifecycleStore::default();
    let first = store.create_at("https://e.com/first", true, false, at(0));
    let second = store.create_at("https://e.com/second", true, false, at(0));

    let ids: Vec<_> = store.list_recent(10).into_iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[test]
fn list_recent_is_clamped_to_page_bound() {
    let store = LifecycleStore::default();
    for i in 0..(MAX_LIST_LIMIT + 10) {
        store.create(&format!("https://e.com/{i}"), true, false);
    }
    assert_eq!(store.list_recent(1_000).len(), MAX_LIST_LIMIT);
}

#[test]
fn created_since_filters_by_cutoff() {
    let store = LifecycleStore::default();
    store.create_at("https://e.com/old", true, false, at(0));
    store.create_at("https://e.com/new", true, false, at(30));

    let recent = store.created_since(at(10), 100);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].url, "https://e.com/new");
}

#[test]
fn retention_evicts_oldest_finished_jobs_only() {
    let store = LifecycleStore::new(RetentionPolicy {
        max_jobs: Some(2),
        max_age: None,
    });
    let in_flight = store.create_at("https://e.com/in-flight", true, false, at(0));
    let finished = store.create_at("https://e.com/finished", true, false, at(1));
    store.start_processing(finished.id).unwrap();
    store.fail(finished.id, "boom").unwrap();

    let newest = store.create_at("https://e.com/newest", true, false, at(2));

    assert_eq!(store.len(), 2);
    assert!(store.get(in_flight.id).is_some());
    assert!(store.get(finished.id).is_none());
    assert!(store.get(newest.id).is_some());
}

#[test]
fn retention_by_age_drops_stale_finished_jobs() {
    let store = LifecycleStore::new(RetentionPolicy {
        max_jobs: None,
        max_age: Some(Duration::minutes(30)),
    });
    let stale = store.create_at("https://e.com/stale", true, false, at(0));
    store.start_processing(stale.id).unwrap();
    store.complete(stale.id, "x", "x").unwrap();

    store.create_at("https://e.com/fresh", true, false, at(45));
    assert!(store.get(stale.id).is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn restore_marks_interrupted_jobs_failed() {
    let source = LifecycleStore::default();
    let done = source.create("https://e.com/done", true, false);
    source.start_processing(done.id).unwrap();
    source.complete(done.id, "md", "Done").unwrap();
    let interrupted = source.create("https://e.com/interrupted", false, true);
    source.start_processing(interrupted.id).unwrap();

    let target = LifecycleStore::default();
    assert_eq!(target.restore(source.snapshot()), 2);
    assert_eq!(target.restore(source.snapshot()), 0);

    let restored_done = target.get(done.id).unwrap();
    assert_eq!(restored_done.status, JobStatus::Completed);
    assert_eq!(restored_done.markdown.as_deref(), Some("md"));

    let restored_interrupted = target.get(interrupted.id).unwrap();
    assert_eq!(restored_interrupted.status, JobStatus::Failed);
    assert!(restored_interrupted.error_message.is_some());
    assert!(restored_interrupted.completed_at.is_some());
}

#[test]
fn age_limit_beyond_the_calendar_keeps_every_job() {
    let store = LifecycleStore::new(RetentionPolicy {
        max_jobs: None,
        max_age: Some(Duration::seconds(10_000_000_000_000)),
    });
    let finished = store.create_at("https://e.com/old", true, false, at(0));
    store.start_processing(finished.id).unwrap();
    store.complete(finished.id, "x", "x").unwrap();

    store.create_at("https://e.com/next", true, false, at(1));
    assert_eq!(store.len(), 2);
    assert!(store.get(finished.id).is_some());
}

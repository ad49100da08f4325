//! Queue invariants against a real SQLite file

use article_relay::filter::AdmissionFilter;
use article_relay::queue::{handle_fetch_failure, FetchFailureOutcome, RetryPolicy};
use article_relay::storage::{ItemRef, NewItem, SqliteStorage, StatName, Storage};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn new_item(external_id: &str) -> NewItem {
    NewItem {
        external_id: external_id.to_string(),
        origin: "worldnews".to_string(),
        url: format!("https://news.example.com/{}", external_id),
        created_at: at(1_000),
    }
}

fn open_temp() -> (TempDir, std::path::PathBuf, SqliteStorage) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("relay.db");
    let storage = SqliteStorage::new(&path).expect("Failed to open storage");
    (dir, path, storage)
}

fn id_of(storage: &SqliteStorage, external_id: &str) -> Option<i64> {
    storage
        .get_item(&ItemRef::ExternalId(external_id.to_string()))
        .unwrap()
        .map(|detail| detail.item.id)
}

fn stat(storage: &SqliteStorage, name: StatName) -> i64 {
    storage
        .load_stats()
        .unwrap()
        .into_iter()
        .find(|s| s.name == name)
        .map(|s| s.value)
        .unwrap_or(0)
}

#[test]
fn test_admission_filter_patterns() {
    let filter = AdmissionFilter::compile(["*.blocked.com", "blocked2.com", "*.jpg"]);

    assert!(filter.is_banned("https://sub.blocked.com/x"));
    assert!(!filter.is_banned("https://blocked.com/x"));
    assert!(filter.is_banned("https://blocked2.com/x"));
    assert!(filter.is_banned("https://BLOCKED2.com/x"));
    assert!(filter.is_banned("https://site.com/img.JPG"));
    assert!(!filter.is_banned("https://site.com/img.jpeg"));
}

#[test]
fn test_item_moves_through_every_stage() {
    let (_dir, _path, storage) = open_temp();
    let now = at(2_000);

    assert!(storage.insert_if_absent(&new_item("t3_a"), now).unwrap());
    assert!(!storage.insert_if_absent(&new_item("t3_a"), now).unwrap());

    let leases = storage.lease_for_fetch(now, 10).unwrap();
    assert_eq!(leases.len(), 1);
    let id = leases[0].item_id;

    assert!(storage.complete_fetch(id, "<html></html>", now).unwrap());
    assert!(storage.lease_for_fetch(now, 10).unwrap().is_empty());

    let leases = storage.lease_for_process(10).unwrap();
    assert_eq!(leases.len(), 1);
    assert_eq!(leases[0].raw_payload, "<html></html>");

    assert!(storage.complete_process(id, "> text", now).unwrap());
    assert!(storage.lease_for_process(10).unwrap().is_empty());

    let leases = storage.lease_for_publish(10).unwrap();
    assert_eq!(leases.len(), 1);
    assert_eq!(leases[0].external_id, "t3_a");
    assert_eq!(leases[0].origin, "worldnews");

    assert!(storage.complete_publish(id, now).unwrap());
    assert!(storage.lease_for_publish(10).unwrap().is_empty());
    assert!(!storage.complete_publish(id, now).unwrap());

    assert_eq!(stat(&storage, StatName::TotalDiscovered), 1);
    assert_eq!(stat(&storage, StatName::Fetched), 1);
    assert_eq!(stat(&storage, StatName::Processed), 1);
    assert_eq!(stat(&storage, StatName::Published), 1);
}

#[test]
fn test_retry_ceiling_evicts_item_and_content() {
    let (_dir, _path, storage) = open_temp();
    let policy = RetryPolicy::default();
    storage.insert_if_absent(&new_item("t3_flaky"), at(0)).unwrap();
    let id = id_of(&storage, "t3_flaky").unwrap();

    let mut now = at(0);
    for expected in 1..=3 {
        let outcome = handle_fetch_failure(&storage, id, &policy, now).unwrap();
        assert!(matches!(
            outcome,
            FetchFailureOutcome::Rescheduled { attempt, .. } if attempt == expected
        ));
        // Not due again until the delay has passed
        assert!(storage.lease_for_fetch(now, 10).unwrap().is_empty());
        now = now + policy.delay;
        assert_eq!(storage.lease_for_fetch(now, 10).unwrap().len(), 1);
    }

    let outcome = handle_fetch_failure(&storage, id, &policy, now).unwrap();
    assert_eq!(outcome, FetchFailureOutcome::Evicted { attempt: 4 });
    assert!(id_of(&storage, "t3_flaky").is_none());
    assert_eq!(storage.queue_depths(now).unwrap().raw_payloads, 0);
    assert_eq!(stat(&storage, StatName::Evicted), 1);
}

#[test]
fn test_process_lease_skips_missing_payload() {
    let (_dir, path, storage) = open_temp();
    let now = at(5_000);
    storage.insert_if_absent(&new_item("t3_a"), now).unwrap();
    storage.insert_if_absent(&new_item("t3_b"), now).unwrap();
    let a = id_of(&storage, "t3_a").unwrap();
    let b = id_of(&storage, "t3_b").unwrap();
    storage.complete_fetch(a, "payload a", now).unwrap();
    storage.complete_fetch(b, "payload b", now).unwrap();

    // Simulate a payload lost behind the store's back
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE content SET raw_payload = NULL WHERE item_id = ?1",
        [b],
    )
    .unwrap();

    let leases = storage.lease_for_process(10).unwrap();
    assert_eq!(leases.len(), 1);
    assert_eq!(leases[0].item_id, a);

    // The unprocessable item is a dead end for cleanup
    let report = storage.purge_stale(now, Duration::hours(24)).unwrap();
    assert_eq!(report.dead_ends, 1);
    assert!(id_of(&storage, "t3_b").is_none());
    assert!(id_of(&storage, "t3_a").is_some());
}

#[test]
fn test_purge_removes_only_old_published_items() {
    let (_dir, _path, storage) = open_temp();
    let day = Duration::hours(24);

    for (external_id, published) in [("t3_old", at(0)), ("t3_new", at(90_000))] {
        storage.insert_if_absent(&new_item(external_id), at(0)).unwrap();
        let id = id_of(&storage, external_id).unwrap();
        storage.complete_fetch(id, "raw", published).unwrap();
        storage.complete_process(id, "text", published).unwrap();
        storage.complete_publish(id, published).unwrap();
    }
    storage.insert_if_absent(&new_item("t3_pending"), at(0)).unwrap();

    let report = storage.purge_stale(at(100_000), day).unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.dead_ends, 0);

    assert!(id_of(&storage, "t3_old").is_none());
    assert!(id_of(&storage, "t3_new").is_some());
    assert!(id_of(&storage, "t3_pending").is_some());
    assert_eq!(stat(&storage, StatName::Published), 2);
}

#[test]
fn test_concurrent_inserts_are_not_duplicated() {
    let (_dir, _path, storage) = open_temp();
    let storage = Arc::new(storage);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                let mut inserted = 0;
                for n in 0..25 {
                    // Every worker offers the same ids
                    let item = new_item(&format!("t3_{}", n));
                    if storage.insert_if_absent(&item, at(worker)).unwrap() {
                        inserted += 1;
                    }
                }
                inserted
            })
        })
        .collect();

    let inserted: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(inserted, 25);
    assert_eq!(stat(&storage, StatName::TotalDiscovered), 25);
    assert_eq!(storage.queue_depths(at(10)).unwrap().total_items, 25);
}

#[test]
fn test_concurrent_leases_complete_each_item_once() {
    let (_dir, _path, storage) = open_temp();
    for n in 0..20 {
        storage
            .insert_if_absent(&new_item(&format!("t3_{}", n)), at(0))
            .unwrap();
    }
    let storage = Arc::new(storage);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                let mut completed = 0;
                for lease in storage.lease_for_fetch(at(10), 20).unwrap() {
                    if storage.complete_fetch(lease.item_id, "raw", at(10)).unwrap() {
                        completed += 1;
                    }
                }
                completed
            })
        })
        .collect();

    let completed: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(completed, 20);
    assert_eq!(stat(&storage, StatName::Fetched), 20);
}

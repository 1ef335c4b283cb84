//! Ledger contract tests: uniqueness enforcement, idempotent identity
//! upserts, and the due-for-sync query.

use chrono::{Duration, Utc};
use octosphere::error::LedgerError;
use octosphere::ledger::{Identity, Ledger};
use tempfile::tempdir;

fn identity(orcid: &str) -> Identity {
    Identity {
        orcid: orcid.to_string(),
        octopus_user_id: "user-1".to_string(),
        bsky_handle: "alice.test".to_string(),
        app_password: "hunter2".to_string(),
        last_sync: None,
        active: true,
    }
}

#[tokio::test]
async fn upsert_is_idempotent_and_updates_in_place() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    ledger.upsert_identity(&identity("orcid-1")).await.unwrap();

    let mut relinked = identity("orcid-1");
    relinked.bsky_handle = "alice.moved.test".to_string();
    ledger.upsert_identity(&relinked).await.unwrap();

    let stored = ledger.get_identity("orcid-1").await.unwrap().unwrap();
    assert_eq!(stored.bsky_handle, "alice.moved.test");
    assert!(stored.active);
}

#[tokio::test]
async fn relink_reactivates_but_preserves_last_sync() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    ledger.upsert_identity(&identity("orcid-1")).await.unwrap();
    let synced_at = Utc::now();
    ledger.touch_last_sync("orcid-1", synced_at).await.unwrap();
    ledger.deactivate("orcid-1").await.unwrap();

    ledger.upsert_identity(&identity("orcid-1")).await.unwrap();
    let stored = ledger.get_identity("orcid-1").await.unwrap().unwrap();
    assert!(stored.active);
    assert!(stored.last_sync.is_some());
}

#[tokio::test]
async fn missing_identity_is_none() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    assert!(ledger.get_identity("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_triple_is_a_conflict() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    ledger.upsert_identity(&identity("orcid-1")).await.unwrap();

    ledger
        .record_synced("orcid-1", "P1", "v1", "at://a")
        .await
        .unwrap();
    let second = ledger.record_synced("orcid-1", "P1", "v1", "at://b").await;
    assert!(matches!(second, Err(LedgerError::Conflict { .. })));

    // The first entry stands untouched.
    let entries = ledger.synced_for("orcid-1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].at_uri, "at://a");

    // A different version of the same publication is fine.
    ledger
        .record_synced("orcid-1", "P1", "v2", "at://c")
        .await
        .unwrap();
    assert!(ledger.is_synced("orcid-1", "P1", "v2").await.unwrap());
    assert!(!ledger.is_synced("orcid-1", "P1", "v3").await.unwrap());
}

#[tokio::test]
async fn same_triple_for_another_identity_is_allowed() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    ledger.upsert_identity(&identity("orcid-1")).await.unwrap();
    ledger.upsert_identity(&identity("orcid-2")).await.unwrap();

    ledger
        .record_synced("orcid-1", "P1", "v1", "at://a")
        .await
        .unwrap();
    ledger
        .record_synced("orcid-2", "P1", "v1", "at://b")
        .await
        .unwrap();
}

#[tokio::test]
async fn identities_due_respects_interval_and_active_flag() {
    let ledger = Ledger::open_in_memory().await.unwrap();

    // Never synced: due.
    ledger.upsert_identity(&identity("orcid-new")).await.unwrap();
    // Synced long ago: due.
    ledger.upsert_identity(&identity("orcid-stale")).await.unwrap();
    ledger
        .touch_last_sync("orcid-stale", Utc::now() - Duration::days(30))
        .await
        .unwrap();
    // Synced recently: not due.
    ledger.upsert_identity(&identity("orcid-fresh")).await.unwrap();
    ledger
        .touch_last_sync("orcid-fresh", Utc::now())
        .await
        .unwrap();
    // Deactivated: never due.
    ledger.upsert_identity(&identity("orcid-off")).await.unwrap();
    ledger.deactivate("orcid-off").await.unwrap();

    let due = ledger.identities_due(7).await.unwrap();
    let orcids: Vec<_> = due.iter().map(|i| i.orcid.as_str()).collect();
    assert_eq!(orcids, vec!["orcid-new", "orcid-stale"]);
}

#[tokio::test]
async fn ledger_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("octosphere.db");

    {
        let ledger = Ledger::open(&path).await.unwrap();
        ledger.upsert_identity(&identity("orcid-1")).await.unwrap();
        ledger
            .record_synced("orcid-1", "P1", "v1", "at://a")
            .await
            .unwrap();
    }

    let reopened = Ledger::open(&path).await.unwrap();
    assert!(reopened.is_synced("orcid-1", "P1", "v1").await.unwrap());
    assert_eq!(
        reopened
            .get_identity("orcid-1")
            .await
            .unwrap()
            .unwrap()
            .octopus_user_id,
        "user-1"
    );
}

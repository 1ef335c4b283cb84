//! Durable sync state: linked identities and the append-only record of
//! mirrored publication versions.
//!
//! The ledger is the only shared-resource coordination point between
//! overlapping passes. Uniqueness of (orcid, publication, version) is enforced
//! by SQLite itself — an atomic insert-or-conflict — never by application
//! logic, so two racing passes cannot double-insert. All writes are single-row
//! transactions; no transaction spans a whole pass, which is what makes a
//! crash mid-sync leave a correct partial ledger.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::LedgerError;

/// A linked author: one row per ORCID, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// External researcher identifier; primary key.
    pub orcid: String,
    /// Internal Octopus user id, resolved at link time; publications are
    /// listed by this, not by the ORCID.
    pub octopus_user_id: String,
    pub bsky_handle: String,
    /// Opaque stored credential. Encryption at rest is the caller's concern.
    pub app_password: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Immutable audit entry: this version has been mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedVersion {
    pub publication_id: String,
    pub version_id: String,
    pub at_uri: String,
    pub synced_at: DateTime<Utc>,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS identities (
        orcid TEXT PRIMARY KEY,
        octopus_user_id TEXT NOT NULL,
        bsky_handle TEXT NOT NULL,
        app_password TEXT NOT NULL,
        last_sync TEXT,
        active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS synced_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        orcid TEXT NOT NULL REFERENCES identities(orcid),
        publication_id TEXT NOT NULL,
        version_id TEXT NOT NULL,
        at_uri TEXT NOT NULL,
        synced_at TEXT NOT NULL,
        UNIQUE(orcid, publication_id, version_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_synced_versions_orcid
        ON synced_versions(orcid)",
];

fn format_ts(ts: DateTime<Utc>) -> String {
    // Fixed-width form so lexicographic TEXT comparison matches time order.
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Handle to the sync ledger. Cheap to clone; wraps a connection pool.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Open (creating if missing) the ledger database at `path` and bring the
    /// schema up to date.
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let ledger = Self { pool };
        ledger.migrate().await?;
        info!(path = %path.display(), "Opened sync ledger");
        Ok(ledger)
    }

    /// In-memory ledger for tests. Single connection, since every SQLite
    /// `:memory:` connection is its own database.
    pub async fn open_in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let ledger = Self { pool };
        ledger.migrate().await?;
        Ok(ledger)
    }

    async fn migrate(&self) -> Result<(), LedgerError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Create or update an identity. Re-linking refreshes the handle,
    /// credential and user id and reactivates the row; `last_sync` survives.
    pub async fn upsert_identity(&self, identity: &Identity) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO identities
                (orcid, octopus_user_id, bsky_handle, app_password, last_sync, active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(orcid) DO UPDATE SET
                octopus_user_id = excluded.octopus_user_id,
                bsky_handle = excluded.bsky_handle,
                app_password = excluded.app_password,
                active = excluded.active",
        )
        .bind(&identity.orcid)
        .bind(&identity.octopus_user_id)
        .bind(&identity.bsky_handle)
        .bind(&identity.app_password)
        .bind(identity.last_sync.map(format_ts))
        .bind(identity.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_identity(&self, orcid: &str) -> Result<Option<Identity>, LedgerError> {
        let row: Option<(String, String, String, String, Option<String>, bool)> =
            sqlx::query_as(
                "SELECT orcid, octopus_user_id, bsky_handle, app_password, last_sync, active
                 FROM identities WHERE orcid = ?",
            )
            .bind(orcid)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_identity).transpose()
    }

    /// Mark an identity inactive. The row and its audit trail remain.
    pub async fn deactivate(&self, orcid: &str) -> Result<(), LedgerError> {
        sqlx::query("UPDATE identities SET active = 0 WHERE orcid = ?")
            .bind(orcid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_sync(
        &self,
        orcid: &str,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        sqlx::query("UPDATE identities SET last_sync = ? WHERE orcid = ?")
            .bind(format_ts(at))
            .bind(orcid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Existence check against the uniqueness invariant. This is the
    /// at-most-once gate the engine consults before publishing.
    pub async fn is_synced(
        &self,
        orcid: &str,
        publication_id: &str,
        version_id: &str,
    ) -> Result<bool, LedgerError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM synced_versions
             WHERE orcid = ? AND publication_id = ? AND version_id = ?",
        )
        .bind(orcid)
        .bind(publication_id)
        .bind(version_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Insert one ledger entry for a successfully published version.
    ///
    /// Returns [`LedgerError::Conflict`] when the triple already exists — a
    /// concurrent or retried pass got there first, which callers must treat
    /// as "already synced".
    pub async fn record_synced(
        &self,
        orcid: &str,
        publication_id: &str,
        version_id: &str,
        at_uri: &str,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "INSERT INTO synced_versions
                (orcid, publication_id, version_id, at_uri, synced_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(orcid)
        .bind(publication_id)
        .bind(version_id)
        .bind(at_uri)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(LedgerError::Conflict {
                    orcid: orcid.to_string(),
                    publication_id: publication_id.to_string(),
                    version_id: version_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All ledger entries for one identity, in commit order.
    pub async fn synced_for(&self, orcid: &str) -> Result<Vec<SyncedVersion>, LedgerError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT publication_id, version_id, at_uri, synced_at
             FROM synced_versions WHERE orcid = ? ORDER BY id",
        )
        .bind(orcid)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(publication_id, version_id, at_uri, synced_at)| {
                Ok(SyncedVersion {
                    publication_id,
                    version_id,
                    at_uri,
                    synced_at: parse_ts(&synced_at)?,
                })
            })
            .collect()
    }

    /// Active identities whose last sync is absent or older than
    /// `interval_days`. Drives the scheduled `sync-due` run.
    pub async fn identities_due(&self, interval_days: i64) -> Result<Vec<Identity>, LedgerError> {
        let cutoff = format_ts(Utc::now() - chrono::Duration::days(interval_days));
        let rows: Vec<(String, String, String, String, Option<String>, bool)> =
            sqlx::query_as(
                "SELECT orcid, octopus_user_id, bsky_handle, app_password, last_sync, active
                 FROM identities
                 WHERE active = 1 AND (last_sync IS NULL OR last_sync < ?)
                 ORDER BY orcid",
            )
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_identity).collect()
    }
}

fn row_to_identity(
    row: (String, String, String, String, Option<String>, bool),
) -> Result<Identity, LedgerError> {
    let (orcid, octopus_user_id, bsky_handle, app_password, last_sync, active) = row;
    Ok(Identity {
        orcid,
        octopus_user_id,
        bsky_handle,
        app_password,
        last_sync: last_sync.as_deref().map(parse_ts).transpose()?,
        active,
    })
}

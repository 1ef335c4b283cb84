//! High-level pipeline: mirror one author's publication versions onto the
//! target network, at most once each.
//!
//! For a given identity the engine lists publications and their versions,
//! consults the ledger to skip versions already mirrored, transforms the rest
//! through the pure bridge mapping, publishes them in a stable order, and
//! commits each success to the ledger before moving on.
//!
//! # Failure semantics
//! - The listing stage is all-or-nothing: the full set of (publication,
//!   version) units is collected before the first write, and any source
//!   failure aborts the pass with zero ledger entries.
//! - Publishing is isolated per version: a rejected record lands in the
//!   failure list and the pass continues.
//! - A ledger conflict after a successful publish means a concurrent pass
//!   committed the same unit first; it is treated as success and the duplicate
//!   target reference is dropped.
//!
//! Cancellation at any point is safe: committed entries are durable and the
//! next pass resumes at the skip check.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::bridge::build_record;
use crate::contract::{
    Credential, PublicationSummary, PublicationVersion, Publisher, SourceClient,
};
use crate::error::{LedgerError, SyncError};
use crate::ledger::Ledger;

/// One successfully mirrored version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub publication_id: String,
    pub version_id: String,
    pub uri: String,
}

/// One version whose publish was rejected this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedVersion {
    pub publication_id: String,
    pub version_id: String,
    pub reason: String,
}

/// Outcome of one pass. Always reports partial progress; only a listing
/// failure is all-or-nothing, and that surfaces as an `Err` instead.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub published: Vec<PublishedVersion>,
    pub skipped: usize,
    pub failed: Vec<FailedVersion>,
}

/// Run one sync pass for the identity keyed by `orcid`.
pub async fn sync_identity<S, P>(
    ledger: &Ledger,
    source: &S,
    publisher: &P,
    orcid: &str,
) -> Result<SyncReport, SyncError>
where
    S: SourceClient,
    P: Publisher,
{
    let identity = ledger
        .get_identity(orcid)
        .await?
        .ok_or_else(|| SyncError::UnknownIdentity(orcid.to_string()))?;
    if !identity.active {
        return Err(SyncError::InactiveIdentity(orcid.to_string()));
    }
    let credential = Credential {
        handle: identity.bsky_handle.clone(),
        app_password: identity.app_password.clone(),
    };
    info!(orcid, handle = %identity.bsky_handle, "[SYNC] Starting pass");

    // Listing stage: collect every unit before the first write, so a source
    // failure anywhere leaves the ledger untouched.
    let mut units: Vec<(PublicationSummary, PublicationVersion)> = Vec::new();
    let publications = source
        .list_publications(&identity.octopus_user_id)
        .await?;
    for summary in publications {
        let versions = source.list_versions(&summary.publication_id).await?;
        for version in versions {
            units.push((summary.clone(), version));
        }
    }
    // Stable order: publish order is timeline order on the target network,
    // and reruns over unchanged data must be diffable.
    units.sort_by(|a, b| {
        (&a.0.publication_id, &a.1.version_id).cmp(&(&b.0.publication_id, &b.1.version_id))
    });
    info!(orcid, versions = units.len(), "[SYNC] Listing complete");

    let mut report = SyncReport::default();
    for (summary, version) in &units {
        let publication_id = summary.publication_id.as_str();
        let version_id = version.version_id.as_str();
        if ledger.is_synced(orcid, publication_id, version_id).await? {
            report.skipped += 1;
            continue;
        }
        let canonical_url = source.publication_url(publication_id, version_id);
        let record = build_record(summary, version, &canonical_url);
        let record_ref = match publisher.publish(&credential, &record).await {
            Ok(record_ref) => record_ref,
            Err(e) => {
                error!(
                    orcid,
                    publication_id,
                    version_id,
                    error = %e,
                    "[SYNC] Publish failed, continuing with remaining versions"
                );
                report.failed.push(FailedVersion {
                    publication_id: publication_id.to_string(),
                    version_id: version_id.to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        match ledger
            .record_synced(orcid, publication_id, version_id, &record_ref.uri)
            .await
        {
            Ok(()) => {}
            Err(LedgerError::Conflict { .. }) => {
                // A concurrent pass won the race; its entry stands and our
                // duplicate target record is left orphaned by design.
                warn!(
                    orcid,
                    publication_id,
                    version_id,
                    "[SYNC] Version committed by a concurrent pass"
                );
            }
            Err(e) => return Err(e.into()),
        }
        report.published.push(PublishedVersion {
            publication_id: publication_id.to_string(),
            version_id: version_id.to_string(),
            uri: record_ref.uri,
        });
    }

    ledger.touch_last_sync(orcid, Utc::now()).await?;
    info!(
        orcid,
        published = report.published.len(),
        skipped = report.skipped,
        failed = report.failed.len(),
        "[SYNC] Pass complete"
    );
    Ok(report)
}

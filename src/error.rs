//! Error taxonomy for the sync pipeline.
//!
//! The split mirrors what each failure means for a pass: a [`SourceError`] is
//! fatal (the pass either reads a consistent full listing or writes nothing),
//! a [`PublishError`] is isolated to one version, and a
//! [`LedgerError::Conflict`] is not a failure at all — it signals that a
//! concurrent pass already committed the same unit of work.

use thiserror::Error;

/// The source system could not be read. Fatal for the whole pass.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport or auth failure talking to the Octopus API.
    #[error("octopus api request failed: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The API answered, but not with a payload we recognise.
    #[error("octopus api returned an unexpected payload: {0}")]
    Decode(String),
}

/// Publishing one record to the PDS failed. Fatal for that version only.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Session creation with the stored credential was refused.
    #[error("session creation failed for {handle}: {reason}")]
    Auth { handle: String, reason: String },

    /// The PDS rejected the record (bad credential, schema validation, ...).
    #[error("pds rejected the record ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never got a usable answer, even after retries.
    #[error("pds request failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors from the durable ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The (identity, publication, version) triple is already recorded.
    /// Callers treat this as "already synced", not as a failure.
    #[error("version {version_id} of {publication_id} is already recorded for {orcid}")]
    Conflict {
        orcid: String,
        publication_id: String,
        version_id: String,
    },

    #[error("ledger query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ledger holds an unparsable timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
}

/// Engine-level failures that abort a pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No ledger row for this ORCID; nothing was attempted.
    #[error("no linked identity for {0}")]
    UnknownIdentity(String),

    /// The identity exists but sync has been disabled for it.
    #[error("identity {0} is deactivated")]
    InactiveIdentity(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

//! # contract: boundary traits and shared types for the sync pipeline
//!
//! This module defines the two seams of the system — [`SourceClient`] (read
//! side, Octopus) and [`Publisher`] (write side, AT Proto) — together with the
//! plain data types that flow between them. The sync engine only ever talks to
//! these traits, so the orchestration logic can be exercised end-to-end
//! against deterministic mocks.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`; the generated `MockSourceClient`
//! and `MockPublisher` are exported to integration tests through the
//! `test-export-mocks` feature (enabled by default).
//!
//! ## Adding a new source or target
//! Implement the relevant trait and convert upstream failures into the
//! taxonomy in [`crate::error`] — `SourceError` is fatal for a pass,
//! `PublishError` is fatal for a single version.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{PublishError, SourceError};

/// Lexicon collection the bridge writes into.
pub const PUBLICATION_NSID: &str = "social.octosphere.publication";

/// One publication as listed for an author, without version content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationSummary {
    /// Stable Octopus publication id, stringified.
    pub publication_id: String,
    pub title: Option<String>,
    pub publication_type: Option<String>,
    pub status: Option<String>,
    pub owner_orcid: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Publications this one links to, by stable external id.
    pub linked_to: Vec<String>,
    /// Publications linking back to this one.
    pub linked_from: Vec<String>,
}

/// One immutable published revision of a publication, with content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationVersion {
    pub version_id: String,
    pub publication_id: String,
    pub title: Option<String>,
    /// Raw markup as served by Octopus.
    pub content_html: String,
    /// Derived plain text; may be empty when the source only carries markup.
    pub content_text: String,
    pub doi: Option<String>,
    pub publication_type: Option<String>,
    pub status: Option<String>,
    pub citations: Vec<String>,
    /// Publication id this version peer-reviews, if it is a review.
    pub peer_review_of: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// The record shape written into `social.octosphere.publication`.
///
/// Field names serialise to the camelCase keys of the lexicon; optional
/// fields are omitted entirely when absent. `created_at` is the one field the
/// transformer leaves unset when the source carries no timestamp — the
/// publisher assigns it at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationRecord {
    pub octopus_id: String,
    pub version_id: String,
    pub publication_type: String,
    pub title: String,
    pub status: String,
    pub content_html: String,
    pub content_text: String,
    pub citations: Vec<String>,
    pub linked_to: Vec<String>,
    pub linked_from: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_orcid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_review_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Reference to a record created on the target repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordRef {
    /// `at://` URI of the created record; this is what the ledger stores.
    pub uri: String,
    pub cid: String,
}

/// Credential for the target network, resolved from the ledger once per pass
/// and passed explicitly into every publish call — never ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub handle: String,
    pub app_password: String,
}

/// Read-only client for the source system.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// List an author's publications by their Octopus user id.
    async fn list_publications(
        &self,
        octopus_user_id: &str,
    ) -> Result<Vec<PublicationSummary>, SourceError>;

    /// List the versions of one publication, content included.
    async fn list_versions(
        &self,
        publication_id: &str,
    ) -> Result<Vec<PublicationVersion>, SourceError>;

    /// Canonical human-facing URL for a publication version.
    fn publication_url(&self, publication_id: &str, version_id: &str) -> String;
}

/// Write-side client for the target network. One record per call.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create one record in the author's repository and return its reference.
    ///
    /// Implementations retry transient transport failures themselves; a
    /// returned error is non-retryable for this pass.
    async fn publish(
        &self,
        credential: &Credential,
        record: &PublicationRecord,
    ) -> Result<RecordRef, PublishError>;
}

//! Read-only client for the Octopus API.
//!
//! Two endpoints feed a pass: `/users/{id}/publications` for the author's
//! listing, and `/publications/{id}` for the full publication chain with
//! version content. The chain endpoint is used instead of
//! `/publication-versions/{id}` because the latter answers 403 for public
//! callers. Wire shapes are owned by Octopus and drift; every payload is
//! modelled as an explicit serde struct with optional fields so drift is
//! caught at decode time rather than deep inside the engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::contract::{PublicationSummary, PublicationVersion, SourceClient};
use crate::error::SourceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Octopus API and its public web frontend.
pub struct OctopusClient {
    http: reqwest::Client,
    api_url: String,
    web_url: String,
    access_token: Option<String>,
}

impl OctopusClient {
    pub fn new(api_url: &str, web_url: &str, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            web_url: web_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, SourceError> {
        debug!(url = %url, "GET octopus api");
        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(REQUEST_TIMEOUT);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(SourceError::Unavailable)?
            .error_for_status()
            .map_err(SourceError::Unavailable)?;
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SourceClient for OctopusClient {
    async fn list_publications(
        &self,
        octopus_user_id: &str,
    ) -> Result<Vec<PublicationSummary>, SourceError> {
        let url = format!("{}/users/{}/publications", self.api_url, octopus_user_id);
        let payload: PublicationListPayload = self.get_json(url).await?;
        let items = payload.into_items();
        info!(
            octopus_user_id,
            publications = items.len(),
            "Listed publications"
        );
        Ok(items.into_iter().map(PublicationListItem::into_summary).collect())
    }

    async fn list_versions(
        &self,
        publication_id: &str,
    ) -> Result<Vec<PublicationVersion>, SourceError> {
        let url = format!("{}/publications/{}", self.api_url, publication_id);
        let chain: PublicationPayload = self.get_json(url).await?;
        let versions: Vec<PublicationVersion> = chain
            .versions
            .into_iter()
            .map(|v| v.into_version(publication_id))
            .collect();
        debug!(publication_id, versions = versions.len(), "Listed versions");
        Ok(versions)
    }

    fn publication_url(&self, publication_id: &str, version_id: &str) -> String {
        format!(
            "{}/publications/{}/versions/{}",
            self.web_url, publication_id, version_id
        )
    }
}

// --- wire models -----------------------------------------------------------

/// Octopus ids arrive as strings or bare numbers depending on endpoint age.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// The listing endpoint answers either `{ "data": [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PublicationListPayload {
    Wrapped { data: Vec<PublicationListItem> },
    Bare(Vec<PublicationListItem>),
}

impl PublicationListPayload {
    fn into_items(self) -> Vec<PublicationListItem> {
        match self {
            PublicationListPayload::Wrapped { data } => data,
            PublicationListPayload::Bare(items) => items,
        }
    }
}

/// One listing entry: either a nested `{ publication, latestVersion, linked }`
/// envelope or a bare publication object (older responses).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicationListItem {
    publication: Option<PublicationPayload>,
    #[serde(alias = "publicationVersion")]
    latest_version: Option<VersionPayload>,
    linked: Option<LinkedPayload>,
    #[serde(flatten)]
    flat: PublicationPayload,
}

impl PublicationListItem {
    fn into_summary(self) -> PublicationSummary {
        let publication = self.publication.unwrap_or(self.flat);
        let version = self.latest_version.unwrap_or_default();
        let LinkedPayload {
            linked_to,
            linked_from,
        } = self.linked.unwrap_or_default();
        PublicationSummary {
            publication_id: publication
                .id
                .map(RawId::into_string)
                .unwrap_or_default(),
            title: publication.title.or(version.title),
            publication_type: publication.publication_type.or(version.publication_type),
            status: publication.status.or(version.status),
            owner_orcid: publication.owner_id,
            created_at: publication.created_at,
            updated_at: publication.updated_at,
            linked_to: linked_ids(linked_to),
            linked_from: linked_ids(linked_from),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PublicationPayload {
    id: Option<RawId>,
    title: Option<String>,
    #[serde(alias = "type")]
    publication_type: Option<String>,
    status: Option<String>,
    #[serde(alias = "ownerOrcid")]
    owner_id: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    /// Populated by the chain endpoint only.
    versions: Vec<VersionPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VersionPayload {
    id: Option<RawId>,
    title: Option<String>,
    content: Option<String>,
    #[serde(alias = "text")]
    content_text: Option<String>,
    doi: Option<String>,
    doi_url: Option<String>,
    publication_type: Option<String>,
    status: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    #[serde(alias = "citations")]
    references: Vec<CitationPayload>,
    peer_review_of: Option<PeerReviewPayload>,
}

impl VersionPayload {
    fn into_version(self, publication_id: &str) -> PublicationVersion {
        PublicationVersion {
            version_id: self.id.map(RawId::into_string).unwrap_or_default(),
            publication_id: publication_id.to_string(),
            title: self.title,
            content_html: self.content.unwrap_or_default(),
            content_text: self.content_text.unwrap_or_default(),
            doi: self.doi.or(self.doi_url),
            publication_type: self.publication_type,
            status: self.status,
            citations: self
                .references
                .into_iter()
                .filter_map(CitationPayload::into_text)
                .collect(),
            peer_review_of: self.peer_review_of.and_then(PeerReviewPayload::into_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Reference entries are either plain strings or structured objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CitationPayload {
    Text(String),
    Structured {
        reference: Option<String>,
        citation: Option<String>,
        text: Option<String>,
    },
}

impl CitationPayload {
    fn into_text(self) -> Option<String> {
        match self {
            CitationPayload::Text(s) => Some(s),
            CitationPayload::Structured {
                reference,
                citation,
                text,
            } => reference.or(citation).or(text),
        }
    }
}

/// Peer-review edge: a bare id or an object pointing at the reviewed work.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeerReviewPayload {
    Structured {
        #[serde(rename = "publicationId", alias = "id")]
        publication_id: Option<RawId>,
    },
    Raw(RawId),
}

impl PeerReviewPayload {
    fn into_id(self) -> Option<String> {
        match self {
            PeerReviewPayload::Structured { publication_id } => {
                publication_id.map(RawId::into_string).filter(|s| !s.is_empty())
            }
            PeerReviewPayload::Raw(id) => Some(id.into_string()).filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LinkedPayload {
    linked_to: Vec<LinkedRef>,
    linked_from: Vec<LinkedRef>,
}

#[derive(Debug, Deserialize)]
struct LinkedRef {
    id: Option<RawId>,
}

fn linked_ids(refs: Vec<LinkedRef>) -> Vec<String> {
    refs.into_iter()
        .filter_map(|r| r.id.map(RawId::into_string))
        .collect()
}

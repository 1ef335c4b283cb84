//! AT Protocol publisher using app-password auth.
//!
//! Creates a session with `com.atproto.server.createSession` and writes one
//! record per publish through `com.atproto.repo.createRecord`. createRecord is
//! not idempotent at the protocol level, so transient transport failures are
//! retried here with a bounded budget; exactly-once is the ledger's job, not
//! this adapter's.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::contract::{Credential, PublicationRecord, Publisher, RecordRef, PUBLICATION_NSID};
use crate::error::PublishError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PUBLISH_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// An authenticated PDS session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
}

/// HTTP client for one PDS. Caches the session for the handle it last
/// authenticated, so a pass creates at most one session.
pub struct AtprotoClient {
    http: reqwest::Client,
    pds_url: String,
    session: Mutex<Option<CachedSession>>,
}

#[derive(Clone)]
struct CachedSession {
    handle: String,
    did: String,
    access_jwt: String,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    record: &'a PublicationRecord,
}

impl AtprotoClient {
    pub fn new(pds_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            pds_url: pds_url.trim_end_matches('/').to_string(),
            session: Mutex::new(None),
        }
    }

    /// Authenticate a handle + app password against the PDS.
    ///
    /// Also used by the CLI to verify a credential before storing it.
    pub async fn create_session(
        &self,
        handle: &str,
        app_password: &str,
    ) -> Result<Session, PublishError> {
        let url = format!("{}/xrpc/com.atproto.server.createSession", self.pds_url);
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&CreateSessionRequest {
                identifier: handle,
                password: app_password,
            })
            .send()
            .await
            .map_err(|source| PublishError::Transport { attempts: 1, source })?;
        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(PublishError::Auth {
                handle: handle.to_string(),
                reason: format!("{status}: {reason}"),
            });
        }
        let session = response
            .json::<Session>()
            .await
            .map_err(|e| PublishError::Auth {
                handle: handle.to_string(),
                reason: format!("unexpected session payload: {e}"),
            })?;
        info!(handle, did = %session.did, "Created PDS session");
        Ok(session)
    }

    async fn session_for(
        &self,
        credential: &Credential,
    ) -> Result<CachedSession, PublishError> {
        let mut guard = self.session.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.handle == credential.handle {
                return Ok(cached.clone());
            }
        }
        let session = self
            .create_session(&credential.handle, &credential.app_password)
            .await?;
        let cached = CachedSession {
            handle: credential.handle.clone(),
            did: session.did,
            access_jwt: session.access_jwt,
        };
        *guard = Some(cached.clone());
        Ok(cached)
    }

    async fn create_record(
        &self,
        session: &CachedSession,
        record: &PublicationRecord,
    ) -> Result<RecordRef, PublishError> {
        let url = format!("{}/xrpc/com.atproto.repo.createRecord", self.pds_url);
        let body = CreateRecordRequest {
            repo: &session.did,
            collection: PUBLICATION_NSID,
            record,
        };
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .http
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .bearer_auth(&session.access_jwt)
                .json(&body)
                .send()
                .await;
            let response = match result {
                Ok(response) => response,
                Err(source) => {
                    if (source.is_timeout() || source.is_connect()) && attempt < PUBLISH_ATTEMPTS {
                        warn!(attempt, error = %source, "Transient createRecord failure, retrying");
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                        continue;
                    }
                    return Err(PublishError::Transport {
                        attempts: attempt,
                        source,
                    });
                }
            };
            let status = response.status();
            if status.is_success() {
                let record_ref =
                    response
                        .json::<RecordRef>()
                        .await
                        .map_err(|e| PublishError::Rejected {
                            status: status.as_u16(),
                            message: format!("unexpected createRecord payload: {e}"),
                        })?;
                debug!(uri = %record_ref.uri, "Created record");
                return Ok(record_ref);
            }
            let message = response.text().await.unwrap_or_default();
            if status.is_server_error() && attempt < PUBLISH_ATTEMPTS {
                warn!(attempt, %status, "PDS server error, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                continue;
            }
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
    }
}

#[async_trait]
impl Publisher for AtprotoClient {
    async fn publish(
        &self,
        credential: &Credential,
        record: &PublicationRecord,
    ) -> Result<RecordRef, PublishError> {
        let session = self.session_for(credential).await?;
        let mut record = record.clone();
        if record.created_at.is_none() {
            // Publisher-assigned creation time; the transformer stays pure.
            record.created_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        info!(
            octopus_id = %record.octopus_id,
            version_id = %record.version_id,
            "Publishing record"
        );
        self.create_record(&session, &record).await
    }
}

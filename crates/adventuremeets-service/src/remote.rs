//! Client for the status-update endpoint used by the scheduler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adventuremeets_core::config::WorkerConfig;
use adventuremeets_core::constants::{MEETS_ROUTE_PREFIX, WORKER_API_KEY_HEADER};
use adventuremeets_core::status::MeetStatus;

use crate::error::{ServiceError, ServiceResult};

/// Body of `PATCH /api/v1/meets/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status_id: i32,
}

impl From<MeetStatus> for StatusUpdate {
    fn from(status: MeetStatus) -> Self {
        Self {
            status_id: status.id(),
        }
    }
}

/// Applies one status change on behalf of the scheduler.
#[async_trait]
pub trait StatusUpdater: Send + Sync {
    /// ## Errors
    /// Returns an error when the call fails or is answered with a non-2xx status.
    async fn update_status(&self, meet_id: Uuid, status: MeetStatus) -> ServiceResult<()>;
}

pub struct HttpStatusClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpStatusClient {
    /// ## Summary
    /// Builds a client with the given per-request timeout.
    ///
    /// ## Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> ServiceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// ## Summary
    /// Builds a client from the worker settings.
    ///
    /// ## Returns
    /// `Ok(None)` when the base URL or the credential is missing; the scheduler
    /// then runs without issuing updates.
    ///
    /// ## Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &WorkerConfig) -> ServiceResult<Option<Self>> {
        config
            .remote()
            .map(|(base_url, api_key)| Self::new(base_url, api_key, config.request_timeout()))
            .transpose()
    }

    #[must_use]
    pub fn status_url(&self, meet_id: Uuid) -> String {
        format!("{}{MEETS_ROUTE_PREFIX}/{meet_id}/status", self.base_url)
    }
}

#[async_trait]
impl StatusUpdater for HttpStatusClient {
    #[tracing::instrument(skip(self), fields(status_id = status.id()))]
    async fn update_status(&self, meet_id: Uuid, status: MeetStatus) -> ServiceResult<()> {
        let response = self
            .client
            .patch(self.status_url(meet_id))
            .header(WORKER_API_KEY_HEADER, &self.api_key)
            .json(&StatusUpdate::from(status))
            .send()
            .await?;

        let code = response.status();
        if code.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::RemoteUpdateRejected {
            meet_id,
            status: code.as_u16(),
            body,
        })
    }
}

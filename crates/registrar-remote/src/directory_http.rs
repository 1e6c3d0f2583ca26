//! Reqwest-backed directory client.

use std::time::Duration;

use async_trait::async_trait;
use registrar_core::directory::{DirectoryClient, DirectoryError};
use registrar_core::ids::StudentId;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, instrument};

use crate::http::{
    ClientBuildError, build_client, describe_status, describe_transport_error, endpoint,
};
use crate::retry::RetryPolicy;

/// Directory client speaking schema v1 over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDirectoryClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpDirectoryClient {
    /// Builds a client with an explicit request timeout and retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error for a base URL that is not absolute http(s), or when
    /// the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration, retry: RetryPolicy) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_client(&base_url, timeout)?,
            base_url,
            retry,
        })
    }

    async fn lookup(&self, student_id: &StudentId) -> Result<bool, DirectoryError> {
        let url = endpoint(&self.base_url, &["api", "students", student_id.as_str()]);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| DirectoryError::Unavailable(describe_transport_error(&error)))?;
        let status = response.status();
        debug!(%student_id, status = status.as_u16(), "directory responded");
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(DirectoryError::Unavailable(describe_status(status, &body)))
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    #[instrument(skip(self), fields(student_id = %student_id))]
    async fn student_exists(&self, student_id: &StudentId) -> Result<bool, DirectoryError> {
        self.retry
            .retry_async(DirectoryError::is_retryable, |_| self.lookup(student_id))
            .await
    }
}

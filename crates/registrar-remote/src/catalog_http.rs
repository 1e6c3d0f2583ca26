//! Reqwest-backed catalog client.
//!
//! Owns transport details only: endpoint layout, timeout and status
//! mapping, retries, and decoding into [`CourseCapacity`].

use std::time::Duration;

use async_trait::async_trait;
use registrar_core::catalog::{CatalogClient, CatalogError, CourseCapacity};
use registrar_core::ids::CourseId;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::dto::{AdjustmentRequestDto, ReservationRequestDto, parse_course};
use crate::http::{
    ClientBuildError, build_client, describe_status, describe_transport_error, endpoint,
    is_transient,
};
use crate::retry::RetryPolicy;

/// Catalog client speaking schema v1 over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpCatalogClient {
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

    fn course_url(&self, course_id: &CourseId, rest: &[&str]) -> Url {
        let mut segments = vec!["api", "courses", course_id.as_str()];
        segments.extend_from_slice(rest);
        endpoint(&self.base_url, &segments)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        course_id: &CourseId,
    ) -> Result<(StatusCode, Vec<u8>), CatalogError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(%course_id, status = status.as_u16(), "catalog responded");
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::CourseNotFound(course_id.clone()));
        }
        Ok((status, body.to_vec()))
    }

    async fn fetch_course(&self, course_id: &CourseId) -> Result<CourseCapacity, CatalogError> {
        let request = self.client.get(self.course_url(course_id, &[]));
        let (status, body) = self.send(request, course_id).await?;
        expect_success(status, &body)?;
        decode_course(&body, course_id)
    }

    async fn post_reservation(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError> {
        let request = self
            .client
            .post(self.course_url(course_id, &["reservations"]))
            .json(&ReservationRequestDto { reservation_id });
        let (status, body) = self.send(request, course_id).await?;
        if status == StatusCode::CONFLICT {
            return Err(CatalogError::NoSeatsAvailable(course_id.clone()));
        }
        expect_success(status, &body)?;
        decode_course(&body, course_id)
    }

    async fn delete_reservation(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
    ) -> Result<(), CatalogError> {
        let reservation = reservation_id.to_string();
        let request = self
            .client
            .delete(self.course_url(course_id, &["reservations", &reservation]));
        match self.send(request, course_id).await {
            // Unknown or already released.
            Err(CatalogError::CourseNotFound(_)) => Ok(()),
            Err(err) => Err(err),
            Ok((status, body)) => expect_success(status, &body),
        }
    }

    async fn post_adjustment(
        &self,
        course_id: &CourseId,
        delta: i32,
        adjustment_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError> {
        let request = self
            .client
            .post(self.course_url(course_id, &["adjustments"]))
            .json(&AdjustmentRequestDto {
                adjustment_id,
                delta,
            });
        let (status, body) = self.send(request, course_id).await?;
        expect_success(status, &body)?;
        decode_course(&body, course_id)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    #[instrument(skip(self), fields(course_id = %course_id))]
    async fn get_course_capacity(
        &self,
        course_id: &CourseId,
    ) -> Result<CourseCapacity, CatalogError> {
        self.retry
            .retry_async(CatalogError::is_retryable, |_| self.fetch_course(course_id))
            .await
    }

    #[instrument(skip(self), fields(course_id = %course_id))]
    async fn reserve_seat(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError> {
        self.retry
            .retry_async(CatalogError::is_retryable, |_| {
                self.post_reservation(course_id, reservation_id)
            })
            .await
    }

    #[instrument(skip(self), fields(course_id = %course_id))]
    async fn release_seat(
        &self,
        course_id: &CourseId,
        reservation_id: Uuid,
    ) -> Result<(), CatalogError> {
        self.retry
            .retry_async(CatalogError::is_retryable, |_| {
                self.delete_reservation(course_id, reservation_id)
            })
            .await
    }

    #[instrument(skip(self), fields(course_id = %course_id))]
    async fn apply_enrolled_delta(
        &self,
        course_id: &CourseId,
        delta: i32,
        adjustment_id: Uuid,
    ) -> Result<CourseCapacity, CatalogError> {
        self.retry
            .retry_async(CatalogError::is_retryable, |_| {
                self.post_adjustment(course_id, delta, adjustment_id)
            })
            .await
    }
}

fn decode_course(body: &[u8], course_id: &CourseId) -> Result<CourseCapacity, CatalogError> {
    parse_course(body, course_id).map_err(CatalogError::Decode)
}

fn expect_success(status: StatusCode, body: &[u8]) -> Result<(), CatalogError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(map_status_error(status, body))
    }
}

fn map_transport_error(error: reqwest::Error) -> CatalogError {
    if error.is_decode() {
        CatalogError::Decode(error.to_string())
    } else {
        CatalogError::Unavailable(describe_transport_error(&error))
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> CatalogError {
    let message = describe_status(status, body);
    if is_transient(status) {
        CatalogError::Unavailable(message)
    } else {
        CatalogError::Decode(format!("unexpected {message}"))
    }
}

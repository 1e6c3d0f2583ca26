//! Stub catalog and directory services for client integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use registrar_remote::{RetryPolicy, Url};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Course {
    capacity: u32,
    enrolled: u32,
    reservations: HashSet<Uuid>,
    adjustments: HashSet<Uuid>,
}

/// Shared state of the stub services.
#[derive(Debug, Default)]
pub struct Stub {
    courses: Mutex<HashMap<String, Course>>,
    students: Mutex<HashSet<String>>,
    /// Requests answered with 503 before the stub starts behaving.
    failures_remaining: AtomicUsize,
    /// Delay applied to every request.
    delay: Mutex<Option<Duration>>,
    /// Requests received, including failed ones.
    pub hits: AtomicUsize,
    /// Requests that lacked `X-Schema-Version: 1`.
    pub unversioned: AtomicUsize,
}

impl Stub {
    pub fn with_course(self, id: &str, capacity: u32, enrolled: u32) -> Self {
        self.courses.lock().unwrap().insert(
            id.to_owned(),
            Course {
                capacity,
                enrolled,
                ..Course::default()
            },
        );
        self
    }

    pub fn with_student(self, id: &str) -> Self {
        self.students.lock().unwrap().insert(id.to_owned());
        self
    }

    pub fn fail_next(&self, requests: usize) {
        self.failures_remaining.store(requests, Ordering::SeqCst);
    }

    pub fn delay_all(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn enrolled(&self, id: &str) -> u32 {
        self.courses.lock().unwrap()[id].enrolled
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Common request gate: counts, versions, delays, injected failures.
    async fn gate(&self, headers: &HeaderMap) -> Option<Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if headers.get("x-schema-version").and_then(|v| v.to_str().ok()) != Some("1") {
            self.unversioned.fetch_add(1, Ordering::SeqCst);
            return Some(StatusCode::BAD_REQUEST.into_response());
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        failing.then(|| (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response())
    }
}

fn course_body(id: &str, course: &Course) -> Json<serde_json::Value> {
    Json(json!({
        "data": { "id": id, "capacity": course.capacity, "enrolled": course.enrolled }
    }))
}

async fn get_course(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = stub.gate(&headers).await {
        return response;
    }
    if id == "BROKEN" {
        return Json(json!({ "data": { "id": "BROKEN", "capacity": "lots" } })).into_response();
    }
    let courses = stub.courses.lock().unwrap();
    match courses.get(&id) {
        Some(course) => course_body(&id, course).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(serde::Deserialize)]
struct ReservationBody {
    reservation_id: Uuid,
}

async fn reserve(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ReservationBody>,
) -> Response {
    if let Some(response) = stub.gate(&headers).await {
        return response;
    }
    let mut courses = stub.courses.lock().unwrap();
    let Some(course) = courses.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !course.reservations.contains(&body.reservation_id) {
        if course.enrolled >= course.capacity {
            return (StatusCode::CONFLICT, Json(json!({ "error": "course full" }))).into_response();
        }
        course.enrolled += 1;
        course.reservations.insert(body.reservation_id);
    }
    course_body(&id, course).into_response()
}

async fn release(
    State(stub): State<Arc<Stub>>,
    Path((id, reservation_id)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = stub.gate(&headers).await {
        return response;
    }
    let mut courses = stub.courses.lock().unwrap();
    if let Some(course) = courses.get_mut(&id)
        && course.reservations.remove(&reservation_id)
    {
        course.enrolled = course.enrolled.saturating_sub(1);
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

#[derive(serde::Deserialize)]
struct AdjustmentBody {
    adjustment_id: Uuid,
    delta: i32,
}

async fn adjust(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AdjustmentBody>,
) -> Response {
    if let Some(response) = stub.gate(&headers).await {
        return response;
    }
    let mut courses = stub.courses.lock().unwrap();
    let Some(course) = courses.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if course.adjustments.insert(body.adjustment_id) {
        course.enrolled = course.enrolled.saturating_add_signed(body.delta);
    }
    course_body(&id, course).into_response()
}

async fn get_student(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = stub.gate(&headers).await {
        return response;
    }
    if stub.students.lock().unwrap().contains(&id) {
        Json(json!({ "data": { "id": id } })).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Serves the stub on an ephemeral local port and returns its base URL.
pub async fn serve(stub: Arc<Stub>) -> Url {
    let router = Router::new()
        .route("/api/courses/{id}", get(get_course))
        .route("/api/courses/{id}/reservations", post(reserve))
        .route(
            "/api/courses/{id}/reservations/{reservation_id}",
            delete(release),
        )
        .route("/api/courses/{id}/adjustments", post(adjust))
        .route("/api/students/{id}", get(get_student))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// Retry policy with millisecond delays.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5), 0.0)
}

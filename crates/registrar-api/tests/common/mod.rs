//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use registrar_enrollment::application::coordinator::EnrollmentCoordinator;
use registrar_enrollment::application::reconciler::Reconciler;
use registrar_test_support::{
    InMemoryCatalog, InMemoryCompensationLog, InMemoryEnrollmentRepository, StaticDirectory,
    fixed_clock,
};
use tower::ServiceExt;

use registrar_api::routes;
use registrar_api::state::AppState;

/// In-memory collaborators behind a test app, kept so tests can inspect
/// them after requests.
pub struct TestApp {
    pub catalog: Arc<InMemoryCatalog>,
    pub directory: Arc<StaticDirectory>,
    pub repository: Arc<InMemoryEnrollmentRepository>,
    pub compensations: Arc<InMemoryCompensationLog>,
    router: Router,
}

impl TestApp {
    /// Returns a router over the shared collaborators.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full app router over in-memory fakes. Uses the same route
/// structure as `main.rs`.
pub fn build_test_app(catalog: InMemoryCatalog, students: &[&str]) -> TestApp {
    let catalog = Arc::new(catalog);
    let directory = Arc::new(StaticDirectory::with_students(students));
    let repository = Arc::new(InMemoryEnrollmentRepository::new());
    let compensations = Arc::new(InMemoryCompensationLog::new());

    let coordinator = EnrollmentCoordinator::new(
        directory.clone(),
        catalog.clone(),
        repository.clone(),
        compensations.clone(),
        Arc::new(fixed_clock()),
    );
    let reconciler = Reconciler::new(catalog.clone(), repository.clone(), compensations.clone());
    let app_state = AppState::new(coordinator, repository.clone(), catalog.clone(), reconciler);

    TestApp {
        catalog,
        directory,
        repository,
        compensations,
        router: routes::app(app_state),
    }
}

/// A catalog with `CS101` (capacity 2) and `MA201` (capacity 1), plus the
/// students `alice`, `bob`, and `carol`.
pub fn default_test_app() -> TestApp {
    build_test_app(
        InMemoryCatalog::new()
            .with_course("CS101", 2, 0)
            .with_course("MA201", 1, 0),
        &["alice", "bob", "carol"],
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("POST", uri, body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("PUT", uri, body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Enroll a student with an explicit idempotency key.
pub async fn enroll_with_key(
    app: Router,
    course_id: &str,
    student_id: &str,
    key: &str,
) -> (StatusCode, serde_json::Value) {
    let mut request = json_request(
        "POST",
        "/api/v1/enrollments",
        &serde_json::json!({ "course_id": course_id, "student_id": student_id }),
    );
    request
        .headers_mut()
        .insert("idempotency-key", key.parse().unwrap());
    send(app, request).await
}

/// Enroll a student and return the new enrollment id.
pub async fn enroll(app: Router, course_id: &str, student_id: &str) -> String {
    let (status, json) = post_json(
        app,
        "/api/v1/enrollments",
        &serde_json::json!({ "course_id": course_id, "student_id": student_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "enroll failed: {json}");
    json["id"].as_str().unwrap().to_owned()
}

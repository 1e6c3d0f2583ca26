//! Integration tests for the HTTP directory client against a stub service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use registrar_core::directory::{DirectoryClient, DirectoryError};
use registrar_core::ids::StudentId;
use registrar_remote::HttpDirectoryClient;

use common::{Stub, fast_retry, serve};

async fn client_for(stub: &Arc<Stub>, attempts: u32) -> HttpDirectoryClient {
    let base = serve(stub.clone()).await;
    HttpDirectoryClient::new(base, Duration::from_secs(2), fast_retry(attempts)).unwrap()
}

fn student(id: &str) -> StudentId {
    StudentId::new(id).unwrap()
}

#[tokio::test]
async fn test_student_exists_for_known_student() {
    let stub = Arc::new(Stub::default().with_student("alice"));
    let client = client_for(&stub, 1).await;

    assert!(client.student_exists(&student("alice")).await.unwrap());
}

#[tokio::test]
async fn test_student_exists_is_false_on_not_found() {
    let stub = Arc::new(Stub::default().with_student("alice"));
    let client = client_for(&stub, 3).await;

    let exists = client.student_exists(&student("mallory")).await.unwrap();

    assert!(!exists);
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn test_student_exists_retries_then_succeeds() {
    // Arrange
    let stub = Arc::new(Stub::default().with_student("alice"));
    stub.fail_next(1);
    let client = client_for(&stub, 2).await;

    // Act
    let exists = client.student_exists(&student("alice")).await.unwrap();

    // Assert
    assert!(exists);
    assert_eq!(stub.hits(), 2);
}

#[tokio::test]
async fn test_student_exists_outage_is_unavailable() {
    let stub = Arc::new(Stub::default().with_student("alice"));
    stub.fail_next(10);
    let client = client_for(&stub, 2).await;

    let result = client.student_exists(&student("alice")).await;

    match result.unwrap_err() {
        DirectoryError::Unavailable(msg) => assert!(msg.contains("503")),
    }
}

#[tokio::test]
async fn test_unreachable_directory_is_unavailable() {
    // Arrange
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let base = registrar_remote::Url::parse(&format!("http://{addr}/")).unwrap();
    let client = HttpDirectoryClient::new(base, Duration::from_millis(200), fast_retry(1)).unwrap();

    // Act
    let result = client.student_exists(&student("alice")).await;

    // Assert
    assert!(matches!(result, Err(DirectoryError::Unavailable(_))));
}

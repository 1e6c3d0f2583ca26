//! Registrar: outbound adapters for the catalog and directory services.
//!
//! Both clients speak a fixed, versioned JSON schema (`X-Schema-Version: 1`),
//! carry a bounded request timeout, and retry idempotent calls on transport
//! failures with jittered exponential backoff.

pub mod catalog_http;
pub mod directory_http;
mod dto;
mod http;
pub mod retry;

pub use catalog_http::HttpCatalogClient;
pub use directory_http::HttpDirectoryClient;
pub use http::ClientBuildError;
pub use reqwest::Url;
pub use retry::RetryPolicy;

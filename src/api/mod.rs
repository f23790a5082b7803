/// Backend API for chatdesk
///
/// This module defines the contract the core depends on: the `Backend` trait,
/// the error taxonomy every call maps into, and the HTTP implementation.
///
/// # Architecture
///
/// - `client` - `Backend` trait and `ApiError`
/// - `wire` - snake_case request/response bodies and their translation
/// - `http` - reqwest-backed `HttpBackend` speaking the `/api/...` routes
///
/// # Usage
///
/// ```rust,no_run
/// use chatdesk::api::{Backend, HttpBackend};
/// use chatdesk::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let backend = HttpBackend::new(&Config::from_env()?)?;
/// let listing = backend.list_projects().await?;
/// println!("{} projects", listing.projects.len());
/// # Ok(())
/// # }
/// ```
mod client;
mod http;
pub mod wire;

pub use client::{ApiError, ApiResult, Backend, HealthStatus};
pub use http::HttpBackend;

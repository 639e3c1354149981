//! # mgc-core - request execution core for the Magalu Cloud REST API
//!
//! `mgc-core` turns typed request descriptions into HTTP calls against the
//! provider's regional endpoints. It builds and validates requests, retries
//! transient failures with exponential backoff, honours caller cancellation,
//! classifies failures into a small set of error kinds and walks paginated
//! list endpoints whatever pagination shape they use.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mgc_core::{Client, ListRequest, RequestContext, RequestDescriptor};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Vpc {
//!     id: String,
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Event {
//!     id: String,
//!     #[serde(rename = "type")]
//!     kind: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mgc_core::Error> {
//!     let client = Client::builder().api_key("secret")?.build()?;
//!     let ctx = RequestContext::new().with_timeout(Duration::from_secs(60));
//!
//!     // One call
//!     let vpc = client
//!         .call::<Vpc>(&ctx, RequestDescriptor::get("/v1/vpcs/{id}").with_path_param("id", "3f2a"))
//!         .await?;
//!     println!("{} ({})", vpc.name, vpc.id);
//!
//!     // Every page of a list endpoint
//!     let events: Vec<Event> = client
//!         .list_all(&ctx, ListRequest::new(RequestDescriptor::get("/v0/events")).items_key("results"))
//!         .await?;
//!     for event in &events {
//!         println!("{} {}", event.id, event.kind);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every failed call yields one [`Error`] variant and keeps the raw response
//! for debugging:
//!
//! ```no_run
//! use mgc_core::{Client, Error, TransportErrorKind};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().api_key("secret")?.build()?;
//! match client.get::<serde_json::Value>("/v0/vpcs/3f2a").await {
//!     Ok(response) => println!("Success: {:?}", response.data),
//!     Err(Error::Validation { field, message }) => eprintln!("bad {field}: {message}"),
//!     Err(Error::Transport { kind: TransportErrorKind::Cancelled, .. }) => eprintln!("cancelled"),
//!     Err(Error::Status { status, message, .. }) => eprintln!("HTTP {status}: {message}"),
//!     Err(Error::Decode { raw_response, message, .. }) => {
//!         eprintln!("unexpected body {raw_response}: {message}");
//!     }
//!     Err(e) => eprintln!("Other error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! ```no_run
//! use mgc_core::{Client, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), mgc_core::Error> {
//! let client = Client::builder()
//!     .api_key("secret")?
//!     .retry_policy(
//!         RetryPolicy::exponential(5, Duration::from_millis(200), Duration::from_secs(30))
//!             .with_jitter(true)
//!             .with_respect_retry_after(true),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod context;
pub mod decode;
mod descriptor;
mod error;
pub mod pagination;
pub mod rate_limit;
pub mod request_builder;
mod response;
pub mod retry;
pub mod services;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use config::{Config, Region};
pub use context::RequestContext;
pub use descriptor::RequestDescriptor;
pub use error::{Error, Result, TransportErrorKind};
pub use pagination::{ListRequest, Page, PageDescriptor, StartParams};
pub use response::Response;
pub use retry::{RetryOnTransient, RetryPolicy, RetryPredicate};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

//! HTTP request core for the folio personal site.
//!
//! # Overview
//! Two small pieces: a query-string codec (`query`) and a request client
//! (`RequestClient`) that merges URL-embedded and caller-supplied query
//! parameters, issues GET/POST requests, and reports the outcome either as a
//! plain `Result`, a future, or an observable `RequestHandle`.
//!
//! # Design
//! - Request building and response checking are pure (host-does-IO); the
//!   network round-trip goes through the `Transport` trait.
//! - The client is constructed explicitly from a `ClientConfig` (base URL,
//!   10 second default timeout) and shares nothing global.
//! - A 2xx response without a body is an error, not an empty success.

pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod http;
pub mod query;
pub mod transport;

pub use client::RequestClient;
pub use config::{ClientConfig, RequestConfig};
pub use error::{QueryError, RequestError};
pub use handle::{RequestHandle, RequestState};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::Params;
pub use transport::{Transport, UreqTransport};

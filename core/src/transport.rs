//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! `Transport` is the seam between the deterministic core and real I/O.
//! `UreqTransport` is the production implementation; tests and FFI callers
//! can supply their own. Status codes are returned as data, never as
//! errors, so that `RequestClient::parse_response` alone decides what a
//! failed response is.

use std::time::Duration;

use ureq::{Agent, RequestBuilder};

use crate::error::RequestError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one HTTP round-trip.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError>;
}

/// Blocking transport backed by a shared ureq agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Build an agent whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        let url = request.url.as_str();
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => prepare(self.agent.get(url), request).call(),
            (HttpMethod::Post, Some(body)) => {
                prepare(self.agent.post(url), request).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => prepare(self.agent.post(url), request).send_empty(),
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Apply per-request headers and timeout override.
fn prepare<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(timeout) = request.timeout {
        builder = builder.config().timeout_global(Some(timeout)).build();
    }
    builder
}

fn transport_error(err: ureq::Error) -> RequestError {
    match err {
        ureq::Error::Timeout(_) => RequestError::Timeout,
        other => RequestError::Transport(other.to_string()),
    }
}

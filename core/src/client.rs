//! Request builder, response checker and executor for the folio API.
//!
//! # Design
//! `RequestClient` keeps the host-does-IO split: `build_get`/`build_post`
//! produce an `HttpRequest`, `parse_response` consumes an `HttpResponse`,
//! and neither touches the network. The execution methods glue the two
//! halves around an injected `Transport`:
//!
//! - `get` / `post` block the calling thread and return the payload;
//! - `get_async` / `post_async` return a future of the payload, running the
//!   blocking transport on tokio's blocking pool;
//! - `spawn_get` / `spawn_post` return a pending `RequestHandle` at once and
//!   settle it from a spawned task.
//!
//! The transport sits behind an `Arc` and is never mutated, so clients are
//! cheap to clone and every call is independent of every other.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ClientConfig, RequestConfig};
use crate::error::RequestError;
use crate::handle::RequestHandle;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query;
use crate::transport::{Transport, UreqTransport};

/// Client for the folio API.
#[derive(Debug)]
pub struct RequestClient<X = UreqTransport> {
    config: ClientConfig,
    transport: Arc<X>,
}

impl<X> Clone for RequestClient<X> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl RequestClient<UreqTransport> {
    /// Client backed by a ureq agent honouring `config.timeout`.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, transport)
    }

    /// Client configured from `FOLIO_BASE_URL` / `FOLIO_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, RequestError> {
        ClientConfig::from_env().map(Self::new)
    }
}

impl<X> RequestClient<X> {
    pub fn with_transport(config: ClientConfig, transport: X) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a GET request.
    ///
    /// Any query string already present in `url` is parsed and `params` are
    /// laid over it, string values are trimmed, and the result is
    /// re-serialized. A malformed embedded query is logged and ignored so
    /// the request still goes out with `params` alone.
    pub fn build_get<P: Serialize + ?Sized>(
        &self,
        url: &str,
        params: &P,
        config: &RequestConfig,
    ) -> Result<HttpRequest, RequestError> {
        let (path, embedded) = query::split_url(url);
        let mut merged = match query::parse(embedded) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(url, error = %err, "ignoring malformed query string");
                query::Params::new()
            }
        };
        query::merge(&mut merged, query::to_params(params)?);
        query::trim_strings(&mut merged);

        // Keys are emitted verbatim, so spaces and other bytes a URI cannot
        // carry still need escaping before the transport sees the URL.
        let query_string = query::stringify(&merged);
        let target = if query_string.is_empty() {
            query::escape_for_uri(path)
        } else {
            query::escape_for_uri(&format!("{path}?{query_string}"))
        };

        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: self.config.resolve(&target),
            headers: config.headers.clone(),
            body: None,
            timeout: config.timeout,
        })
    }

    /// Build a POST request carrying `body` as JSON.
    pub fn build_post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        config: &RequestConfig,
    ) -> Result<HttpRequest, RequestError> {
        let body =
            serde_json::to_string(body).map_err(|e| RequestError::Serialization(e.to_string()))?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        headers.extend(
            config
                .headers
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                .cloned(),
        );
        if let Some(custom) = config
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers[0] = custom.clone();
        }

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.config.resolve(url),
            headers,
            body: Some(body),
            timeout: config.timeout,
        })
    }

    /// Check a response and decode its payload.
    ///
    /// Non-2xx statuses fail with `Status`. A 2xx response whose body is
    /// empty or a falsy JSON value (`null`, `false`, `0`, `""`) fails with
    /// `EmptyBody`. A body that is not JSON is offered to `T` as a string.
    pub fn parse_response<T: DeserializeOwned>(
        &self,
        response: HttpResponse,
    ) -> Result<T, RequestError> {
        if !response.is_success() {
            return Err(RequestError::Status {
                status: response.status,
                body: response.body,
            });
        }
        let payload = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| Value::String(response.body.clone()));
        if is_falsy(&payload) {
            return Err(RequestError::EmptyBody {
                status: response.status,
            });
        }
        serde_json::from_value(payload).map_err(|e| RequestError::Deserialization(e.to_string()))
    }
}

impl<X: Transport> RequestClient<X> {
    fn execute<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, RequestError> {
        tracing::debug!(method = %request.method, url = %request.url, "issuing request");
        let result = self
            .transport
            .execute(&request)
            .and_then(|response| self.parse_response(response));
        if let Err(err) = &result {
            tracing::warn!(method = %request.method, url = %request.url, error = %err, "request failed");
        }
        result
    }

    /// Issue a GET and block until it settles.
    pub fn get<T: DeserializeOwned, P: Serialize + ?Sized>(
        &self,
        url: &str,
        params: &P,
        config: &RequestConfig,
    ) -> Result<T, RequestError> {
        let request = self.build_get(url, params, config)?;
        self.execute(request)
    }

    /// Issue a POST and block until it settles.
    pub fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        config: &RequestConfig,
    ) -> Result<T, RequestError> {
        let request = self.build_post(url, body, config)?;
        self.execute(request)
    }
}

impl<X: Transport + 'static> RequestClient<X> {
    async fn execute_async<T>(&self, request: HttpRequest) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.execute(request))
            .await
            .map_err(|_| RequestError::Aborted)?
    }

    /// Issue a GET without blocking the async runtime.
    pub async fn get_async<T, P>(
        &self,
        url: &str,
        params: &P,
        config: &RequestConfig,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Send + 'static,
        P: Serialize + ?Sized,
    {
        let request = self.build_get(url, params, config)?;
        self.execute_async(request).await
    }

    /// Issue a POST without blocking the async runtime.
    pub async fn post_async<T, B>(
        &self,
        url: &str,
        body: &B,
        config: &RequestConfig,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let request = self.build_post(url, body, config)?;
        self.execute_async(request).await
    }

    /// Start a GET and return its handle immediately.
    ///
    /// Outside a tokio runtime the handle comes back already failed with
    /// `RequestError::Aborted`.
    pub fn spawn_get<T, P>(&self, url: &str, params: &P, config: &RequestConfig) -> RequestHandle<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        P: Serialize + ?Sized,
    {
        let request = self.build_get(url, params, config);
        self.spawn(request)
    }

    /// Start a POST and return its handle immediately.
    ///
    /// Outside a tokio runtime the handle comes back already failed with
    /// `RequestError::Aborted`.
    pub fn spawn_post<T, B>(&self, url: &str, body: &B, config: &RequestConfig) -> RequestHandle<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        B: Serialize + ?Sized,
    {
        let request = self.build_post(url, body, config);
        self.spawn(request)
    }

    fn spawn<T>(&self, request: Result<HttpRequest, RequestError>) -> RequestHandle<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let handle = RequestHandle::pending();
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                handle.settle(Err(err));
                return handle;
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = self.clone();
                let settler = handle.clone();
                runtime.spawn(async move {
                    let result = client.execute_async(request).await;
                    settler.settle(result);
                });
            }
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "no tokio runtime to run request");
                handle.settle(Err(RequestError::Aborted));
            }
        }
        handle
    }
}

/// `true` for payloads the API treats as "no body".
fn is_falsy(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    const BASE_URL: &str = "http://localhost:3000";

    fn client() -> RequestClient {
        RequestClient::new(ClientConfig::new(BASE_URL))
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    /// Records every request and answers with a canned response.
    struct Canned {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(response: HttpResponse) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    #[test]
    fn build_get_merges_and_trims_params() {
        let req = client()
            .build_get("/search?x=1", &json!({"y": " 2 "}), &RequestConfig::default())
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/search?x=1&y=2");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_get_caller_params_override_embedded_ones() {
        let req = client()
            .build_get("/search?page=1&q=old", &json!({"q": "new"}), &RequestConfig::default())
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/search?page=1&q=new");
    }

    #[test]
    fn build_get_without_params_has_no_question_mark() {
        let req = client()
            .build_get("/profile", &(), &RequestConfig::default())
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/profile");
    }

    #[test]
    fn build_get_trims_embedded_values_too() {
        let req = client()
            .build_get("/search?q=%20rust%20", &(), &RequestConfig::default())
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/search?q=rust");
    }

    #[test]
    fn build_get_survives_malformed_embedded_query() {
        let req = client()
            .build_get("/search?bad=%E0%A4%A", &json!({"y": "2"}), &RequestConfig::default())
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/search?y=2");
    }

    #[test]
    fn build_get_escapes_keys_the_uri_cannot_carry() {
        let expected = "http://localhost:3000/echo?first%20name=Ada";
        let req = client()
            .build_get("/echo", &json!({"first name": "Ada"}), &RequestConfig::default())
            .unwrap();
        assert_eq!(req.url, expected);

        let req = client()
            .build_get("/echo?first name=Ada", &(), &RequestConfig::default())
            .unwrap();
        assert_eq!(req.url, expected);
    }

    #[test]
    fn build_get_rejects_non_map_params() {
        let err = client()
            .build_get("/search", &"nope", &RequestConfig::default())
            .unwrap_err();
        assert!(matches!(err, RequestError::Serialization(_)));
    }

    #[test]
    fn build_get_carries_request_config() {
        let config = RequestConfig::default()
            .header("accept", "application/json")
            .timeout(Duration::from_secs(3));
        let req = client().build_get("/profile", &(), &config).unwrap();
        assert_eq!(req.headers, vec![("accept".to_string(), "application/json".to_string())]);
        assert_eq!(req.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn build_post_produces_json_request() {
        #[derive(Serialize)]
        struct Message<'a> {
            name: &'a str,
            text: &'a str,
        }
        let req = client()
            .build_post("/messages", &Message { name: "Ada", text: "hi" }, &RequestConfig::default())
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/messages");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "Ada", "text": "hi"}));
    }

    #[test]
    fn build_post_lets_caller_replace_content_type() {
        let config = RequestConfig::default()
            .header("Content-Type", "application/vnd.folio+json")
            .header("x-trace", "1");
        let req = client().build_post("/messages", &json!({}), &config).unwrap();
        assert_eq!(
            req.headers,
            vec![
                ("Content-Type".to_string(), "application/vnd.folio+json".to_string()),
                ("x-trace".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn parse_response_decodes_json() {
        #[derive(Deserialize)]
        struct Profile {
            name: String,
        }
        let profile: Profile = client().parse_response(ok(r#"{"name":"Ada"}"#)).unwrap();
        assert_eq!(profile.name, "Ada");
    }

    #[test]
    fn parse_response_offers_plain_text_as_string() {
        let text: String = client().parse_response(ok("hello")).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn parse_response_empty_body_is_an_error() {
        for body in ["", "null", "false", "0", "\"\""] {
            let err = client().parse_response::<Value>(ok(body)).unwrap_err();
            assert_eq!(err, RequestError::EmptyBody { status: 200 }, "body {body:?}");
        }
    }

    #[test]
    fn parse_response_non_success_status() {
        let response = HttpResponse {
            status: 500,
            headers: Vec::new(),
            body: "internal error".to_string(),
        };
        let err = client().parse_response::<Value>(response).unwrap_err();
        assert_eq!(
            err,
            RequestError::Status {
                status: 500,
                body: "internal error".to_string()
            }
        );
    }

    #[test]
    fn parse_response_wrong_shape() {
        let err = client().parse_response::<Vec<u32>>(ok(r#"{"a":1}"#)).unwrap_err();
        assert!(matches!(err, RequestError::Deserialization(_)));
    }

    #[test]
    fn get_executes_through_the_transport() {
        let client = RequestClient::with_transport(
            ClientConfig::new(BASE_URL),
            Canned::new(ok(r#"{"ok":true}"#)),
        );
        let data: Value = client
            .get("/search?x=1", &json!({"y": " 2 "}), &RequestConfig::default())
            .unwrap();
        assert_eq!(data, json!({"ok": true}));

        let seen = client.transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "http://localhost:3000/search?x=1&y=2");
    }

    #[test]
    fn post_surfaces_empty_body() {
        let client = RequestClient::with_transport(ClientConfig::new(BASE_URL), Canned::new(ok("")));
        let err = client
            .post::<Value, _>("/messages", &json!({"a": 1}), &RequestConfig::default())
            .unwrap_err();
        assert_eq!(err, RequestError::EmptyBody { status: 200 });
    }

    #[tokio::test]
    async fn get_async_resolves_with_payload() {
        let client = RequestClient::with_transport(ClientConfig::new(BASE_URL), Canned::new(ok("[1,2]")));
        let data: Vec<u8> = client
            .get_async("/list", &(), &RequestConfig::default())
            .await
            .unwrap();
        assert_eq!(data, vec![1, 2]);
    }

    #[tokio::test]
    async fn spawn_get_returns_pending_handle_that_settles() {
        let client = RequestClient::with_transport(ClientConfig::new(BASE_URL), Canned::new(ok("\"hi\"")));
        let handle = client.spawn_get::<String, _>("/greeting", &(), &RequestConfig::default());
        assert_eq!(handle.settled().await, Ok("hi".to_string()));
        assert!(!handle.is_pending());
        assert_eq!(handle.data(), Some("hi".to_string()));
        assert!(handle.error().is_none());
    }

    #[tokio::test]
    async fn spawn_post_with_bad_body_fails_immediately() {
        let client = RequestClient::with_transport(ClientConfig::new(BASE_URL), Canned::new(ok("1")));
        let mut body = std::collections::HashMap::new();
        body.insert(vec![1u8], "non-string key");
        let handle = client.spawn_post::<Value, _>("/messages", &body, &RequestConfig::default());
        assert!(!handle.is_pending());
        assert!(matches!(handle.error(), Some(RequestError::Serialization(_))));
        assert!(client.transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn spawn_get_outside_a_runtime_fails_the_handle() {
        let client = RequestClient::with_transport(ClientConfig::new(BASE_URL), Canned::new(ok("1")));
        let handle = client.spawn_get::<Value, _>("/profile", &(), &RequestConfig::default());
        assert!(!handle.is_pending());
        assert_eq!(handle.error(), Some(RequestError::Aborted));
        assert!(client.transport.seen.lock().unwrap().is_empty());
    }
}

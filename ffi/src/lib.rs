//! C-ABI wrapper around `folio-request`.
//!
//! # Overview
//! Exposes the query codec and the build/parse half of the request client
//! through `extern "C"` functions, so a host written in any language with a
//! C FFI can build requests, execute them with its own HTTP stack, and hand
//! the responses back for checking.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Maps and payloads travel as JSON text.
//! - A single `FfiFolioResult` envelope conveys payloads and errors.
//! - The C caller owns all returned pointers and must release them with the
//!   matching `folio_free_*` function.

pub mod types;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use folio_request::{query, ClientConfig, HttpResponse, RequestClient, RequestConfig, RequestError};
use serde_json::Value;

use types::*;

// ---------------------------------------------------------------------------
// Query codec
// ---------------------------------------------------------------------------

/// Parse a query string into a JSON object.
///
/// On success `data` holds the JSON text, e.g. `{"a":["1","2"]}`.
#[unsafe(no_mangle)]
pub extern "C" fn folio_query_parse(query_string: *const c_char) -> *mut FfiFolioResult {
    catch_unwind(|| {
        let Some(input) = read_str(query_string) else {
            return FfiFolioResult::null_arg("query_string");
        };
        match query::parse(input) {
            Ok(params) => FfiFolioResult::ok(Value::Object(params).to_string()),
            Err(e) => FfiFolioResult::from_query_error(e),
        }
    })
    .unwrap_or_else(|_| FfiFolioResult::panic("panic in folio_query_parse"))
}

/// Serialize a JSON object into a query string.
///
/// On success `data` holds the query string without a leading `?`.
#[unsafe(no_mangle)]
pub extern "C" fn folio_query_stringify(params_json: *const c_char) -> *mut FfiFolioResult {
    catch_unwind(|| {
        let Some(input) = read_str(params_json) else {
            return FfiFolioResult::null_arg("params_json");
        };
        let params: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(e) => {
                return FfiFolioResult::from_error(folio_request::RequestError::Deserialization(
                    e.to_string(),
                ))
            }
        };
        match query::to_query_string(&params) {
            Ok(qs) => FfiFolioResult::ok(qs),
            Err(e) => FfiFolioResult::from_query_error(e),
        }
    })
    .unwrap_or_else(|_| FfiFolioResult::panic("panic in folio_query_stringify"))
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client bound to `base_url`. `timeout_ms == 0` keeps the default
/// 10 second timeout.
///
/// Returns null if `base_url` is null or not UTF-8. The caller must free the
/// returned pointer with `folio_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn folio_client_new(base_url: *const c_char, timeout_ms: u64) -> *mut FfiFolioClient {
    catch_unwind(|| {
        let Some(url) = read_str(base_url) else {
            return std::ptr::null_mut();
        };
        let mut config = ClientConfig::new(url);
        if timeout_ms > 0 {
            config = config.with_timeout(Duration::from_millis(timeout_ms));
        }
        let client = RequestClient::new(config);
        Box::into_raw(Box::new(FfiFolioClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `folio_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn folio_client_free(client: *mut FfiFolioClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Build a GET request. `params_json` may be null (no extra parameters).
///
/// Returns null if `client` or `url` is null, or if `params_json` is not a
/// JSON object. The caller must free the result with `folio_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn folio_build_get(
    client: *const FfiFolioClient,
    url: *const c_char,
    params_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let Some(url) = read_str(url) else {
            return std::ptr::null_mut();
        };
        let params = match read_str(params_json) {
            None => Value::Null,
            Some(raw) => match serde_json::from_str(raw) {
                Ok(v) => v,
                Err(_) => return std::ptr::null_mut(),
            },
        };
        match client.inner.build_get(url, &params, &RequestConfig::default()) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Build a POST request carrying `body_json`.
///
/// Returns null if any argument is null or `body_json` is not JSON.
#[unsafe(no_mangle)]
pub extern "C" fn folio_build_post(
    client: *const FfiFolioClient,
    url: *const c_char,
    body_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let (Some(url), Some(raw)) = (read_str(url), read_str(body_json)) else {
            return std::ptr::null_mut();
        };
        let body: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => return std::ptr::null_mut(),
        };
        match client.inner.build_post(url, &body, &RequestConfig::default()) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response
// ---------------------------------------------------------------------------

/// A null body is an empty body; a body that is not UTF-8 cannot be checked.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> Result<HttpResponse, RequestError> {
    let body = if resp.body.is_null() {
        String::new()
    } else {
        read_str(resp.body)
            .ok_or_else(|| RequestError::Deserialization("response body is not valid UTF-8".into()))?
            .to_string()
    };
    Ok(HttpResponse {
        status: resp.status,
        headers: Vec::new(),
        body,
    })
}

/// Check a response. On success `data` holds the payload as JSON text.
#[unsafe(no_mangle)]
pub extern "C" fn folio_parse_response(
    client: *const FfiFolioClient,
    response: *const FfiHttpResponse,
) -> *mut FfiFolioResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiFolioResult::null_arg("client");
        }
        if response.is_null() {
            return FfiFolioResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        let parsed = ffi_response_to_core(resp)
            .and_then(|resp| client.inner.parse_response::<Value>(resp));
        match parsed {
            Ok(payload) => FfiFolioResult::ok(payload.to_string()),
            Err(e) => FfiFolioResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiFolioResult::panic("panic in folio_parse_response"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a request returned by `folio_build_*`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn folio_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        free_c_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

/// Free a result returned by any function producing `FfiFolioResult`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn folio_free_result(result: *mut FfiFolioResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.data);
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn folio_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

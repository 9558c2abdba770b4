//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! enums with explicit discriminants. Payloads that are maps or arbitrary
//! JSON cross the boundary as JSON text so C never has to walk a tree.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::time::Duration;

use folio_request::{HttpMethod, HttpRequest, QueryError, RequestClient, RequestError};

/// Opaque handle to a `RequestClient`.
pub struct FfiFolioClient {
    pub(crate) inner: RequestClient,
}

/// Move `s` onto the C heap. Strings containing NUL come back as null.
pub(crate) fn c_string(s: String) -> *mut c_char {
    CString::new(s)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

/// Borrow a C string as UTF-8. Null or non-UTF-8 input yields `None`.
pub(crate) fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// `timeout_ms` is 0 when the request carries no override.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
    pub timeout_ms: u64,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let url = c_string(req.url);
        let body = req.body.map(c_string).unwrap_or(std::ptr::null_mut());
        let timeout_ms = req
            .timeout
            .map(|t: Duration| t.as_millis().min(u64::MAX as u128) as u64)
            .unwrap_or(0);

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k),
                    value: c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url,
            headers,
            headers_len,
            body,
            timeout_ms,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller fills this in after executing a request and passes a
/// pointer to `folio_parse_response`. The FFI layer reads but does not free
/// these fields; a null `body` is an empty body.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiFolioResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Query = 1,
    Transport = 2,
    Timeout = 3,
    Status = 4,
    EmptyBody = 5,
    Serialization = 6,
    Deserialization = 7,
    Config = 8,
    Aborted = 9,
    Panic = 10,
    NullArg = 11,
}

/// Result envelope for every fallible call.
///
/// On success `error_code` is `Ok`, `error_message` is null and `data`
/// holds the payload (JSON text, or a query string for
/// `folio_query_stringify`). On failure `data` is null.
#[repr(C)]
pub struct FfiFolioResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data: *mut c_char,
}

impl FfiFolioResult {
    fn boxed(error_code: FfiErrorCode, message: Option<String>, http_status: u16, data: Option<String>) -> *mut Self {
        Box::into_raw(Box::new(FfiFolioResult {
            error_code,
            error_message: message.map(c_string).unwrap_or(std::ptr::null_mut()),
            http_status,
            data: data.map(c_string).unwrap_or(std::ptr::null_mut()),
        }))
    }

    pub(crate) fn ok(data: String) -> *mut Self {
        Self::boxed(FfiErrorCode::Ok, None, 0, Some(data))
    }

    pub(crate) fn from_query_error(err: QueryError) -> *mut Self {
        Self::boxed(FfiErrorCode::Query, Some(err.to_string()), 0, None)
    }

    pub(crate) fn from_error(err: RequestError) -> *mut Self {
        let (code, status) = match &err {
            RequestError::Transport(_) => (FfiErrorCode::Transport, 0),
            RequestError::Timeout => (FfiErrorCode::Timeout, 0),
            RequestError::Status { status, .. } => (FfiErrorCode::Status, *status),
            RequestError::EmptyBody { status } => (FfiErrorCode::EmptyBody, *status),
            RequestError::Serialization(_) => (FfiErrorCode::Serialization, 0),
            RequestError::Deserialization(_) => (FfiErrorCode::Deserialization, 0),
            RequestError::Config(_) => (FfiErrorCode::Config, 0),
            RequestError::Aborted => (FfiErrorCode::Aborted, 0),
        };
        Self::boxed(code, Some(err.to_string()), status, None)
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::NullArg, Some(format!("null argument: {name}")), 0, None)
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, Some(msg.to_string()), 0, None)
    }
}

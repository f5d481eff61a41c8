//! Responses sent back to the client runtime.
//!
//! # Design Decisions
//! - Statement output is streamed; nothing is buffered to completion
//! - Script responses are never cacheable, each one addresses a single
//!   client object
//! - The only non-script response is 400 for calls with no usable object

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::relay::writer::StatementStream;

pub const SCRIPT_CONTENT_TYPE: &str = "text/javascript; charset=UTF-8";

/// Wrap a statement stream into a streaming `200 OK` script response.
pub fn script_response(statements: StatementStream) -> Response {
    let mut response = Response::new(Body::from_stream(statements));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(SCRIPT_CONTENT_TYPE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Plain-text rejection for calls that cannot be answered with statements.
pub fn bad_request(reason: impl ToString) -> Response {
    (StatusCode::BAD_REQUEST, reason.to_string()).into_response()
}

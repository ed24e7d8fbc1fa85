// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP responder for fault chains on top of [`axum`].
//!
//! [`log_and_respond`] is the boundary where a bubbling chain leaves the
//! process: it attaches request metadata, logs the full structured record
//! via `faultline-log`, and writes back an empty-bodied response carrying
//! only the status mapped from the chain's classification. Message text and
//! details stay inside the trust boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use faultline::{Code, Details, Fault};
use std::net::SocketAddr;
use std::sync::RwLock;

/// Classification for failures while talking to the client itself.
///
/// Communication is unstable by nature; these should not be reported as
/// classic [`Code::INTERNAL`].
pub const COMMUNICATION: Code = Code::from_static("http-communication");

/// Classification for failures reaching a third-party service.
pub const SERVICE_NOT_REACHABLE: Code = Code::from_static("http-service-not-reachable");

/// Maps a classification code to the HTTP status responded for it.
pub type StatusMapper = Box<dyn Fn(&Code) -> StatusCode + Send + Sync>;

static STATUS_MAPPER: RwLock<Option<StatusMapper>> = RwLock::new(None);

/// Replace the process-wide status mapping used by [`log_and_respond`].
///
/// Meant to be called once (or rarely) at startup; concurrent readers see
/// the new mapping after this returns.
pub fn set_status_mapping(mapper: StatusMapper) {
    *STATUS_MAPPER.write().expect("status mapping lock poisoned") = Some(mapper);
}

/// Status responded for the given fault under the current mapping.
///
/// Defaults to [`StatusCode::INTERNAL_SERVER_ERROR`] for every code until a
/// mapping is set.
pub fn status_code_for(fault: &Fault) -> StatusCode {
    let guard = STATUS_MAPPER.read().expect("status mapping lock poisoned");
    match guard.as_ref() {
        Some(mapper) => mapper(&fault.resolve_code()),
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log the fault with request metadata attached and respond with the mapped
/// status and an empty body.
///
/// The request's URL, host, method, user agent, and remote address are
/// added as one extra detail level before logging. Only the numeric status
/// code is observable on the wire.
pub fn log_and_respond(parts: &Parts, remote_addr: Option<SocketAddr>, fault: Fault) -> Response {
    let mut details = Details::new();
    details.insert("http_req_url".to_owned(), parts.uri.to_string().into());
    details.insert("http_req_host".to_owned(), host_of(parts).into());
    details.insert(
        "http_req_method".to_owned(),
        parts.method.as_str().to_owned().into(),
    );
    details.insert(
        "http_req_user_agent".to_owned(),
        header_str(parts, header::USER_AGENT).into(),
    );
    details.insert(
        "http_req_remote_addr".to_owned(),
        remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_default()
            .into(),
    );
    let fault = Fault::apply_details(fault, details);
    faultline_log::log(&fault);
    respond_empty(status_code_for(&fault))
}

/// Host as reported by the request: authority of the URI, falling back to
/// the `Host` header.
fn host_of(parts: &Parts) -> String {
    match parts.uri.host() {
        Some(host) => host.to_owned(),
        None => header_str(parts, header::HOST),
    }
}

fn header_str(parts: &Parts, name: header::HeaderName) -> String {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

fn respond_empty(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serial_test::serial;

    fn parts_for(uri: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .uri(uri)
            .method("GET")
            .header(header::USER_AGENT, "test-agent/1.0")
            .header(header::HOST, "svc.internal")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    #[serial]
    fn default_mapping_is_internal_server_error() {
        assert_eq!(
            status_code_for(&Fault::bad_input("nope", None)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    #[serial]
    fn mapping_routes_codes_to_statuses() {
        set_status_mapping(Box::new(|code| {
            if *code == Code::BAD_INPUT {
                StatusCode::BAD_REQUEST
            } else if *code == Code::NOT_FOUND {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }));
        assert_eq!(
            status_code_for(&Fault::bad_input("nope", None)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code_for(&Fault::not_found("gone", None)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_code_for(&Fault::internal("boom", None)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        set_status_mapping(Box::new(|_| StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn host_falls_back_to_header() {
        let parts = parts_for("/users/x");
        assert_eq!(host_of(&parts), "svc.internal");
    }

    #[test]
    fn adapter_codes_are_namespaced() {
        assert_eq!(COMMUNICATION.as_str(), "http-communication");
        assert_eq!(SERVICE_NOT_REACHABLE.as_str(), "http-service-not-reachable");
    }
}

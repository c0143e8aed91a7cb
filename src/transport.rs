//! The transport capability and the bridge from its one-shot completion into
//! a promise resolution.
//!
//! The crate performs no network I/O itself. A [`Transport`] is handed a
//! fully-assembled [`Request`] and a completion callback, and reports exactly
//! one [`Outcome`]; the bridge adapts that outcome into exactly one
//! fulfill/reject on the promise behind the call.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::method::Method;
use crate::promise::{shared_error, Promise, SharedError};

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An outgoing HTTP request, fully assembled.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets a header, replacing any existing value under the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const NOT_ACCEPTABLE: StatusCode = StatusCode(406);
    pub const CONFLICT: StatusCode = StatusCode(409);

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a transport reports back: a response (any status), or a
/// transport-level failure that produced no response at all.
#[derive(Debug)]
pub enum Outcome {
    Response { status: StatusCode, body: Vec<u8> },
    Failure(SharedError),
}

/// One-shot completion callback handed to the transport.
pub type Completion = Box<dyn FnOnce(Outcome) + Send>;

/// Performs the actual network call.
///
/// The implementation is expected to invoke the completion exactly once; the
/// promise on the other side of the bridge ignores anything after the first
/// resolution regardless.
pub trait Transport: Send + Sync {
    fn perform(&self, request: Request, completion: Completion);
}

/// How non-success responses surface to callers.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("there was no content available on the server ({reason})")]
    NoContent { reason: String },
    #[error("you are not authorized to perform this action")]
    Unauthorized,
    #[error("the requested resource was not found on the server ({resource})")]
    NotFound { resource: String },
    #[error("the request was not acceptable ({reason})")]
    NotAcceptable { reason: String },
    #[error("the request conflicted with existing data on the server ({reason})")]
    Conflict { reason: String },
    #[error("the server answered {status} ({reason})")]
    Unknown { status: StatusCode, reason: String },
}

impl ServerError {
    /// Maps a non-success status to an error, pulling the reason out of a
    /// JSON `{"reason": ...}` body when the server provides one.
    pub fn from_status(status: StatusCode, body: &[u8], path: &str) -> ServerError {
        let reason = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("reason")?.as_str().map(str::to_owned))
            .unwrap_or_else(|| "no reason provided".to_owned());
        match status {
            StatusCode::NO_CONTENT => ServerError::NoContent { reason },
            StatusCode::UNAUTHORIZED => ServerError::Unauthorized,
            StatusCode::NOT_FOUND => ServerError::NotFound {
                resource: path.to_owned(),
            },
            StatusCode::NOT_ACCEPTABLE => ServerError::NotAcceptable { reason },
            StatusCode::CONFLICT => ServerError::Conflict { reason },
            _ => ServerError::Unknown { status, reason },
        }
    }
}

/// Adapts the transport's three-way outcome into exactly one fulfill/reject.
pub(crate) fn bridge(promise: Promise<Vec<u8>>, path: String) -> Completion {
    Box::new(move |outcome| match outcome {
        Outcome::Response { status, body } if status.is_success() => promise.fulfill(body),
        Outcome::Response { status, body } => {
            promise.reject(shared_error(ServerError::from_status(status, &body, &path)));
        }
        Outcome::Failure(error) => promise.reject(error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_replace_case_insensitively() {
        let mut request = Request::new(Method::Get, "https://api.example.com/songs");
        request.set_header("Content-Type", "application/json");
        request.set_header("content-type", "application/octet-stream");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("CONTENT-TYPE"), Some("application/octet-stream"));
    }

    #[test]
    fn status_mapping_reads_the_reason_body() {
        let error = ServerError::from_status(
            StatusCode::CONFLICT,
            br#"{"reason": "name already taken"}"#,
            "https://api.example.com/songs",
        );
        assert!(matches!(error, ServerError::Conflict { reason } if reason == "name already taken"));
    }

    #[test]
    fn status_mapping_defaults_the_reason() {
        let error = ServerError::from_status(StatusCode(500), b"", "https://api.example.com");
        assert!(
            matches!(error, ServerError::Unknown { status, reason }
                if status == StatusCode(500) && reason == "no reason provided")
        );
    }

    #[test]
    fn not_found_carries_the_path() {
        let error = ServerError::from_status(StatusCode::NOT_FOUND, b"", "https://api.example.com/nope");
        assert!(matches!(error, ServerError::NotFound { resource } if resource.ends_with("/nope")));
    }
}

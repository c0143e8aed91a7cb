//! HTTP methods.

use std::fmt;

/// The action to be performed on the resource behind an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Requests a representation of the resource; retrieval only.
    Get,
    /// Submits an entity, often changing state on the server.
    Post,
    /// Replaces the target resource with the request payload.
    Put,
    /// Deletes the resource.
    Delete,
    /// Applies partial modifications to the resource.
    Patch,
    /// Like GET, but without a response body.
    Head,
    /// Establishes a tunnel to the server.
    Connect,
    /// Describes the communication options for the resource.
    Options,
    /// Performs a message loop-back test along the path to the resource.
    Trace,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

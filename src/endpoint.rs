//! Statically-typed API endpoints.
//!
//! An [`Api`] bundles everything a request needs — base URL, shared headers,
//! credential store, transport — and endpoints are defined against it. The
//! request body type, response body type and credentials requirement are all
//! part of an endpoint's type, so an endpoint can only be called in ways
//! that make sense for it.

use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;

use crate::base_url::BaseUrl;
use crate::codec::{FromBody, IntoBody};
use crate::context;
use crate::credentials::{CredentialsStore, NoAuth, ProvideCredentials};
use crate::method::Method;
use crate::promise::{shared_error, Promise, SharedError};
use crate::transport::{self, Request, Transport};

/// An endpoint that requires no credentials.
pub type PublicEndpoint<Req, Res> = Endpoint<Req, Res, NoAuth>;

/// An endpoint that performs an action with no request or response content.
pub type ActionEndpoint<Auth> = Endpoint<(), (), Auth>;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("could not construct a URL from the given base and path pair ({0})")]
    MalformedUrl(String),
}

/// An API definition that endpoints are created against. Cheap to clone;
/// every field is explicit, nothing is reached through global state.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    base_url: BaseUrl,
    headers: Vec<(String, String)>,
    credentials: CredentialsStore,
    transport: Arc<dyn Transport>,
}

impl Api {
    pub fn new(base_url: BaseUrl, transport: Arc<dyn Transport>) -> Self {
        Self::with_headers(base_url, transport, Vec::new())
    }

    /// Shared headers ride on every request in the API; a good place for API
    /// keys or client secrets.
    pub fn with_headers(
        base_url: BaseUrl,
        transport: Arc<dyn Transport>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            inner: Arc::new(ApiInner {
                base_url,
                headers,
                credentials: CredentialsStore::new(),
                transport,
            }),
        }
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.inner.base_url
    }

    /// The store endpoints of this API pull their credentials from.
    pub fn credentials(&self) -> &CredentialsStore {
        &self.inner.credentials
    }

    /// Defines an endpoint within this API.
    pub fn endpoint<Req, Res, Auth>(
        &self,
        method: Method,
        path: impl Into<String>,
    ) -> Endpoint<Req, Res, Auth> {
        Endpoint {
            api: self.clone(),
            method,
            path: path.into(),
            configure: None,
            _types: PhantomData,
        }
    }
}

/// A statically-typed endpoint within an [`Api`].
pub struct Endpoint<Req, Res, Auth> {
    api: Api,
    method: Method,
    path: String,
    configure: Option<Arc<dyn Fn(&mut Request) + Send + Sync>>,
    _types: PhantomData<fn(Req, Auth) -> Res>,
}

impl<Req, Res, Auth> Clone for Endpoint<Req, Res, Auth> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            method: self.method,
            path: self.path.clone(),
            configure: self.configure.clone(),
            _types: PhantomData,
        }
    }
}

impl<Req, Res, Auth> Endpoint<Req, Res, Auth> {
    /// Extra request configuration, applied after the body and credentials.
    pub fn configured_by(mut self, configure: impl Fn(&mut Request) + Send + Sync + 'static) -> Self {
        self.configure = Some(Arc::new(configure));
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The full URL represented by this endpoint.
    pub fn url(&self) -> Result<String, EndpointError> {
        let joined = self.api.inner.base_url.join(&self.path);
        // Callers are expected to percent-encode query fragments; anything
        // that still contains whitespace or control characters cannot be a
        // URL.
        if joined.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(EndpointError::MalformedUrl(joined));
        }
        Ok(joined)
    }
}

impl<Req, Res, Auth> Endpoint<Req, Res, Auth>
where
    Req: IntoBody,
    Res: FromBody + Clone + Send + 'static,
    Auth: ProvideCredentials,
{
    /// Calls the endpoint with a request payload.
    ///
    /// The returned promise rejects immediately if the request cannot be
    /// assembled (malformed URL, body encoding failure, missing
    /// credentials); otherwise it settles with the decoded response once the
    /// transport completes.
    pub fn call_with(&self, request_value: Req) -> Promise<Res> {
        let url = match self.url() {
            Ok(url) => url,
            Err(error) => {
                let failed: Promise<Vec<u8>> =
                    Promise::pending(format!("{} {}", self.method, self.path));
                failed.reject(shared_error(error));
                return decoded(failed);
            }
        };
        let bytes: Promise<Vec<u8>> = Promise::pending(format!("{} {}", self.method, url));

        match self.assemble(url.clone(), request_value) {
            Ok(request) => {
                tracing::debug!(method = %self.method, url = %url, "dispatching request");
                self.api
                    .inner
                    .transport
                    .perform(request, transport::bridge(bytes.clone(), url));
            }
            Err(error) => bytes.reject(error),
        }

        decoded(bytes)
    }

    fn assemble(&self, url: String, request_value: Req) -> Result<Request, SharedError> {
        let mut request = Request::new(self.method, url);
        for (name, value) in &self.api.inner.headers {
            request.set_header(name, value.clone());
        }
        if let Some(content_type) = request_value.content_type() {
            request.set_header("Content-Type", content_type);
        }
        request.body = request_value.into_body().map_err(shared_error)?;
        Auth::apply(&self.api.inner.credentials, &mut request)?;
        if let Some(configure) = &self.configure {
            configure(&mut request);
        }
        Ok(request)
    }
}

impl<Res, Auth> Endpoint<(), Res, Auth>
where
    Res: FromBody + Clone + Send + 'static,
    Auth: ProvideCredentials,
{
    /// Calls the endpoint without a request payload.
    pub fn call(&self) -> Promise<Res> {
        self.call_with(())
    }
}

/// Chains response decoding onto the raw byte promise.
fn decoded<Res>(bytes: Promise<Vec<u8>>) -> Promise<Res>
where
    Res: FromBody + Clone + Send + 'static,
{
    bytes.map_on(&context::immediate(), |body| {
        Res::from_body(&body).map_err(shared_error)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Completion, Outcome, StatusCode};

    struct NoNetwork;

    impl Transport for NoNetwork {
        fn perform(&self, _request: Request, completion: Completion) {
            completion(Outcome::Response {
                status: StatusCode::OK,
                body: Vec::new(),
            });
        }
    }

    fn api() -> Api {
        Api::new(
            BaseUrl::parse("https://api.example.com").unwrap(),
            Arc::new(NoNetwork),
        )
    }

    #[test]
    fn url_joins_base_and_path() {
        let endpoint: PublicEndpoint<(), ()> = api().endpoint(Method::Get, "/songs/");
        assert_eq!(endpoint.url().unwrap(), "https://api.example.com/songs");
    }

    #[test]
    fn url_with_whitespace_is_malformed() {
        let endpoint: PublicEndpoint<(), ()> = api().endpoint(Method::Get, "search?term=no spaces");
        assert!(matches!(endpoint.url(), Err(EndpointError::MalformedUrl(_))));
    }
}

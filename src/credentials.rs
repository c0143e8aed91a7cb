//! Caller-owned credential capabilities.
//!
//! A [`CredentialsStore`] maps credential *types* to zero-argument fallible
//! providers, keyed by `TypeId` so registrations can never collide across
//! types. The store belongs to an [`Api`](crate::Api) value and travels down
//! the call path explicitly; there is no process-wide registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::promise::{shared_error, SharedError};
use crate::transport::Request;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no credentials have been provided for the required type ({0})")]
    NotConfigured(&'static str),
    #[error("the registered provider for {0} failed")]
    Provider(&'static str, #[source] SharedError),
}

/// Credentials that can configure an outgoing request, typically by setting
/// an Authorization header.
pub trait Credentials: Send + 'static {
    fn configure(&self, request: &mut Request) -> Result<(), SharedError>;
}

type Provider = Arc<dyn Fn() -> Result<Box<dyn Any + Send>, SharedError> + Send + Sync>;

/// An explicit store of credential providers, one per credential type.
#[derive(Default, Clone)]
pub struct CredentialsStore {
    providers: Arc<RwLock<HashMap<TypeId, Provider>>>,
}

impl CredentialsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the provider consulted whenever an endpoint requires
    /// credentials of type `C`.
    pub fn register<C, F>(&self, provider: F)
    where
        C: Credentials,
        F: Fn() -> Result<C, SharedError> + Send + Sync + 'static,
    {
        let erased: Provider = Arc::new(move || {
            provider().map(|credentials| Box::new(credentials) as Box<dyn Any + Send>)
        });
        self.providers.write().insert(TypeId::of::<C>(), erased);
    }

    /// Retrieves credentials of type `C` from its registered provider.
    pub fn credentials<C: Credentials>(&self) -> Result<C, CredentialsError> {
        let name = std::any::type_name::<C>();
        let provider = self
            .providers
            .read()
            .get(&TypeId::of::<C>())
            .cloned()
            .ok_or(CredentialsError::NotConfigured(name))?;
        let untyped = provider().map_err(|error| CredentialsError::Provider(name, error))?;
        // The map is keyed by TypeId, so the downcast cannot miss.
        let credentials = untyped
            .downcast::<C>()
            .map_err(|_| CredentialsError::NotConfigured(name))?;
        Ok(*credentials)
    }
}

/// Ties an endpoint type to the credentials it needs at call time.
pub trait ProvideCredentials {
    fn apply(store: &CredentialsStore, request: &mut Request) -> Result<(), SharedError>;
}

/// Marker for endpoints that require no authentication.
pub struct NoAuth;

impl ProvideCredentials for NoAuth {
    fn apply(_store: &CredentialsStore, _request: &mut Request) -> Result<(), SharedError> {
        Ok(())
    }
}

/// Marker for endpoints that require credentials of type `C`, pulled from
/// the API's store when the call is made.
pub struct Requires<C: Credentials>(PhantomData<C>);

impl<C: Credentials> ProvideCredentials for Requires<C> {
    fn apply(store: &CredentialsStore, request: &mut Request) -> Result<(), SharedError> {
        store
            .credentials::<C>()
            .map_err(shared_error)?
            .configure(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[derive(Debug, PartialEq)]
    struct BearerToken(String);

    impl Credentials for BearerToken {
        fn configure(&self, request: &mut Request) -> Result<(), SharedError> {
            request.set_header("Authorization", format!("Bearer {}", self.0));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct ApiKey(String);

    impl Credentials for ApiKey {
        fn configure(&self, request: &mut Request) -> Result<(), SharedError> {
            request.set_header("X-Api-Key", self.0.clone());
            Ok(())
        }
    }

    #[test]
    fn registered_credentials_are_typed() {
        let store = CredentialsStore::new();
        store.register(|| Ok(BearerToken("abc".to_owned())));
        store.register(|| Ok(ApiKey("xyz".to_owned())));

        assert_eq!(
            store.credentials::<BearerToken>().unwrap(),
            BearerToken("abc".to_owned())
        );

        let mut request = Request::new(Method::Get, "https://api.example.com");
        Requires::<ApiKey>::apply(&store, &mut request).unwrap();
        assert_eq!(request.header("X-Api-Key"), Some("xyz"));
    }

    #[test]
    fn missing_credentials_are_an_error() {
        let store = CredentialsStore::new();
        let error = store.credentials::<BearerToken>().unwrap_err();
        assert!(matches!(error, CredentialsError::NotConfigured(_)));
    }

    #[test]
    fn provider_failures_are_surfaced() {
        #[derive(Debug, thiserror::Error)]
        #[error("keychain locked")]
        struct KeychainLocked;

        let store = CredentialsStore::new();
        store.register::<BearerToken, _>(|| Err(shared_error(KeychainLocked)));
        let error = store.credentials::<BearerToken>().unwrap_err();
        assert!(matches!(error, CredentialsError::Provider(_, _)));
    }
}

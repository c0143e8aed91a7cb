//! Typed client-side HTTP endpoints that settle through thread-safe promises.
//!
//! The heart of the crate is [`Promise`]: a single-assignment asynchronous
//! value that is fulfilled or rejected exactly once and delivers its
//! callbacks in registration order, each on the [execution
//! context](context::ExecutionContext) it asked for. On top of it sits a thin
//! typed endpoint layer: an [`Api`] describes where requests go and how they
//! authenticate, an [`Endpoint`] describes one call's request/response body
//! types, and a pluggable [`Transport`] performs the actual network I/O.
//!
//! ```
//! use futures::executor::block_on;
//! use gangway::context;
//! use gangway::Promise;
//!
//! let promise: Promise<&'static str> = Promise::with_producer(
//!     "greeting",
//!     &context::spawn(),
//!     |resolver| {
//!         resolver.fulfill("hello");
//!         Ok(())
//!     },
//! );
//! let shouted = promise.map_on(&context::immediate(), |s| Ok(s.to_uppercase()));
//! assert_eq!(block_on(shouted.waiter()).unwrap(), "HELLO");
//! ```

pub mod base_url;
pub mod codec;
pub mod context;
pub mod credentials;
pub mod endpoint;
pub mod method;
pub mod promise;
pub mod transport;
pub mod waiter;

pub use base_url::BaseUrl;
pub use codec::{FromBody, IntoBody, Json, Raw};
pub use context::ExecutionContext;
pub use credentials::{Credentials, CredentialsStore, NoAuth, Requires};
pub use endpoint::{ActionEndpoint, Api, Endpoint, PublicEndpoint};
pub use method::Method;
pub use promise::{shared_error, Promise, Resolver, SharedError};
pub use transport::{Outcome, Request, ServerError, StatusCode, Transport};
pub use waiter::Waiter;

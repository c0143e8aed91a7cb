//! A thread-safe, single-assignment asynchronous value.
//!
//! A [`Promise`] starts out pending and is resolved exactly once, by whichever
//! caller first fulfills or rejects it. Consumers register callbacks through
//! [`then`](Promise::then), [`catch`](Promise::catch) and the combinators;
//! every callback fires exactly once, in registration order, on the execution
//! context it asked for.
//!
//! ```
//! use gangway::context;
//! use gangway::Promise;
//!
//! let promise: Promise<i32> = Promise::pending("the answer");
//! let doubled = promise.map_on(&context::immediate(), |n| Ok(n * 2));
//! promise.fulfill(21);
//! assert_eq!(doubled.value(), Some(42));
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::context::{self, ExecutionContext};

/// The open-ended error value carried by rejected promises.
///
/// The promise machinery never inspects it. It is preserved by identity and
/// handed unchanged to whichever rejection handler observes it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Wraps a concrete error so it can flow through a promise chain.
pub fn shared_error<E>(error: E) -> SharedError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

enum State<V> {
    /// Not resolved yet. Will transition to exactly one of the other states.
    Pending,
    /// The promise now has a value. Terminal.
    Fulfilled(V),
    /// The promise failed with the included error. Terminal.
    Rejected(SharedError),
}

impl<V> State<V> {
    fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }
}

struct Callback<V> {
    on_fulfilled: Box<dyn FnOnce(V) + Send>,
    on_rejected: Box<dyn FnOnce(SharedError) + Send>,
    context: Arc<dyn ExecutionContext>,
    is_catch: bool,
}

impl<V: Send + 'static> Callback<V> {
    fn fire_fulfill(self, value: V) {
        let on_fulfilled = self.on_fulfilled;
        self.context.execute(Box::new(move || on_fulfilled(value)));
    }

    fn fire_reject(self, error: SharedError) {
        let on_rejected = self.on_rejected;
        self.context.execute(Box::new(move || on_rejected(error)));
    }
}

struct Shared<V> {
    state: State<V>,
    callbacks: Vec<Callback<V>>,
}

struct Inner<V> {
    purpose: String,
    shared: Mutex<Shared<V>>,
}

/// A single-assignment asynchronous value container.
///
/// `Promise` is a handle: cloning it shares the same underlying instance
/// between the producer and every consumer.
pub struct Promise<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for Promise<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> fmt::Debug for Promise<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        let state = match shared.state {
            State::Pending => "pending",
            State::Fulfilled(_) => "fulfilled",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("Promise")
            .field("purpose", &self.inner.purpose)
            .field("state", &state)
            .field("callbacks", &shared.callbacks.len())
            .finish()
    }
}

/// The producer's half of a pending promise: fulfill or reject, nothing else.
pub struct Resolver<V>(Promise<V>);

impl<V> Clone for Resolver<V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<V: Clone + Send + 'static> Resolver<V> {
    pub fn fulfill(&self, value: V) {
        self.0.fulfill(value);
    }

    pub fn reject(&self, error: SharedError) {
        self.0.reject(error);
    }
}

impl<V: Clone + Send + 'static> Promise<V> {
    /// A pending promise, waiting for a producer to resolve it.
    ///
    /// The `purpose` is a human-readable label used when naming child
    /// promises and when reporting unobserved rejections.
    pub fn pending(purpose: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                purpose: purpose.into(),
                shared: Mutex::new(Shared {
                    state: State::Pending,
                    callbacks: Vec::new(),
                }),
            }),
        }
    }

    /// A promise that is already fulfilled with `value`.
    pub fn fulfilled(value: V) -> Self {
        Self {
            inner: Arc::new(Inner {
                purpose: "already-fulfilled promise".to_owned(),
                shared: Mutex::new(Shared {
                    state: State::Fulfilled(value),
                    callbacks: Vec::new(),
                }),
            }),
        }
    }

    /// A promise that is already rejected with `error`.
    pub fn rejected(error: SharedError) -> Self {
        Self {
            inner: Arc::new(Inner {
                purpose: "already-rejected promise".to_owned(),
                shared: Mutex::new(Shared {
                    state: State::Rejected(error),
                    callbacks: Vec::new(),
                }),
            }),
        }
    }

    /// A pending promise whose producer runs on `context`.
    ///
    /// `work` is handed a [`Resolver`] and is expected to call exactly one of
    /// its two methods exactly once; the state machine silently ignores any
    /// further resolutions. Returning an `Err` rejects the promise.
    pub fn with_producer<F>(
        purpose: impl Into<String>,
        context: &Arc<dyn ExecutionContext>,
        work: F,
    ) -> Self
    where
        F: FnOnce(Resolver<V>) -> Result<(), SharedError> + Send + 'static,
    {
        let promise = Self::pending(purpose);
        let resolver = Resolver(promise.clone());
        let failed = promise.clone();
        context.execute(Box::new(move || {
            if let Err(error) = work(resolver) {
                failed.reject(error);
            }
        }));
        promise
    }

    /// Transitions to fulfilled and delivers registered callbacks.
    /// A no-op if the promise is already resolved.
    pub fn fulfill(&self, value: V) {
        self.settle(Ok(value));
    }

    /// Transitions to rejected and delivers registered callbacks.
    /// A no-op if the promise is already resolved.
    pub fn reject(&self, error: SharedError) {
        self.settle(Err(error));
    }

    pub fn purpose(&self) -> &str {
        &self.inner.purpose
    }

    pub fn is_pending(&self) -> bool {
        self.inner.shared.lock().state.is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self.inner.shared.lock().state, State::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.shared.lock().state, State::Rejected(_))
    }

    /// The fulfilled value, if the promise has one.
    pub fn value(&self) -> Option<V> {
        match &self.inner.shared.lock().state {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection error, if the promise has one.
    pub fn error(&self) -> Option<SharedError> {
        match &self.inner.shared.lock().state {
            State::Rejected(error) => Some(error.clone()),
            _ => None,
        }
    }

    /// First resolution wins; the losing transition is a silent no-op.
    ///
    /// The drain runs at most once, under the same lock that guards the
    /// transition: a callback registered concurrently is either in the list
    /// here, or sees the resolved state and fires on registration.
    fn settle(&self, outcome: Result<V, SharedError>) {
        let mut shared = self.inner.shared.lock();
        if !shared.state.is_pending() {
            return;
        }
        shared.state = match &outcome {
            Ok(value) => State::Fulfilled(value.clone()),
            Err(error) => State::Rejected(error.clone()),
        };
        let callbacks = std::mem::take(&mut shared.callbacks);
        drop(shared);

        let observed = callbacks.iter().any(|callback| callback.is_catch);
        match outcome {
            Ok(value) => {
                for callback in callbacks {
                    callback.fire_fulfill(value.clone());
                }
            }
            Err(error) => {
                for callback in callbacks {
                    callback.fire_reject(error.clone());
                }
                if !observed {
                    report_unobserved(&self.inner.purpose, &error);
                }
            }
        }
    }

    fn add_callbacks(
        &self,
        context: Arc<dyn ExecutionContext>,
        on_fulfilled: Option<Box<dyn FnOnce(V) + Send>>,
        on_rejected: Option<Box<dyn FnOnce(SharedError) + Send>>,
    ) {
        let is_catch = on_rejected.is_some();
        let callback = Callback {
            on_fulfilled: on_fulfilled.unwrap_or_else(|| Box::new(|_| {})),
            on_rejected: on_rejected.unwrap_or_else(|| Box::new(|_| {})),
            context,
            is_catch,
        };
        let mut shared = self.inner.shared.lock();
        match &shared.state {
            State::Pending => shared.callbacks.push(callback),
            State::Fulfilled(value) => {
                let value = value.clone();
                drop(shared);
                callback.fire_fulfill(value);
            }
            State::Rejected(error) => {
                let error = error.clone();
                drop(shared);
                callback.fire_reject(error);
            }
        }
    }

    /// Registers both handlers for their side effects and returns the same
    /// promise (not a new one), so further registrations chain on this
    /// instance.
    ///
    /// The pair counts as a rejection observer for fallback reporting.
    pub fn then_on<F, G>(
        &self,
        context: &Arc<dyn ExecutionContext>,
        on_fulfilled: F,
        on_rejected: G,
    ) -> Promise<V>
    where
        F: FnOnce(V) + Send + 'static,
        G: FnOnce(SharedError) + Send + 'static,
    {
        self.add_callbacks(
            context.clone(),
            Some(Box::new(on_fulfilled)),
            Some(Box::new(on_rejected)),
        );
        self.clone()
    }

    /// [`then_on`](Promise::then_on) on the default context.
    pub fn then<F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<V>
    where
        F: FnOnce(V) + Send + 'static,
        G: FnOnce(SharedError) + Send + 'static,
    {
        self.then_on(&context::default_context(), on_fulfilled, on_rejected)
    }

    /// Registers a fulfilled-side handler only. Does not observe rejection.
    pub fn done_on<F>(&self, context: &Arc<dyn ExecutionContext>, on_fulfilled: F) -> Promise<V>
    where
        F: FnOnce(V) + Send + 'static,
    {
        self.add_callbacks(context.clone(), Some(Box::new(on_fulfilled)), None);
        self.clone()
    }

    /// [`done_on`](Promise::done_on) on the default context.
    pub fn done<F>(&self, on_fulfilled: F) -> Promise<V>
    where
        F: FnOnce(V) + Send + 'static,
    {
        self.done_on(&context::default_context(), on_fulfilled)
    }

    /// Registers a rejection handler only.
    pub fn catch_on<G>(&self, context: &Arc<dyn ExecutionContext>, on_rejected: G) -> Promise<V>
    where
        G: FnOnce(SharedError) + Send + 'static,
    {
        self.add_callbacks(context.clone(), None, Some(Box::new(on_rejected)));
        self.clone()
    }

    /// [`catch_on`](Promise::catch_on) on the default context.
    pub fn catch<G>(&self, on_rejected: G) -> Promise<V>
    where
        G: FnOnce(SharedError) + Send + 'static,
    {
        self.catch_on(&context::default_context(), on_rejected)
    }

    /// Chains an asynchronous step: when this promise fulfills, `map` produces
    /// a nested promise whose eventual resolution is forwarded to the child.
    ///
    /// Each link is callback-driven, so chains of arbitrary depth settle
    /// without growing the call stack (on an asynchronous context). A rejected
    /// parent short-circuits: `map` is never invoked and the child rejects
    /// with the parent's error.
    pub fn flat_map_on<U, F>(&self, context: &Arc<dyn ExecutionContext>, map: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(V) -> Result<Promise<U>, SharedError> + Send + 'static,
    {
        let child: Promise<U> = Promise::pending(format!("child of {}", self.purpose()));
        let on_fulfilled = {
            let child = child.clone();
            let context = context.clone();
            move |value: V| match map(value) {
                Ok(next) => {
                    let fulfilled = child.clone();
                    let rejected = child.clone();
                    next.then_on(
                        &context,
                        move |value| fulfilled.fulfill(value),
                        move |error| rejected.reject(error),
                    );
                }
                Err(error) => child.reject(error),
            }
        };
        let on_rejected = {
            let child = child.clone();
            move |error: SharedError| child.reject(error)
        };
        self.add_callbacks(
            context.clone(),
            Some(Box::new(on_fulfilled)),
            Some(Box::new(on_rejected)),
        );
        child
    }

    /// [`flat_map_on`](Promise::flat_map_on) on the default context.
    pub fn flat_map<U, F>(&self, map: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(V) -> Result<Promise<U>, SharedError> + Send + 'static,
    {
        self.flat_map_on(&context::default_context(), map)
    }

    /// Chains a synchronous transformation: the child fulfills with `map`'s
    /// output, rejects with `map`'s error, and forwards the parent's
    /// rejection unchanged.
    pub fn map_on<U, F>(&self, context: &Arc<dyn ExecutionContext>, map: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(V) -> Result<U, SharedError> + Send + 'static,
    {
        self.flat_map_on(context, move |value| {
            Ok(match map(value) {
                Ok(mapped) => Promise::fulfilled(mapped),
                Err(error) => Promise::rejected(error),
            })
        })
    }

    /// [`map_on`](Promise::map_on) on the default context.
    pub fn map<U, F>(&self, map: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(V) -> Result<U, SharedError> + Send + 'static,
    {
        self.map_on(&context::default_context(), map)
    }

    /// Pairs the fulfilled value with `addition`. If this promise rejects,
    /// the child rejects with the same error and `addition` is never
    /// observed.
    pub fn and_on<T>(&self, context: &Arc<dyn ExecutionContext>, addition: T) -> Promise<(V, T)>
    where
        T: Clone + Send + 'static,
    {
        let combined: Promise<(V, T)> =
            Promise::pending(format!("child (and) of {}", self.purpose()));
        let fulfilled = combined.clone();
        let rejected = combined.clone();
        self.then_on(
            context,
            move |value| fulfilled.fulfill((value, addition)),
            move |error| rejected.reject(error),
        );
        combined
    }

    /// [`and_on`](Promise::and_on) on the default context.
    pub fn and<T>(&self, addition: T) -> Promise<(V, T)>
    where
        T: Clone + Send + 'static,
    {
        self.and_on(&context::default_context(), addition)
    }

    /// Discards the fulfilled value and substitutes `replacement`. Rejection
    /// is forwarded unchanged.
    pub fn transform_on<T>(&self, context: &Arc<dyn ExecutionContext>, replacement: T) -> Promise<T>
    where
        T: Clone + Send + 'static,
    {
        let transformed: Promise<T> =
            Promise::pending(format!("child (transform) of {}", self.purpose()));
        let fulfilled = transformed.clone();
        let rejected = transformed.clone();
        self.then_on(
            context,
            move |_value| fulfilled.fulfill(replacement),
            move |error| rejected.reject(error),
        );
        transformed
    }

    /// [`transform_on`](Promise::transform_on) on the default context.
    pub fn transform<T>(&self, replacement: T) -> Promise<T>
    where
        T: Clone + Send + 'static,
    {
        self.transform_on(&context::default_context(), replacement)
    }
}

type FallbackCatch = Arc<dyn Fn(&str, &SharedError) + Send + Sync>;

static FALLBACK_CATCH: RwLock<Option<FallbackCatch>> = RwLock::new(None);

/// Installs the process-wide hook invoked when a rejected promise drains its
/// callbacks with no rejection handler among them.
///
/// The hook is diagnostic only: it fires at most once per promise, with the
/// promise's purpose and its error, and never alters program state. It must
/// tolerate being called from any thread.
pub fn set_fallback_catch<F>(hook: F)
where
    F: Fn(&str, &SharedError) + Send + Sync + 'static,
{
    *FALLBACK_CATCH.write() = Some(Arc::new(hook));
}

/// Removes the process-wide fallback hook.
pub fn clear_fallback_catch() {
    *FALLBACK_CATCH.write() = None;
}

/// Routes unobserved rejections through `tracing::error!`.
pub fn log_unobserved_rejections() {
    set_fallback_catch(|purpose, error| {
        tracing::error!(purpose, %error, "promise rejected with no rejection handler");
    });
}

fn report_unobserved(purpose: &str, error: &SharedError) {
    let hook = FALLBACK_CATCH.read().clone();
    if let Some(hook) = hook {
        hook(purpose, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("went wrong: {0}")]
    struct WentWrong(&'static str);

    #[test]
    fn fulfill_sets_value_once() {
        let promise: Promise<i32> = Promise::pending("test");
        assert!(promise.is_pending());
        promise.fulfill(1);
        promise.fulfill(2);
        assert!(promise.is_fulfilled());
        assert_eq!(promise.value(), Some(1));
        assert!(promise.error().is_none());
    }

    #[test]
    fn reject_wins_over_later_fulfill() {
        let promise: Promise<i32> = Promise::pending("test");
        promise.catch_on(&context::immediate(), |_| {});
        promise.reject(shared_error(WentWrong("first")));
        promise.fulfill(3);
        assert!(promise.is_rejected());
        assert!(promise.value().is_none());
        assert_eq!(promise.error().map(|e| e.to_string()), Some("went wrong: first".to_owned()));
    }

    #[test]
    fn resolved_constructors() {
        let fulfilled = Promise::fulfilled("hi".to_owned());
        assert_eq!(fulfilled.value(), Some("hi".to_owned()));

        let rejected: Promise<String> = Promise::rejected(shared_error(WentWrong("early")));
        assert!(rejected.is_rejected());
    }

    #[test]
    fn then_returns_the_same_instance() {
        let promise: Promise<i32> = Promise::pending("same");
        let same = promise.done_on(&context::immediate(), |_| {});
        same.fulfill(7);
        assert_eq!(promise.value(), Some(7));
    }

    #[test]
    fn children_are_named_after_their_parent() {
        let promise: Promise<i32> = Promise::pending("root");
        let mapped = promise.map_on(&context::immediate(), |n| Ok(n));
        let paired = promise.and_on(&context::immediate(), 1);
        let swapped = promise.transform_on(&context::immediate(), ());
        assert_eq!(mapped.purpose(), "child of root");
        assert_eq!(paired.purpose(), "child (and) of root");
        assert_eq!(swapped.purpose(), "child (transform) of root");
        promise.fulfill(0);
    }

    #[test]
    fn error_identity_is_preserved_through_the_chain() {
        let original = shared_error(WentWrong("identity"));
        let promise: Promise<i32> = Promise::pending("identity");
        let mapped = promise.map_on(&context::immediate(), |n| Ok(n + 1));
        promise.reject(original.clone());
        let observed = mapped.error().expect("child should be rejected");
        assert!(Arc::ptr_eq(&observed, &original));
    }
}

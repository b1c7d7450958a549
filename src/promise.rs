use crate::{Error, ExecutorHandle, Resolver, Work};
use std::fmt::Debug;
use std::future::{Future, IntoFuture};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

pub(crate) type Handler<R> = Box<dyn FnOnce(Result<R, Error>) + Send>;

/// A settled outcome. Shared so readers only bump a refcount under the lock
/// and clone `R` after releasing it.
type Outcome<R> = Arc<Result<R, Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

/// A value of type `R` that becomes available at most once.
///
/// Cloning a `Promise` is cheap and yields another handle to the same
/// settlement. Every continuation runs on the [`ExecutorHandle`] the promise
/// was created with.
///
/// # Examples
///
/// ```
/// use promise_chain::{ManualExecutor, ExecutorHandle, Promise, Error};
/// use std::sync::Arc;
///
/// let manual = Arc::new(ManualExecutor::new());
/// let executor: ExecutorHandle = manual.clone();
/// let answer = Promise::create(&executor, |resolver| resolver.resolve(6))
///     .then(|v| if v > 0 { Ok(v * 7) } else { Err(Error::msg("negative")) })
///     .error(|_| Ok(0));
/// manual.run_until_idle();
/// assert_eq!(answer.result(), Some(42));
/// ```
pub struct Promise<R> {
    shared: Arc<Shared<R>>,
}

pub(crate) struct Shared<R> {
    executor: ExecutorHandle,
    inner: Mutex<Inner<R>>,
}

struct Inner<R> {
    value: Option<Outcome<R>>,
    handlers: Vec<Handler<R>>,
    wakers: Vec<Waker>,
}

impl<R> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        // Only bookkeeping happens under this lock: values are cloned, dropped
        // and handed to handlers after it is released.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> State {
        match self.lock().value.as_deref() {
            None => State::Pending,
            Some(Ok(_)) => State::Fulfilled,
            Some(Err(_)) => State::Rejected,
        }
    }

    /// Stores `outcome` and hands back everything that was waiting for it, or
    /// `None` if an earlier settlement already won.
    fn transition(&self, outcome: Outcome<R>) -> Option<(Vec<Handler<R>>, Vec<Waker>)> {
        let mut inner = self.lock();
        if inner.value.is_some() {
            drop(inner);
            tracing::debug!("ignored settlement of an already settled promise");
            // The losing outcome is dropped here, outside the lock.
            return None;
        }
        let state = if outcome.is_ok() { State::Fulfilled } else { State::Rejected };
        inner.value = Some(outcome);
        let handlers = std::mem::take(&mut inner.handlers);
        let wakers = std::mem::take(&mut inner.wakers);
        drop(inner);
        tracing::trace!(?state, handlers = handlers.len(), waiters = wakers.len(), "promise settled");
        Some((handlers, wakers))
    }

    /// Rejects without needing `R: Clone`; used when a resolver is dropped.
    pub(crate) fn fail(&self, error: Error) -> bool {
        let Some((handlers, wakers)) = self.transition(Arc::new(Err(error.clone()))) else {
            return false;
        };
        dispatch(handlers, wakers, || Err(error.clone()));
        true
    }
}

impl<R: Clone> Shared<R> {
    /// Settles the promise if it is still pending, then runs the handlers
    /// that were registered before settlement in registration order.
    pub(crate) fn complete(&self, outcome: Result<R, Error>) -> bool {
        let outcome = Arc::new(outcome);
        let Some((handlers, wakers)) = self.transition(outcome.clone()) else {
            return false;
        };
        dispatch(handlers, wakers, || (*outcome).clone());
        true
    }

    pub(crate) fn pipe(&self, handler: Handler<R>) {
        let mut inner = self.lock();
        match inner.value.clone() {
            None => {
                inner.handlers.push(handler);
                tracing::trace!(handlers = inner.handlers.len(), "handler registered");
            }
            Some(outcome) => {
                drop(inner);
                handler((*outcome).clone());
            }
        }
    }

    pub(crate) fn outcome(&self) -> Option<Result<R, Error>> {
        let outcome = self.lock().value.clone();
        outcome.map(|outcome| (*outcome).clone())
    }
}

/// Runs every handler even when one panics, then wakes the waiters. A
/// panicking handler only loses its own outcome.
fn dispatch<R>(handlers: Vec<Handler<R>>, wakers: Vec<Waker>, outcome: impl Fn() -> Result<R, Error>) {
    for handler in handlers {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(outcome()))) {
            tracing::error!(error = %Error::panicked(payload), "promise handler panicked");
        }
    }
    wakers.into_iter().for_each(Waker::wake);
}

impl<R: Clone + Send + Sync + 'static> Promise<R> {
    fn settled(executor: &ExecutorHandle, outcome: Result<R, Error>) -> Self {
        Self::with_value(executor, Some(outcome))
    }

    fn with_value(executor: &ExecutorHandle, value: Option<Result<R, Error>>) -> Self {
        Promise {
            shared: Arc::new(Shared {
                executor: executor.clone(),
                inner: Mutex::new(Inner {
                    value: value.map(Arc::new),
                    handlers: Vec::new(),
                    wakers: Vec::new(),
                }),
            }),
        }
    }

    /// An already fulfilled promise. Nothing is submitted to the executor.
    pub fn resolved(executor: &ExecutorHandle, value: R) -> Self {
        Self::settled(executor, Ok(value))
    }

    /// An already rejected promise. Nothing is submitted to the executor.
    pub fn rejected(executor: &ExecutorHandle, error: Error) -> Self {
        Self::settled(executor, Err(error))
    }

    pub fn from_result(executor: &ExecutorHandle, result: Result<R, Error>) -> Self {
        Self::settled(executor, result)
    }

    /// A pending promise whose `producer` is submitted to the executor right
    /// away. The producer settles the promise through its [`Resolver`].
    ///
    /// A producer that panics rejects the promise with [`Error::Panicked`];
    /// one that drops every resolver clone without settling rejects it with
    /// [`Error::ProducerDropped`].
    pub fn create<F>(executor: &ExecutorHandle, producer: F) -> Self
    where
        F: FnOnce(Resolver<R>) + Send + 'static,
    {
        let promise = Self::with_value(executor, None);
        executor.submit(promise.produce(producer));
        promise
    }

    /// Like [`create`](Self::create), but the producer is only submitted once
    /// `delay` has elapsed. Never blocks the caller.
    pub fn create_delayed<F>(executor: &ExecutorHandle, delay: Duration, producer: F) -> Self
    where
        F: FnOnce(Resolver<R>) + Send + 'static,
    {
        let promise = Self::with_value(executor, None);
        executor.submit_delayed(promise.produce(producer), delay);
        promise
    }

    /// A pending promise settled with whatever `f` returns.
    pub fn from_fn<F>(executor: &ExecutorHandle, f: F) -> Self
    where
        F: FnOnce() -> Result<R, Error> + Send + 'static,
    {
        Self::create(executor, move |resolver| resolver.settle_with(f()))
    }

    pub fn from_fn_delayed<F>(executor: &ExecutorHandle, delay: Duration, f: F) -> Self
    where
        F: FnOnce() -> Result<R, Error> + Send + 'static,
    {
        Self::create_delayed(executor, delay, move |resolver| resolver.settle_with(f()))
    }

    fn produce<F>(&self, producer: F) -> Work
    where
        F: FnOnce(Resolver<R>) + Send + 'static,
    {
        let resolver = Resolver::new(self.shared.clone());
        Box::new(move || run_guarded(resolver, producer))
    }

    /// Registers `handler` for the settlement of this promise.
    ///
    /// While pending the handler is queued behind earlier registrations and
    /// runs on the settling thread. Once settled it runs immediately on the
    /// calling thread. Either way it runs exactly once.
    pub fn pipe<F>(&self, handler: F)
    where
        F: FnOnce(Result<R, Error>) + Send + 'static,
    {
        self.shared.pipe(Box::new(handler))
    }

    pub fn state(&self) -> State {
        self.shared.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// The fulfilled value, if any.
    pub fn result(&self) -> Option<R> {
        self.shared.outcome().and_then(Result::ok)
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<Error> {
        self.shared.outcome().and_then(Result::err)
    }

    pub fn outcome(&self) -> Option<Result<R, Error>> {
        self.shared.outcome()
    }

    pub fn executor(&self) -> &ExecutorHandle {
        &self.shared.executor
    }

    /// A future that completes with this promise's settlement.
    pub fn wait(&self) -> Waiter<R> {
        Waiter {
            shared: self.shared.clone(),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<R>> {
        &self.shared
    }
}

/// Runs `f` with `resolver`, rejecting through a held clone if `f` panics.
pub(crate) fn run_guarded<N, F>(resolver: Resolver<N>, f: F)
where
    N: Clone + Send + Sync + 'static,
    F: FnOnce(Resolver<N>),
{
    let fallback = resolver.clone();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || f(resolver))) {
        fallback.reject(Error::panicked(payload));
    }
}

impl<R> Clone for Promise<R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<R> Debug for Promise<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

/// Future returned by [`Promise::wait`].
pub struct Waiter<R> {
    shared: Arc<Shared<R>>,
}

impl<R: Clone> Future for Waiter<R> {
    type Output = Result<R, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.shared.lock();
        match inner.value.clone() {
            Some(outcome) => {
                drop(inner);
                Poll::Ready((*outcome).clone())
            }
            None => {
                if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<R: Clone + Send + Sync + 'static> IntoFuture for Promise<R> {
    type Output = Result<R, Error>;
    type IntoFuture = Waiter<R>;

    fn into_future(self) -> Self::IntoFuture {
        Waiter {
            shared: self.shared,
        }
    }
}

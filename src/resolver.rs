use crate::promise::Shared;
use crate::{Error, Promise, State};
use std::fmt::Debug;
use std::sync::Arc;

/// What a promise is resolved with: a plain value, or another promise whose
/// settlement is forwarded once it happens.
#[derive(Debug)]
pub enum Resolution<R> {
    Value(R),
    Nested(Promise<R>),
}

impl<R> From<Promise<R>> for Resolution<R> {
    fn from(promise: Promise<R>) -> Self {
        Resolution::Nested(promise)
    }
}

/// The settlement channel of one promise.
///
/// Every method consumes the handle; clone it to settle from more than one
/// place. Only the first settlement takes effect and later ones are ignored.
/// When the last clone is dropped while the promise is still pending, the
/// promise is rejected with [`Error::ProducerDropped`].
///
/// # Examples
///
/// ```
/// use promise_chain::{Error, ExecutorHandle, ManualExecutor, Promise, Resolution};
/// use std::sync::Arc;
///
/// let manual = Arc::new(ManualExecutor::new());
/// let executor: ExecutorHandle = manual.clone();
/// let promise = Promise::create(&executor, |resolver| {
///     let both = resolver.clone().settle(Some(Resolution::Value(1)), Some(Error::msg("x")));
///     assert!(matches!(both, Err(Error::BothValueAndError)));
///     assert!(resolver.settle(Some(Resolution::Value(2)), None).unwrap());
/// });
/// manual.run_until_idle();
/// assert_eq!(promise.result(), Some(2));
/// ```
pub struct Resolver<R> {
    guard: Arc<Guard<R>>,
}

struct Guard<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Drop for Guard<R> {
    fn drop(&mut self) {
        if self.shared.state() == State::Pending {
            tracing::debug!("resolver dropped before settling its promise");
            self.shared.fail(Error::ProducerDropped);
        }
    }
}

impl<R: Clone + Send + Sync + 'static> Resolver<R> {
    pub(crate) fn new(shared: Arc<Shared<R>>) -> Self {
        Self {
            guard: Arc::new(Guard { shared }),
        }
    }

    pub fn resolve(self, value: R) {
        self.accept_with(Resolution::Value(value));
    }

    pub fn reject(self, error: Error) {
        self.accept(Err(error));
    }

    /// Settles with whatever `promise` settles with, once it does.
    pub fn forward(self, promise: Promise<R>) {
        self.accept_with(Resolution::Nested(promise));
    }

    pub fn resolve_with(self, resolution: Resolution<R>) {
        self.accept_with(resolution);
    }

    pub fn settle_with(self, result: Result<R, Error>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(error) => self.reject(error),
        }
    }

    /// Two-slot settlement: exactly one of `value` and `error` must be given.
    ///
    /// Returns `Ok(true)` when the promise was still pending and took the
    /// call, `Ok(false)` when it had already settled and the call was ignored.
    pub fn settle(self, value: Option<Resolution<R>>, error: Option<Error>) -> Result<bool, Error> {
        match (value, error) {
            (Some(_), Some(_)) => Err(Error::BothValueAndError),
            (None, None) => Err(Error::NeitherValueNorError),
            (Some(resolution), None) => Ok(self.accept_with(resolution)),
            (None, Some(error)) => Ok(self.accept(Err(error))),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.guard.shared.state() == State::Pending
    }

    fn accept(self, outcome: Result<R, Error>) -> bool {
        self.guard.shared.complete(outcome)
    }

    fn accept_with(self, resolution: Resolution<R>) -> bool {
        match resolution {
            Resolution::Value(value) => self.accept(Ok(value)),
            Resolution::Nested(promise) => {
                if Arc::ptr_eq(promise.shared(), &self.guard.shared) {
                    return self.accept(Err(Error::SelfResolution));
                }
                if !self.is_pending() {
                    tracing::debug!("ignored forwarding into an already settled promise");
                    return false;
                }
                promise.pipe(move |outcome| {
                    self.accept(outcome);
                });
                true
            }
        }
    }
}

impl<R> Clone for Resolver<R> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
        }
    }
}

impl<R> Debug for Resolver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("state", &self.guard.shared.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, ExecutorHandle, ManualExecutor, Promise, Resolution, Resolver, State};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    fn manual() -> (Arc<ManualExecutor>, ExecutorHandle) {
        let manual = Arc::new(ManualExecutor::new());
        let executor: ExecutorHandle = manual.clone();
        (manual, executor)
    }

    /// A pending promise plus the resolver its producer handed out.
    fn deferred<R: Clone + Send + Sync + 'static>(
        manual: &ManualExecutor,
        executor: &ExecutorHandle,
    ) -> (Promise<R>, Resolver<R>) {
        let slot = Arc::new(Mutex::new(None));
        let stash = slot.clone();
        let promise = Promise::create(executor, move |resolver| {
            *stash.lock().unwrap() = Some(resolver);
        });
        manual.run_until_idle();
        let resolver = slot.lock().unwrap().take().unwrap();
        (promise, resolver)
    }

    #[test]
    fn contract_violations_are_reported_and_leave_the_promise_pending() {
        let (manual, executor) = manual();
        let (promise, resolver) = deferred::<i32>(&manual, &executor);

        let both = resolver.clone().settle(Some(Resolution::Value(1)), Some(Error::msg("e")));
        assert!(matches!(both, Err(Error::BothValueAndError)));
        let neither = resolver.clone().settle(None, None);
        assert!(matches!(neither, Err(Error::NeitherValueNorError)));
        assert!(promise.is_pending());

        assert!(resolver.clone().settle(None, Some(Error::msg("first"))).unwrap());
        assert!(!resolver.settle(Some(Resolution::Value(3)), None).unwrap());
        assert_eq!(promise.state(), State::Rejected);
        assert_eq!(promise.rejection().unwrap().to_string(), "first");
    }

    #[test]
    fn nested_promise_is_forwarded_not_stored() {
        let (manual, executor) = manual();
        let (outer, outer_resolver) = deferred::<&str>(&manual, &executor);
        let (inner, inner_resolver) = deferred::<&str>(&manual, &executor);

        outer_resolver.forward(inner);
        assert!(outer.is_pending());

        inner_resolver.resolve("from inner");
        assert_eq!(outer.result(), Some("from inner"));
    }

    #[test]
    fn forwarding_carries_rejections() {
        let (manual, executor) = manual();
        let (outer, outer_resolver) = deferred::<u8>(&manual, &executor);
        let inner = Promise::rejected(&executor, Error::msg("inner failed"));
        outer_resolver.resolve_with(inner.into());
        assert_eq!(outer.rejection().unwrap().to_string(), "inner failed");
    }

    #[test]
    fn forwarding_through_several_levels() {
        let (manual, executor) = manual();
        let (a, resolve_a) = deferred::<i32>(&manual, &executor);
        let (b, resolve_b) = deferred::<i32>(&manual, &executor);
        let (c, resolve_c) = deferred::<i32>(&manual, &executor);
        resolve_a.forward(b.clone());
        resolve_b.forward(c);
        assert!(a.is_pending() && b.is_pending());
        resolve_c.resolve(11);
        assert_eq!((a.result(), b.result()), (Some(11), Some(11)));
    }

    #[test]
    fn resolving_with_itself_rejects() {
        let (manual, executor) = manual();
        let (promise, resolver) = deferred::<i32>(&manual, &executor);
        resolver.forward(promise.clone());
        assert!(matches!(promise.rejection(), Some(Error::SelfResolution)));
    }

    #[test]
    fn dropping_the_last_clone_rejects() {
        let (manual, executor) = manual();
        let (promise, resolver) = deferred::<i32>(&manual, &executor);
        let clone = resolver.clone();
        drop(resolver);
        assert!(promise.is_pending());
        drop(clone);
        assert!(matches!(promise.rejection(), Some(Error::ProducerDropped)));
    }

    #[test]
    fn concurrent_settlement_has_one_winner() {
        for _ in 0..50 {
            let (manual, executor) = manual();
            let (promise, resolver) = deferred::<usize>(&manual, &executor);
            let barrier = Arc::new(Barrier::new(2));
            let racers: Vec<_> = (0..2)
                .map(|id| {
                    let resolver = resolver.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        resolver.settle(Some(Resolution::Value(id)), None).unwrap()
                    })
                })
                .collect();
            drop(resolver);
            let wins: Vec<bool> = racers.into_iter().map(|t| t.join().unwrap()).collect();
            assert_eq!(wins.iter().filter(|won| **won).count(), 1);
            let winner = wins.iter().position(|won| *won).unwrap();
            assert_eq!(promise.result(), Some(winner));
            assert_eq!(promise.state(), State::Fulfilled);
        }
    }
}

//! Continuations. Every operator here derives a new promise from an existing
//! one through [`Promise::derive`]; only the user callback is submitted to the
//! executor, while the branch that is passed through untouched settles on the
//! thread that settled the source.
use crate::promise::run_guarded;
use crate::{Error, ExecutorHandle, Promise, Resolver};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Schedule {
    Now,
    After(Duration),
}

impl Schedule {
    fn submit(self, executor: &ExecutorHandle, work: crate::Work) {
        match self {
            Schedule::Now => executor.submit(work),
            Schedule::After(delay) => executor.submit_delayed(work, delay),
        }
    }
}

impl<R: Clone + Send + Sync + 'static> Promise<R> {
    /// The pipe-derive primitive: a new pending promise whose producer
    /// registers `piper` on this promise's settlement.
    fn derive<N, P>(&self, piper: P) -> Promise<N>
    where
        N: Clone + Send + Sync + 'static,
        P: FnOnce(Result<R, Error>, Resolver<N>) + Send + 'static,
    {
        let source = self.clone();
        Promise::create(self.executor(), move |resolver| {
            source.pipe(move |outcome| piper(outcome, resolver))
        })
    }

    fn on_success<N, F>(&self, schedule: Schedule, f: F) -> Promise<N>
    where
        N: Clone + Send + Sync + 'static,
        F: FnOnce(R, Resolver<N>) + Send + 'static,
    {
        let executor = self.executor().clone();
        self.derive(move |outcome, resolver| match outcome {
            Err(error) => resolver.reject(error),
            Ok(value) => schedule.submit(
                &executor,
                Box::new(move || run_guarded(resolver, |resolver| f(value, resolver))),
            ),
        })
    }

    fn on_failure<N, P, F>(&self, schedule: Schedule, pass: P, f: F) -> Promise<N>
    where
        N: Clone + Send + Sync + 'static,
        P: FnOnce(R) -> N + Send + 'static,
        F: FnOnce(Error, Resolver<N>) + Send + 'static,
    {
        let executor = self.executor().clone();
        self.derive(move |outcome, resolver| match outcome {
            Ok(value) => resolver.resolve(pass(value)),
            Err(error) => schedule.submit(
                &executor,
                Box::new(move || run_guarded(resolver, |resolver| f(error, resolver))),
            ),
        })
    }

    /// Maps a fulfilled value through `f` on the executor. A rejection skips
    /// `f` and is passed on unchanged.
    pub fn then<N, F>(&self, f: F) -> Promise<N>
    where
        N: Clone + Send + Sync + 'static,
        F: FnOnce(R) -> Result<N, Error> + Send + 'static,
    {
        self.on_success(Schedule::Now, move |value, resolver| {
            resolver.settle_with(f(value))
        })
    }

    /// Runs `f` for its side effect and settles with `()`.
    pub fn then_run<F>(&self, f: F) -> Promise<()>
    where
        F: FnOnce(R) -> Result<(), Error> + Send + 'static,
    {
        self.then(f)
    }

    /// Hands `f` the derived promise's resolver, so it can settle later or
    /// forward another promise.
    pub fn then_resolve<N, F>(&self, f: F) -> Promise<N>
    where
        N: Clone + Send + Sync + 'static,
        F: FnOnce(R, Resolver<N>) + Send + 'static,
    {
        self.on_success(Schedule::Now, f)
    }

    pub fn then_delay<N, F>(&self, delay: Duration, f: F) -> Promise<N>
    where
        N: Clone + Send + Sync + 'static,
        F: FnOnce(R) -> Result<N, Error> + Send + 'static,
    {
        self.on_success(Schedule::After(delay), move |value, resolver| {
            resolver.settle_with(f(value))
        })
    }

    pub fn then_run_delay<F>(&self, delay: Duration, f: F) -> Promise<()>
    where
        F: FnOnce(R) -> Result<(), Error> + Send + 'static,
    {
        self.then_delay(delay, f)
    }

    pub fn then_resolve_delay<N, F>(&self, delay: Duration, f: F) -> Promise<N>
    where
        N: Clone + Send + Sync + 'static,
        F: FnOnce(R, Resolver<N>) + Send + 'static,
    {
        self.on_success(Schedule::After(delay), f)
    }

    /// Recovers from a rejection by running `f` on the executor. A fulfilled
    /// value skips `f` and is passed on unchanged.
    pub fn error<F>(&self, f: F) -> Promise<R>
    where
        F: FnOnce(Error) -> Result<R, Error> + Send + 'static,
    {
        self.on_failure(Schedule::Now, |value| value, move |error, resolver| {
            resolver.settle_with(f(error))
        })
    }

    /// Observes a rejection with `f`. Settles with `()` on either branch
    /// unless `f` itself fails.
    pub fn error_run<F>(&self, f: F) -> Promise<()>
    where
        F: FnOnce(Error) -> Result<(), Error> + Send + 'static,
    {
        self.on_failure(Schedule::Now, |_| (), move |error, resolver| {
            resolver.settle_with(f(error))
        })
    }

    pub fn error_delay<F>(&self, delay: Duration, f: F) -> Promise<R>
    where
        F: FnOnce(Error) -> Result<R, Error> + Send + 'static,
    {
        self.on_failure(Schedule::After(delay), |value| value, move |error, resolver| {
            resolver.settle_with(f(error))
        })
    }
}

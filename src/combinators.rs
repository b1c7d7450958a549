use crate::{Error, ExecutorHandle, Promise};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

impl<R: Clone + Send + Sync + 'static> Promise<R> {
    /// Fulfills with every value, in input order, once all `promises` have
    /// fulfilled. The first rejection rejects the result with
    /// [`Error::MemberRejected`]; the remaining members keep running but are
    /// no longer observed. An empty input fulfills with an empty `Vec`.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{ExecutorHandle, ManualExecutor, Promise};
    /// use std::sync::Arc;
    ///
    /// let manual = Arc::new(ManualExecutor::new());
    /// let executor: ExecutorHandle = manual.clone();
    /// let all = Promise::all(&executor, (1..=3).map(|v| Promise::resolved(&executor, v)));
    /// manual.run_until_idle();
    /// assert_eq!(all.result(), Some(vec![1, 2, 3]));
    /// ```
    pub fn all<I>(executor: &ExecutorHandle, promises: I) -> Promise<Vec<R>>
    where
        I: IntoIterator<Item = Promise<R>>,
    {
        let promises: Vec<Promise<R>> = promises.into_iter().collect();
        Promise::create(executor, move |resolver| {
            if promises.is_empty() {
                return resolver.resolve(Vec::new());
            }
            let remaining = Arc::new(AtomicUsize::new(promises.len()));
            let slots = Arc::new(Mutex::new(vec![None; promises.len()]));
            for (index, promise) in promises.iter().enumerate() {
                let remaining = remaining.clone();
                let slots = slots.clone();
                let resolver = resolver.clone();
                promise.pipe(move |outcome| match outcome {
                    Err(error) => resolver.reject(Error::MemberRejected {
                        index,
                        source: Box::new(error),
                    }),
                    Ok(value) => {
                        let mut filled = slots.lock().unwrap_or_else(PoisonError::into_inner);
                        filled[index] = Some(value);
                        // Decrement while holding the slots so the last member sees them all.
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            let values = filled.drain(..).flatten().collect();
                            drop(filled);
                            resolver.resolve(values);
                        }
                    }
                });
            }
        })
    }

    /// Fulfills with the first member to fulfill, in completion order. When
    /// every member rejects, rejects with [`Error::AllRejected`] carrying the
    /// member errors in the order they arrived.
    pub fn race<I>(executor: &ExecutorHandle, promises: I) -> Promise<R>
    where
        I: IntoIterator<Item = Promise<R>>,
    {
        let promises: Vec<Promise<R>> = promises.into_iter().collect();
        Promise::create(executor, move |resolver| {
            if promises.is_empty() {
                return resolver.reject(Error::AllRejected { errors: Vec::new() });
            }
            let remaining = Arc::new(AtomicUsize::new(promises.len()));
            let errors = Arc::new(Mutex::new(Vec::with_capacity(promises.len())));
            for promise in &promises {
                let remaining = remaining.clone();
                let errors = errors.clone();
                let resolver = resolver.clone();
                promise.pipe(move |outcome| match outcome {
                    Ok(value) => resolver.resolve(value),
                    Err(error) => {
                        let mut seen = errors.lock().unwrap_or_else(PoisonError::into_inner);
                        seen.push(error);
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            let errors = std::mem::take(&mut *seen);
                            drop(seen);
                            resolver.reject(Error::AllRejected { errors });
                        }
                    }
                });
            }
        })
    }
}

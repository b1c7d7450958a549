//! A thread-pool backed [`Executor`] for hosts that don't bring their own.
//!
use crate::{Error, Executor, ExecutorHandle, PoolConfig, Work};
use futures::executor::ThreadPool;
use std::sync::Arc;
use std::time::Duration;

/// Runs work on a `futures` thread pool. Delays are awaited with
/// `smol::Timer`, so a delayed submission occupies no worker while it waits.
///
/// # Examples
///
/// ```
/// use promise_chain::{PoolConfig, PoolExecutor, Promise};
/// use futures::executor::block_on;
///
/// let executor = PoolExecutor::new(&PoolConfig::default()).unwrap().handle();
/// let doubled = Promise::from_fn(&executor, || Ok(4)).then(|v| Ok(v * 2));
/// assert_eq!(block_on(doubled.wait()).unwrap(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct PoolExecutor {
    pool: ThreadPool,
}

impl PoolExecutor {
    pub fn new(config: &PoolConfig) -> Result<Self, Error> {
        config.validate()?;
        let pool = ThreadPool::builder()
            .pool_size(config.pool_size)
            .name_prefix(config.name_prefix.clone())
            .create()?;
        tracing::debug!(
            pool_size = config.pool_size,
            name_prefix = %config.name_prefix,
            "started promise executor pool"
        );
        Ok(Self { pool })
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::new(&PoolConfig::from_env()?)
    }

    pub fn handle(self) -> ExecutorHandle {
        Arc::new(self)
    }
}

impl Executor for PoolExecutor {
    fn submit(&self, work: Work) {
        self.pool.spawn_ok(async move { work() });
    }

    fn submit_delayed(&self, work: Work, delay: Duration) {
        self.pool.spawn_ok(async move {
            smol::Timer::after(delay).await;
            work()
        });
    }
}

use crate::Error;
use serde::{Deserialize, Serialize};
use std::thread;

pub const POOL_SIZE_VAR: &str = "PROMISE_POOL_SIZE";
pub const THREAD_PREFIX_VAR: &str = "PROMISE_THREAD_PREFIX";

/// Settings for [`crate::PoolExecutor`].
///
/// Missing fields fall back to [`PoolConfig::default`] when deserialized, so
/// a host can embed this in its own configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub pool_size: usize,
    pub name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: thread::available_parallelism().map_or(1, |n| n.get()),
            name_prefix: "promise-worker-".into(),
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `PROMISE_POOL_SIZE` and `PROMISE_THREAD_PREFIX`.
    pub fn from_env() -> Result<Self, Error> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_name_prefix(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = name_prefix.into();
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".into()));
        }
        Ok(())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        if let Some(raw) = lookup(POOL_SIZE_VAR) {
            self.pool_size = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{POOL_SIZE_VAR} is not a thread count: {raw:?}"))
            })?;
        }
        if let Some(prefix) = lookup(THREAD_PREFIX_VAR) {
            self.name_prefix = prefix;
        }
        self.validate()?;
        Ok(self)
    }
}

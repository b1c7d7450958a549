//! Chainable promises over a host-supplied executor.
//!
//! A [`Promise`] holds a value that becomes available at most once. It is
//! created pre-settled ([`Promise::resolved`], [`Promise::rejected`]) or
//! pending, with a producer that receives a [`Resolver`] and runs on the
//! [`Executor`] the caller passes in. Continuations ([`Promise::then`],
//! [`Promise::error`] and their delayed and void variants) and combinators
//! ([`Promise::all`], [`Promise::race`]) all derive new promises from the
//! settlement of existing ones.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{Error, PoolConfig, PoolExecutor, Promise};
//! use futures::executor::block_on;
//!
//! let executor = PoolExecutor::new(&PoolConfig::default().with_pool_size(2))
//!     .unwrap()
//!     .handle();
//! let parsed = Promise::from_fn(&executor, || Ok("17"))
//!     .then(|text| text.parse::<i32>().map_err(Error::other))
//!     .error(|_| Ok(0));
//! let total = Promise::all(&executor, vec![parsed, Promise::resolved(&executor, 25)])
//!     .then(|values| Ok(values.iter().sum::<i32>()));
//! assert_eq!(block_on(total.wait()).unwrap(), 42);
//! ```

mod chain;
mod combinators;
mod config;
mod error;
mod executor;
mod pool;
mod promise;
mod resolver;

pub use config::PoolConfig;
pub use error::Error;
pub use executor::{Executor, ExecutorHandle, ManualExecutor, Work};
pub use pool::PoolExecutor;
pub use promise::{Promise, State, Waiter};
pub use resolver::{Resolution, Resolver};

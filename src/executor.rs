//! The executor port: where producers and continuations actually run.
//!
//! Promises never spawn threads themselves. Every promise carries an
//! [`ExecutorHandle`] and submits work to it, so the host decides how work is
//! scheduled. [`ManualExecutor`] is a deterministic implementation for tests
//! and single-threaded hosts; see [`crate::PoolExecutor`] for a thread pool.
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A unit of work submitted to an executor.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to the executor a promise schedules its work on.
pub type ExecutorHandle = Arc<dyn Executor>;

pub trait Executor: Send + Sync {
    /// Schedules `work` to run asynchronously. Must not block and must not run
    /// `work` on the calling thread before returning.
    fn submit(&self, work: Work);

    /// Like [`submit`](Executor::submit), but `work` must not start before
    /// `delay` has elapsed.
    fn submit_delayed(&self, work: Work, delay: Duration);
}

/// An executor that only runs work when told to.
///
/// Time is virtual: delayed work becomes runnable once [`advance`] has moved
/// the clock past its deadline.
///
/// # Examples
///
/// ```
/// use promise_chain::{ExecutorHandle, ManualExecutor, Promise, State};
/// use std::sync::Arc;
///
/// let manual = Arc::new(ManualExecutor::new());
/// let executor: ExecutorHandle = manual.clone();
/// let promise = Promise::from_fn(&executor, || Ok(21)).then(|v| Ok(v * 2));
/// assert_eq!(promise.state(), State::Pending);
/// manual.run_until_idle();
/// assert_eq!(promise.result(), Some(42));
/// ```
///
/// [`advance`]: ManualExecutor::advance
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<Queue>,
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<Work>,
    delayed: Vec<Delayed>,
    now: Duration,
    seq: u64,
}

struct Delayed {
    due: Duration,
    seq: u64,
    work: Work,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one ready unit of work. Returns `false` when nothing was ready.
    pub fn run_next(&self) -> bool {
        // The lock is released before running so the work can submit more.
        let next = self.lock().ready.pop_front();
        match next {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }

    /// Runs ready work, including work submitted while running, until the
    /// ready queue is empty. Returns how many units ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Moves the virtual clock forward and makes every delayed unit whose
    /// deadline has passed ready, earliest deadline first. Returns how many
    /// units became ready.
    pub fn advance(&self, by: Duration) -> usize {
        let mut queue = self.lock();
        queue.now = queue.now.saturating_add(by);
        let now = queue.now;
        let (mut due, later): (Vec<_>, Vec<_>) =
            queue.delayed.drain(..).partition(|delayed| delayed.due <= now);
        queue.delayed = later;
        due.sort_by_key(|delayed| (delayed.due, delayed.seq));
        let promoted = due.len();
        queue.ready.extend(due.into_iter().map(|delayed| delayed.work));
        promoted
    }

    /// Number of units ready to run.
    pub fn pending(&self) -> usize {
        self.lock().ready.len()
    }

    /// Number of delayed units still waiting for the clock.
    pub fn scheduled(&self) -> usize {
        self.lock().delayed.len()
    }

    /// Current reading of the virtual clock.
    pub fn now(&self) -> Duration {
        self.lock().now
    }
}

impl Executor for ManualExecutor {
    fn submit(&self, work: Work) {
        self.lock().ready.push_back(work);
    }

    fn submit_delayed(&self, work: Work, delay: Duration) {
        if delay.is_zero() {
            return self.submit(work);
        }
        let mut queue = self.lock();
        let due = queue.now.saturating_add(delay);
        let seq = queue.seq;
        queue.seq += 1;
        queue.delayed.push(Delayed { due, seq, work });
    }
}

impl Debug for ManualExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.lock();
        f.debug_struct("ManualExecutor")
            .field("ready", &queue.ready.len())
            .field("delayed", &queue.delayed.len())
            .field("now", &queue.now)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Executor, ManualExecutor};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> super::Work) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| -> super::Work {
            let sink = sink.clone();
            Box::new(move || sink.lock().unwrap().push(name))
        };
        (log, make)
    }

    #[test]
    fn submit_does_not_run_inline() {
        let executor = ManualExecutor::new();
        let (log, work) = recorder();
        executor.submit(work("a"));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(executor.pending(), 1);
        assert_eq!(executor.run_until_idle(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn runs_in_submission_order() {
        let executor = ManualExecutor::new();
        let (log, work) = recorder();
        executor.submit(work("a"));
        executor.submit(work("b"));
        executor.submit(work("c"));
        executor.run_until_idle();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn work_submitted_while_running_also_runs() {
        let executor = Arc::new(ManualExecutor::new());
        let (log, work) = recorder();
        let inner = executor.clone();
        let nested = work("nested");
        executor.submit(Box::new(move || inner.submit(nested)));
        assert_eq!(executor.run_until_idle(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["nested"]);
    }

    #[test]
    fn delayed_work_waits_for_the_clock() {
        let executor = ManualExecutor::new();
        let (log, work) = recorder();
        executor.submit_delayed(work("late"), Duration::from_millis(50));
        executor.submit_delayed(work("early"), Duration::from_millis(10));
        assert_eq!(executor.run_until_idle(), 0);
        assert_eq!(executor.scheduled(), 2);

        assert_eq!(executor.advance(Duration::from_millis(10)), 1);
        executor.run_until_idle();
        assert_eq!(*log.lock().unwrap(), vec!["early"]);

        assert_eq!(executor.advance(Duration::from_millis(39)), 0);
        assert_eq!(executor.advance(Duration::from_millis(1)), 1);
        executor.run_until_idle();
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
        assert_eq!(executor.now(), Duration::from_millis(50));
    }

    #[test]
    fn equal_deadlines_keep_submission_order() {
        let executor = ManualExecutor::new();
        let (log, work) = recorder();
        executor.submit_delayed(work("first"), Duration::from_millis(5));
        executor.submit_delayed(work("second"), Duration::from_millis(5));
        executor.advance(Duration::from_millis(5));
        executor.run_until_idle();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn zero_delay_is_immediately_ready() {
        let executor = ManualExecutor::new();
        let (log, work) = recorder();
        executor.submit_delayed(work("now"), Duration::ZERO);
        assert_eq!(executor.pending(), 1);
        executor.run_until_idle();
        assert_eq!(*log.lock().unwrap(), vec!["now"]);
    }

    #[test]
    fn huge_delays_saturate_instead_of_overflowing() {
        let executor = ManualExecutor::new();
        let (log, work) = recorder();
        executor.advance(Duration::from_millis(1));
        executor.submit_delayed(work("far"), Duration::MAX);
        assert_eq!(executor.scheduled(), 1);
        assert_eq!(executor.advance(Duration::MAX), 1);
        assert_eq!(executor.now(), Duration::MAX);
        executor.run_until_idle();
        assert_eq!(*log.lock().unwrap(), vec!["far"]);
    }
}

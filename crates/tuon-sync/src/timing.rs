//! Debounce and throttle primitives on the tokio timer.
//!
//! Both hand work to `tokio::spawn` and keep the `JoinHandle` so pending
//! work can be cancelled when the document context changes.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runs only the last scheduled future, once `delay` has passed without a
/// newer one being scheduled.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule `work`, replacing whatever was scheduled before.
    pub fn schedule<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        if let Some(previous) = self.slot().replace(handle) {
            previous.abort();
        }
    }

    /// Drop scheduled work. Returns whether something was still waiting.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// How a throttled call was served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Ran immediately (leading edge).
    Leading,
    /// Scheduled to run when the interval ends (trailing edge).
    Trailing(Duration),
    /// Folded into an already scheduled trailing run.
    Merged,
}

struct ThrottleState {
    last_fired: Option<Instant>,
    trailing: Option<JoinHandle<()>>,
}

/// Leading + trailing throttle: at most one run per `interval`, the first
/// call of a burst runs at once and the rest collapse into one trailing run.
#[derive(Clone)]
pub struct Throttle {
    interval: Duration,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(ThrottleState {
                last_fired: None,
                trailing: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` now, later, or not at all depending on the interval.
    ///
    /// `work` should read whatever it acts on when it runs, since a merged
    /// call never runs its own future.
    pub fn call<F>(&self, work: F) -> Slot
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let mut state = self.lock();

        if state.trailing.as_ref().is_some_and(|h| !h.is_finished()) {
            return Slot::Merged;
        }

        let last_fired = state.last_fired;
        let wait = match last_fired {
            Some(last) if now.duration_since(last) < self.interval => {
                self.interval - now.duration_since(last)
            }
            _ => {
                state.last_fired = Some(now);
                drop(state);
                tokio::spawn(work);
                return Slot::Leading;
            }
        };

        let shared = self.state.clone();
        state.trailing = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                state.last_fired = Some(Instant::now());
                state.trailing = None;
            }
            work.await;
        }));
        Slot::Trailing(wait)
    }

    /// Abort a scheduled trailing run. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        match self.lock().trailing.take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn has_trailing(&self) -> bool {
        self.lock()
            .trailing
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

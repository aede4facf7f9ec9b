//! Tailing debouncer
//!
//! Coalesces bursts of change signals into a single callback. Every signal
//! pushes the deadline back by `delay`; the callback fires once the burst has
//! been quiet for `delay`, or once `max_wait` has passed since the first
//! signal of the burst, whichever comes first. One callback per burst.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

type Callback = Box<dyn Fn() + Send + Sync>;

struct Burst {
    first: Instant,
    deadline: Instant,
}

struct Inner {
    delay: Duration,
    max_wait: Option<Duration>,
    burst: Mutex<Option<Burst>>,
    callback: Callback,
}

/// Debouncer whose timer runs on the ambient tokio runtime
#[derive(Clone)]
pub struct TailingDebouncer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TailingDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailingDebouncer")
            .field("delay", &self.inner.delay)
            .field("max_wait", &self.inner.max_wait)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl TailingDebouncer {
    pub fn new<F>(delay: Duration, max_wait: Option<Duration>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                delay,
                max_wait,
                burst: Mutex::new(None),
                callback: Box::new(callback),
            }),
        }
    }

    /// Signal a change
    pub fn debounce(&self) {
        let now = Instant::now();
        let mut burst = self
            .inner
            .burst
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(ref mut current) = *burst {
            current.deadline = now + self.inner.delay;
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            drop(burst);
            tracing::debug!("debounce outside of a runtime, firing immediately");
            (self.inner.callback)();
            return;
        };

        *burst = Some(Burst {
            first: now,
            deadline: now + self.inner.delay,
        });
        drop(burst);

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            loop {
                let wake_at = {
                    let burst = inner.burst.lock().unwrap_or_else(PoisonError::into_inner);
                    let Some(ref current) = *burst else {
                        return;
                    };
                    match inner.max_wait {
                        Some(max_wait) => current.deadline.min(current.first + max_wait),
                        None => current.deadline,
                    }
                };

                tokio::time::sleep_until(wake_at).await;

                let due = {
                    let mut burst = inner.burst.lock().unwrap_or_else(PoisonError::into_inner);
                    let now = Instant::now();
                    let due = burst.as_ref().is_some_and(|current| {
                        now >= current.deadline
                            || inner
                                .max_wait
                                .is_some_and(|max_wait| now >= current.first + max_wait)
                    });
                    if due {
                        *burst = None;
                    }
                    due
                };

                if due {
                    (inner.callback)();
                    return;
                }
            }
        });
    }

    /// Whether a burst is waiting to be delivered
    pub fn is_pending(&self) -> bool {
        self.inner
            .burst
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

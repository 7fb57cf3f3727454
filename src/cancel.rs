use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cooperative cancellation signal shared between an upload and its caller.
///
/// Clones observe the same signal. Cancelling wakes any thread sleeping in
/// [`CancellationToken::sleep`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns `true` if the token is cancelled when the sleep ends.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self.inner.wake.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

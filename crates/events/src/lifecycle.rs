//! Background task lifecycle helpers shared by recorders, monitors and voice tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Interval used when polling a thread for completion.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Cooperative cancellation signal checked by long-running loops.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    cancelled: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Wait up to `timeout` for `handle` to finish, then join it.
///
/// Returns `false` when the thread did not finish in time; it is then detached
/// so the caller never deadlocks on a stuck device or engine.
pub fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, name: &str) -> bool {
    let start = Instant::now();
    while !handle.is_finished() && start.elapsed() < timeout {
        std::thread::sleep(JOIN_POLL_INTERVAL);
    }

    if !handle.is_finished() {
        tracing::error!(task = name, ?timeout, "timed out waiting for thread; detaching");
        return false;
    }

    if let Err(e) = handle.join() {
        tracing::error!(task = name, "thread panicked: {:?}", e);
    } else {
        tracing::debug!(task = name, elapsed = ?start.elapsed(), "thread joined");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_token_is_shared() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_join_finished_thread() {
        let handle = std::thread::spawn(|| {});
        assert!(join_with_timeout(handle, Duration::from_secs(1), "noop"));
    }

    #[test]
    fn test_join_times_out_on_stuck_thread() {
        let token = StopToken::new();
        let inner = token.clone();
        let handle = std::thread::spawn(move || {
            while !inner.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        assert!(!join_with_timeout(handle, Duration::from_millis(50), "stuck"));
        token.cancel();
    }
}

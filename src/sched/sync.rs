use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::variants::Chromosome;
use crate::TriError;

/// Manual-reset binary event shared between the scheduler and workers
#[derive(Debug, Default)]
pub struct Event {
    state: Mutex<bool>,
    signal: Condvar,
}

impl Event {
    /// Create an unset event
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event, waking all waiters
    pub fn set(&self) {
        *self.lock() = true;
        self.signal.notify_all();
    }

    /// Reset the event
    pub fn clear(&self) {
        *self.lock() = false;
    }

    /// Whether the event is currently set
    pub fn is_set(&self) -> bool {
        *self.lock()
    }

    /// Block until the event is set or the timeout elapses; returns the
    /// state observed on wake-up
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |set| !*set)
            .expect("an event operation panicked while holding the lock");
        *guard
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        self.state
            .lock()
            .expect("an event operation panicked while holding the lock")
    }
}

/// Synchronisation state shared by the scheduler and its workers.
///
/// `can_run` is the admission interlock: a freshly admitted worker
/// holds it clear until its first allocation has either claimed the
/// rest of the file or completed, so two workers never size their
/// blocks against the same unallocated byte count. `should_exit`
/// requests cooperative shutdown; the map-reduce driver polls it
/// between blocks.
#[derive(Debug, Default)]
pub struct TaskSync {
    /// The next task may be admitted
    pub can_run: Event,
    /// Teardown has begun; workers should stop at their next checkpoint
    pub should_exit: Event,
}

impl TaskSync {
    /// Create a sync collection with both events unset
    pub fn new() -> Self {
        Self::default()
    }
}

/// A worker-local error on its way to the scheduler
#[derive(Debug)]
pub struct WorkerFailure {
    /// Chromosome the failing worker was responsible for
    pub chromosome: Chromosome,
    /// The error raised inside the worker
    pub error: TriError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn events_are_manual_reset() {
        let event = Event::new();
        assert!(!event.is_set());
        event.set();
        assert!(event.is_set());
        assert!(event.is_set(), "set events stay set until cleared");
        event.clear();
        assert!(!event.is_set());
    }

    #[test]
    fn wait_timeout_observes_a_set_from_another_thread() {
        let event = Arc::new(Event::new());
        let setter = Arc::clone(&event);
        let handle = thread::spawn(move || setter.set());
        assert!(event.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires_when_unset() {
        let event = Event::new();
        assert!(!event.wait_timeout(Duration::from_millis(10)));
    }
}

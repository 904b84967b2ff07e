use crate::core::signal::{Signal, Subscription};
use parking_lot::{Condvar, Mutex};

/// Waitable signal with subscribable callbacks
///
/// `wait` blocks until the next `notify` issued after the call. Notifications
/// fired while nobody waits are not remembered; use [`Condition::generation`]
/// together with [`Condition::wait_since`] when a predicate has to be checked
/// before blocking.
pub struct Condition {
    generation: Mutex<u64>,
    cvar: Condvar,
    signal: Signal<()>,
}

impl Condition {
    pub fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            cvar: Condvar::new(),
            signal: Signal::new(),
        }
    }

    /// Wake all waiters and invoke all subscribed callbacks
    pub fn notify(&self) {
        {
            let mut generation = self.generation.lock();
            *generation = generation.wrapping_add(1);
        }
        self.cvar.notify_all();
        self.signal.emit(&());
    }

    /// Block until the next notification
    pub fn wait(&self) {
        let mut generation = self.generation.lock();
        let entered = *generation;
        while *generation == entered {
            self.cvar.wait(&mut generation);
        }
    }

    /// Current notification counter
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Block until at least one notification happened after `seen` was read
    pub fn wait_since(&self, seen: u64) {
        let mut generation = self.generation.lock();
        while *generation == seen {
            self.cvar.wait(&mut generation);
        }
    }

    /// Subscribe a callback fired on every notification
    pub fn subscribe_signal<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.signal.connect(move |_| callback())
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("generation", &self.generation())
            .finish()
    }
}

use super::condition::Condition;
use crate::core::shared::SharedSequence;
use crate::core::signal::Subscription;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct SetInner {
    aggregate: Arc<Condition>,
    fired: Mutex<bool>,
    resettable: AtomicBool,
    auto_reset: AtomicBool,
    children: SharedSequence<(Arc<Condition>, Subscription)>,
}

impl SetInner {
    fn fire(&self) {
        // latch first, then wake: a waiter that missed the latch sees the new generation
        if self.resettable.load(Ordering::Acquire) {
            *self.fired.lock() = true;
        }
        self.aggregate.notify();
    }
}

impl Drop for SetInner {
    fn drop(&mut self) {
        for (_, sub) in self.children.read_ticket().iter() {
            sub.cancel();
        }
    }
}

/// Waits on any of several conditions at once
///
/// In the default mode `wait` returns on the next child notification after the
/// call. In resettable mode every child notification sets a latch; `wait`
/// returns immediately while the latch is set, and `reset` clears it. With
/// auto-reset the latch is cleared by each successful `wait`.
pub struct ConditionSet {
    inner: Arc<SetInner>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SetInner {
                aggregate: Arc::new(Condition::new()),
                fired: Mutex::new(false),
                resettable: AtomicBool::new(false),
                auto_reset: AtomicBool::new(false),
                children: SharedSequence::default(),
            }),
        }
    }

    /// Create a set in resettable mode
    pub fn resettable(auto_reset: bool) -> Self {
        let set = Self::new();
        set.set_resettable(true, auto_reset);
        set
    }

    /// Switch latch behavior on or off. Switching modes clears the latch.
    pub fn set_resettable(&self, resettable: bool, auto_reset: bool) {
        let mut fired = self.inner.fired.lock();
        if self.inner.resettable.swap(resettable, Ordering::AcqRel) != resettable {
            *fired = false;
        }
        self.inner.auto_reset.store(auto_reset, Ordering::Release);
    }

    pub fn is_resettable(&self) -> bool {
        self.inner.resettable.load(Ordering::Acquire)
    }

    pub fn is_auto_reset(&self) -> bool {
        self.inner.auto_reset.load(Ordering::Acquire)
    }

    /// Add a child condition. Adding the same condition twice is a no-op.
    pub fn add(&self, condition: Arc<Condition>) {
        let mut children = self.inner.children.write_ticket();
        if children.iter().any(|(c, _)| Arc::ptr_eq(c, &condition)) {
            children.suppress_unlock_condition();
            return;
        }

        let weak: Weak<SetInner> = Arc::downgrade(&self.inner);
        let sub = condition.subscribe_signal(move || {
            if let Some(inner) = weak.upgrade() {
                inner.fire();
            }
        });
        children.push((condition, sub));
    }

    /// Remove a child condition. Returns false if it was not part of the set.
    pub fn remove(&self, condition: &Arc<Condition>) -> bool {
        match self
            .inner
            .children
            .remove_first(|(c, _)| Arc::ptr_eq(c, condition))
        {
            Some((_, sub)) => {
                sub.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.children.is_empty()
    }

    /// Block until a child fires (or, in resettable mode, while the latch is unset)
    pub fn wait(&self) {
        if !self.is_resettable() {
            self.inner.aggregate.wait();
            return;
        }

        loop {
            let seen = self.inner.aggregate.generation();
            {
                let mut fired = self.inner.fired.lock();
                if *fired {
                    if self.is_auto_reset() {
                        *fired = false;
                    }
                    return;
                }
            }
            self.inner.aggregate.wait_since(seen);
        }
    }

    /// Fire the aggregate as if a child had fired
    pub fn notify(&self) {
        self.inner.fire();
    }

    /// Clear the latch
    pub fn reset(&self) {
        *self.inner.fired.lock() = false;
    }

    /// Whether the latch is currently set
    pub fn is_fired(&self) -> bool {
        *self.inner.fired.lock()
    }

    /// The aggregate condition; add it to another set to nest sets
    pub fn condition(&self) -> Arc<Condition> {
        Arc::clone(&self.inner.aggregate)
    }
}

impl Default for ConditionSet {
    fn default() -> Self {
        Self::new()
    }
}

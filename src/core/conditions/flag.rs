use super::condition::Condition;
use crate::core::shared::SharedValue;
use std::sync::Arc;

/// Value cell whose changes can be waited on
pub struct Flag<T> {
    value: SharedValue<T>,
}

impl<T: Clone> Flag<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: SharedValue::new(initial),
        }
    }

    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Replace the value and fire the condition
    pub fn set(&self, value: T) {
        self.set_with(value, false);
    }

    /// Replace the value, optionally without firing the condition
    pub fn set_with(&self, value: T, suppress_notification: bool) {
        let mut w = self.value.write_ticket();
        *w = value;
        if suppress_notification {
            w.suppress_unlock_condition();
        }
    }

    pub fn condition(&self) -> Arc<Condition> {
        self.value.change_condition()
    }

    /// Block until the next change
    pub fn wait(&self) {
        self.value.change_condition().wait();
    }

    /// Block until `pred` holds for the current value
    pub fn wait_until<P>(&self, pred: P)
    where
        P: Fn(&T) -> bool,
    {
        let condition = self.value.change_condition();
        loop {
            let seen = condition.generation();
            let holds = {
                let current = self.value.read_ticket();
                pred(&*current)
            };
            if holds {
                return;
            }
            condition.wait_since(seen);
        }
    }
}

impl Flag<bool> {
    /// Shorthand for `wait_until(|v| *v == value)`
    pub fn wait_for(&self, value: bool) {
        self.wait_until(|v| *v == value);
    }
}

impl<T: Clone + Default> Default for Flag<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Flag<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Flag").field(&self.get()).finish()
    }
}

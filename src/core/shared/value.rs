use crate::core::conditions::Condition;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Reader/writer protected value with a change condition
///
/// All access goes through tickets. Any number of [`ReadTicket`]s may coexist,
/// a [`WriteTicket`] is exclusive. Dropping a write ticket releases the lock and
/// then fires the change condition, unless the ticket was told to stay quiet.
pub struct SharedValue<T> {
    data: RwLock<T>,
    changed: Arc<Condition>,
}

impl<T> SharedValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            data: RwLock::new(value),
            changed: Arc::new(Condition::new()),
        }
    }

    /// Shared access; blocks while a write ticket exists
    pub fn read_ticket(&self) -> ReadTicket<'_, T> {
        ReadTicket {
            guard: self.data.read(),
        }
    }

    /// Exclusive access; blocks while any other ticket exists
    pub fn write_ticket(&self) -> WriteTicket<'_, T> {
        WriteTicket {
            guard: Some(self.data.write()),
            changed: &self.changed,
            suppress: false,
        }
    }

    /// Condition fired whenever a write ticket is released
    pub fn change_condition(&self) -> Arc<Condition> {
        Arc::clone(&self.changed)
    }

    /// Replace the value in one write
    pub fn set(&self, value: T) {
        *self.write_ticket() = value;
    }

    /// Clone out the current value
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.read_ticket().clone()
    }
}

impl<T: Default> Default for SharedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SharedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedValue")
            .field("data", &*self.data.read())
            .finish()
    }
}

/// Shared lock on a [`SharedValue`]
pub struct ReadTicket<'a, T> {
    guard: RwLockReadGuard<'a, T>,
}

impl<T> Deref for ReadTicket<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

/// Exclusive lock on a [`SharedValue`]
pub struct WriteTicket<'a, T> {
    guard: Option<RwLockWriteGuard<'a, T>>,
    changed: &'a Condition,
    suppress: bool,
}

impl<T> WriteTicket<'_, T> {
    /// Do not fire the change condition on release.
    ///
    /// Used when the write turned out to be a no-op.
    pub fn suppress_unlock_condition(&mut self) {
        self.suppress = true;
    }
}

impl<T> Deref for WriteTicket<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.guard {
            Some(guard) => guard,
            None => unreachable!("write ticket used after release"),
        }
    }
}

impl<T> DerefMut for WriteTicket<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.guard {
            Some(guard) => guard,
            None => unreachable!("write ticket used after release"),
        }
    }
}

impl<T> Drop for WriteTicket<'_, T> {
    fn drop(&mut self) {
        // unlock before notifying so woken readers can take the lock
        drop(self.guard.take());
        if !self.suppress {
            self.changed.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_write_ticket_fires_change_condition() {
        let shared = SharedValue::new(1);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = shared.change_condition().subscribe_signal(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        {
            let mut w = shared.write_ticket();
            *w = 5;
        }
        assert_eq!(*shared.read_ticket(), 5);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suppressed_write_is_silent() {
        let shared = SharedValue::new(String::from("a"));
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = shared.change_condition().subscribe_signal(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        {
            let mut w = shared.write_ticket();
            w.suppress_unlock_condition();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_readers_coexist() {
        let shared = SharedValue::new(vec![1, 2, 3]);
        let r1 = shared.read_ticket();
        let r2 = shared.read_ticket();
        assert_eq!(r1.len() + r2.len(), 6);
    }

    #[test]
    fn test_ticket_released_on_early_return() {
        fn bail(shared: &SharedValue<i32>) -> Result<(), ()> {
            let mut w = shared.write_ticket();
            *w += 1;
            if *w > 0 {
                return Err(());
            }
            Ok(())
        }

        let shared = SharedValue::new(0);
        assert!(bail(&shared).is_err());
        // would deadlock if the ticket leaked
        assert_eq!(shared.get(), 1);
    }
}

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Slot<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct SignalInner<A: ?Sized> {
    slots: RwLock<Vec<(u64, Slot<A>)>>,
    next_id: AtomicU64,
}

/// Observer list with cancellable subscriptions
///
/// Slots are invoked on the emitting thread. `emit` works on a snapshot of the
/// slot list, so slots may subscribe or cancel from inside a callback.
pub struct Signal<A: ?Sized> {
    inner: Arc<SignalInner<A>>,
}

impl<A: ?Sized + 'static> Signal<A> {
    /// Create a signal without any slots
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                slots: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe a slot; it stays connected until the returned handle is cancelled
    pub fn connect<F>(&self, slot: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.slots.write().push((id, Arc::new(slot)));

        let weak: Weak<SignalInner<A>> = Arc::downgrade(&self.inner);
        Subscription {
            active: Arc::new(AtomicBool::new(true)),
            remover: Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.slots.write().retain(|(slot_id, _)| *slot_id != id);
                }
            }),
        }
    }

    /// Invoke every connected slot with `args`
    pub fn emit(&self, args: &A) {
        let snapshot: Vec<Slot<A>> = self
            .inner
            .slots
            .read()
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();

        for slot in snapshot {
            slot(args);
        }
    }

    /// Number of connected slots
    pub fn slot_count(&self) -> usize {
        self.inner.slots.read().len()
    }

    /// Drop every slot
    pub fn disconnect_all(&self) {
        self.inner.slots.write().clear();
    }
}

impl<A: ?Sized + 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one slot connected to a [`Signal`]
///
/// Dropping the handle keeps the slot connected; call [`Subscription::cancel`].
#[derive(Clone)]
pub struct Subscription {
    active: Arc<AtomicBool>,
    remover: Arc<dyn Fn() + Send + Sync>,
}

impl Subscription {
    /// Disconnect the slot. Calling this more than once is harmless.
    pub fn cancel(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            (self.remover)();
        }
    }

    /// Whether the slot is still connected through this handle
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_all_slots() {
        let signal: Signal<usize> = Signal::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = Arc::clone(&total);
        let _a = signal.connect(move |v| {
            t1.fetch_add(*v, Ordering::SeqCst);
        });
        let t2 = Arc::clone(&total);
        let _b = signal.connect(move |v| {
            t2.fetch_add(*v * 10, Ordering::SeqCst);
        });

        signal.emit(&2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn test_cancelled_slot_is_not_called() {
        let signal: Signal<()> = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(&());
        sub.cancel();
        sub.cancel();
        signal.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
        assert_eq!(signal.slot_count(), 0);
    }

    #[test]
    fn test_slot_may_cancel_itself_during_emit() {
        let signal: Signal<()> = Signal::new();
        let holder: Arc<parking_lot::Mutex<Option<Subscription>>> = Arc::new(parking_lot::Mutex::new(None));
        let h = Arc::clone(&holder);
        let sub = signal.connect(move |_| {
            if let Some(s) = h.lock().as_ref() {
                s.cancel();
            }
        });
        *holder.lock() = Some(sub);

        signal.emit(&());
        assert_eq!(signal.slot_count(), 0);
    }
}

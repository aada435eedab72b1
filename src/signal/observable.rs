//! Observable value cells
//!
//! An [`ObservableValue`] stores a value and notifies its subscriptions when
//! the value is written. The backing value is updated before any listener
//! runs, so a listener reading the cell sees the new value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::listener::{ListenerList, Subscription};
use crate::janitor::ListenerGroup;

struct ObservableInner<T> {
    value: RefCell<T>,
    listeners: ListenerList<T>,
    locked: Cell<bool>,
    check_if_same: Cell<bool>,
}

/// Shared value cell with change notification.
///
/// Cloning yields another handle to the same cell.
pub struct ObservableValue<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for ObservableValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableValue")
            .field("value", &self.inner.value.borrow())
            .field("locked", &self.inner.locked.get())
            .field("check_if_same", &self.inner.check_if_same.get())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for ObservableValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> ObservableValue<T> {
    /// New cell that skips notification when the written value equals the
    /// current one.
    pub fn new(value: T) -> Self {
        Self::with_check_if_same(value, true)
    }

    pub fn with_check_if_same(value: T, check_if_same: bool) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                listeners: ListenerList::new(),
                locked: Cell::new(false),
                check_if_same: Cell::new(check_if_same),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Write a value and notify listeners.
    ///
    /// Ignored silently while locked. With `check_if_same` enabled, writing
    /// the current value is a no-op.
    pub fn set(&self, value: T) {
        if self.is_locked() {
            return;
        }
        {
            let mut current = self.inner.value.borrow_mut();
            if self.inner.check_if_same.get() && *current == value {
                return;
            }
            *current = value.clone();
        }
        self.inner.listeners.notify(&value);
    }

    /// `set(f(&current))`
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Notify every live listener with the current value without changing it
    pub fn fire(&self) {
        let value = self.get();
        self.inner.listeners.notify(&value);
    }

    /// Call `callback` on every future write until it returns `false` or the
    /// returned subscription is disconnected.
    pub fn connect(&self, callback: impl FnMut(&T) -> bool + 'static) -> Subscription<T> {
        let subscription = Subscription::new(callback);
        self.inner.listeners.push(subscription.clone());
        subscription
    }

    /// Like `connect`, but the callback runs at most once
    pub fn connect_once(&self, callback: impl FnMut(&T) -> bool + 'static) -> Subscription<T> {
        let subscription = Subscription::once(callback);
        self.inner.listeners.push(subscription.clone());
        subscription
    }
}

impl<T> ObservableValue<T> {
    /// Borrow the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Drop every listener without invoking it
    pub fn disconnect_all(&self) {
        self.inner.listeners.clear();
    }

    pub fn lock(&self) {
        self.inner.locked.set(true);
    }

    pub fn unlock(&self) {
        self.inner.locked.set(false);
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.get()
    }

    pub fn check_if_same(&self) -> bool {
        self.inner.check_if_same.get()
    }

    pub fn set_check_if_same(&self, check: bool) {
        self.inner.check_if_same.set(check);
    }

    /// Live listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.live_count()
    }
}

impl<T> ListenerGroup for ObservableValue<T> {
    fn clear_listeners(&self) {
        self.disconnect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnMut(&T) -> bool + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |v: &T| {
            sink.borrow_mut().push(v.clone());
            true
        })
    }

    #[test]
    fn test_same_value_does_not_notify() {
        let value = ObservableValue::new(5);
        let (seen, cb) = recorder::<i32>();
        value.connect(cb);

        value.set(5);
        assert!(seen.borrow().is_empty());

        value.set(6);
        assert_eq!(*seen.borrow(), vec![6]);
    }

    #[test]
    fn test_same_value_notifies_without_check() {
        let value = ObservableValue::with_check_if_same(5, false);
        let (seen, cb) = recorder::<i32>();
        value.connect(cb);
        value.set(5);
        assert_eq!(*seen.borrow(), vec![5]);
    }

    #[test]
    fn test_listeners_run_in_insertion_order() {
        let value = ObservableValue::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));
        for id in 0..3 {
            let order = Rc::clone(&order);
            value.connect(move |_| {
                order.borrow_mut().push(id);
                true
            });
        }
        value.set(1);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_self_disconnect_is_never_called_again() {
        let value = ObservableValue::new(0);
        let hits = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Subscription<i32>>>> = Rc::new(RefCell::new(None));

        let h = Rc::clone(&hits);
        let own = Rc::clone(&slot);
        let sub = value.connect(move |_| {
            h.set(h.get() + 1);
            if let Some(me) = own.borrow().as_ref() {
                me.disconnect();
            }
            true
        });
        *slot.borrow_mut() = Some(sub);

        value.set(1);
        value.set(2);
        value.set(3);
        assert_eq!(hits.get(), 1);
        assert_eq!(value.listener_count(), 0);
    }

    #[test]
    fn test_listener_reads_new_value() {
        let value = ObservableValue::new(String::from("old"));
        let observed = Rc::new(RefCell::new(String::new()));
        let cell = value.clone();
        let sink = Rc::clone(&observed);
        value.connect(move |_| {
            *sink.borrow_mut() = cell.get();
            true
        });
        value.set("new".to_string());
        assert_eq!(*observed.borrow(), "new");
    }

    #[test]
    fn test_locked_writes_are_ignored() {
        let value = ObservableValue::new(1.0f32);
        let (seen, cb) = recorder::<f32>();
        value.connect(cb);

        value.lock();
        value.set(0.5);
        assert_eq!(value.get(), 1.0);
        assert!(seen.borrow().is_empty());

        value.unlock();
        value.set(0.5);
        assert_eq!(*seen.borrow(), vec![0.5]);
    }

    #[test]
    fn test_connect_once_fires_once() {
        let value = ObservableValue::new(0);
        let (seen, cb) = recorder::<i32>();
        value.connect_once(cb);
        value.set(1);
        value.set(2);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_fire_resends_current_value() {
        let value = ObservableValue::new(7);
        let (seen, cb) = recorder::<i32>();
        value.connect(cb);
        value.fire();
        value.fire();
        assert_eq!(*seen.borrow(), vec![7, 7]);
    }

    #[test]
    fn test_disconnect_all_silences_listeners() {
        let value = ObservableValue::new(0);
        let (seen, cb) = recorder::<i32>();
        value.connect(cb);
        value.disconnect_all();
        value.set(9);
        assert!(seen.borrow().is_empty());
        assert_eq!(value.listener_count(), 0);
    }

    #[test]
    fn test_set_inside_listener_is_safe() {
        let value = ObservableValue::new(0);
        let cell = value.clone();
        value.connect(move |v| {
            if *v < 3 {
                cell.set(v + 1);
            }
            true
        });
        value.set(1);
        // Nested writes skip the listener that is still running
        assert_eq!(value.get(), 2);
    }

    #[test]
    fn test_update_applies_function() {
        let value = ObservableValue::new(10u32);
        value.update(|v| v * 2);
        assert_eq!(value.get(), 20);
        assert_eq!(value.with(|v| v + 1), 21);
    }
}

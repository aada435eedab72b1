//! Subscriptions and the ordered lists that own them
//!
//! A [`Subscription`] wraps a callback `(&T) -> bool`. Returning `false`
//! from the callback means "don't call me again": the subscription marks
//! itself destroyed and its owning [`ListenerList`] drops it on the next pass.
//!
//! Lists are never pruned eagerly. Each notification pass snapshots the
//! current length, walks it from the front, and removes destroyed entries as
//! it meets them. Subscriptions appended during a pass sit past the snapshot
//! and are first visited by the next pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::janitor::Dispose;

type Callback<T> = Box<dyn FnMut(&T) -> bool>;

struct SubscriptionState<T> {
    callback: RefCell<Callback<T>>,
    destroyed: Cell<bool>,
    play_once: bool,
    name: RefCell<Option<String>>,
}

/// Handle to a registered callback.
///
/// Cloning yields another handle to the same subscription.
pub struct Subscription<T> {
    state: Rc<SubscriptionState<T>>,
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.state.name.borrow())
            .field("destroyed", &self.state.destroyed.get())
            .field("play_once", &self.state.play_once)
            .finish()
    }
}

impl<T: 'static> Subscription<T> {
    /// Detached subscription; call it directly or push it into a list.
    pub fn new(callback: impl FnMut(&T) -> bool + 'static) -> Self {
        Self::with_play_once(callback, false)
    }

    /// Subscription that is destroyed right after its first invocation
    /// through a [`ListenerList`].
    pub fn once(callback: impl FnMut(&T) -> bool + 'static) -> Self {
        Self::with_play_once(callback, true)
    }

    fn with_play_once(callback: impl FnMut(&T) -> bool + 'static, play_once: bool) -> Self {
        Self {
            state: Rc::new(SubscriptionState {
                callback: RefCell::new(Box::new(callback)),
                destroyed: Cell::new(false),
                play_once,
                name: RefCell::new(None),
            }),
        }
    }
}

impl<T> Subscription<T> {
    /// Invoke the callback. Returns whether the subscription is still alive.
    ///
    /// A destroyed subscription does nothing and returns `false`. If the
    /// callback is already running further up the stack, the nested call is
    /// skipped and returns `true`: a value set or an event fired from inside
    /// a listener reaches every other listener but not the one that caused
    /// it, so a listener never recurses into itself.
    pub fn call(&self, value: &T) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let Ok(mut callback) = self.state.callback.try_borrow_mut() else {
            log::trace!(
                "subscription {:?} is already running, skipping nested call",
                self.state.name.borrow()
            );
            return true;
        };
        if !(*callback)(value) {
            self.state.destroyed.set(true);
        }
        !self.is_destroyed()
    }

    /// Stop future invocations. An in-flight call still runs to completion.
    pub fn disconnect(&self) {
        self.state.destroyed.set(true);
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed.get()
    }

    pub fn is_play_once(&self) -> bool {
        self.state.play_once
    }

    /// Debug name shown in logs
    pub fn set_name(&self, name: impl Into<String>) {
        *self.state.name.borrow_mut() = Some(name.into());
    }

    pub fn name(&self) -> Option<String> {
        self.state.name.borrow().clone()
    }

    /// Whether both handles refer to the same subscription
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<T> Dispose for Subscription<T> {
    fn dispose(&mut self) {
        self.disconnect();
    }
}

/// Ordered, shared list of subscriptions.
///
/// Cloning yields another handle to the same list.
pub struct ListenerList<T> {
    entries: Rc<RefCell<Vec<Subscription<T>>>>,
}

impl<T> Clone for ListenerList<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<T> Default for ListenerList<T> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T> fmt::Debug for ListenerList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}

impl<T> ListenerList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription; it is first visited by the next pass
    pub fn push(&self, subscription: Subscription<T>) {
        self.entries.borrow_mut().push(subscription);
    }

    /// Number of entries, including destroyed ones not yet pruned
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of entries that are still alive
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|s| !s.is_destroyed())
            .count()
    }

    /// Drop every entry without invoking it
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// One notification pass over the entries present when the pass starts.
    ///
    /// Destroyed entries are removed as they are met. One-shot entries are
    /// destroyed right after their invocation. The list is never borrowed
    /// while a callback runs, so callbacks may push, disconnect, clear or
    /// start a nested pass.
    pub fn notify(&self, value: &T) {
        self.notify_first(value, self.len());
    }

    /// Notification pass limited to the first `count` entries, for callers
    /// that snapshot the length before an outer pass begins.
    pub fn notify_first(&self, value: &T, count: usize) {
        let mut i = 0;
        let mut size = count;

        while i < size {
            let Some(subscription) = self.entries.borrow().get(i).cloned() else {
                // Shrunk underneath us (cleared or pruned by a nested pass)
                break;
            };

            if subscription.is_destroyed() {
                self.entries.borrow_mut().remove(i);
                size -= 1;
                continue;
            }

            subscription.call(value);
            if subscription.is_play_once() {
                subscription.disconnect();
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destroyed_subscription_is_noop() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = Subscription::new(move |_: &i32| {
            h.set(h.get() + 1);
            true
        });
        assert!(sub.call(&1));
        sub.disconnect();
        assert!(!sub.call(&2));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_returning_false_destroys() {
        let sub = Subscription::new(|v: &i32| *v < 3);
        assert!(sub.call(&1));
        assert!(!sub.call(&5));
        assert!(sub.is_destroyed());
    }

    #[test]
    fn test_notify_prunes_lazily() {
        let list = ListenerList::new();
        let a = Subscription::new(|_: &()| true);
        let b = Subscription::new(|_: &()| false);
        list.push(a.clone());
        list.push(b.clone());

        list.notify(&());
        // b destroyed itself but is still in the list until the next pass
        assert_eq!(list.len(), 2);
        assert_eq!(list.live_count(), 1);

        list.notify(&());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_push_during_pass_waits_for_next_pass() {
        let list: ListenerList<()> = ListenerList::new();
        let late_hits = Rc::new(Cell::new(0));

        let inner_list = list.clone();
        let counter = Rc::clone(&late_hits);
        list.push(Subscription::once(move |_: &()| {
            let counter = Rc::clone(&counter);
            inner_list.push(Subscription::new(move |_: &()| {
                counter.set(counter.get() + 1);
                true
            }));
            true
        }));

        list.notify(&());
        assert_eq!(late_hits.get(), 0);
        list.notify(&());
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn test_clear_during_pass_stops_iteration() {
        let list: ListenerList<()> = ListenerList::new();
        let second_hits = Rc::new(Cell::new(0));

        let inner_list = list.clone();
        list.push(Subscription::new(move |_: &()| {
            inner_list.clear();
            true
        }));
        let h = Rc::clone(&second_hits);
        list.push(Subscription::new(move |_: &()| {
            h.set(h.get() + 1);
            true
        }));

        list.notify(&());
        assert_eq!(second_hits.get(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_nested_call_skips_running_callback() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let me: Rc<RefCell<Option<Subscription<i32>>>> = Rc::new(RefCell::new(None));
        let nested = Rc::new(Cell::new(false));

        let (s, m, n) = (Rc::clone(&seen), Rc::clone(&me), Rc::clone(&nested));
        let sub = Subscription::new(move |v: &i32| {
            s.borrow_mut().push(*v);
            if *v == 1 {
                if let Some(me) = m.borrow().as_ref() {
                    n.set(me.call(&2));
                }
            }
            true
        });
        *me.borrow_mut() = Some(sub.clone());

        assert!(sub.call(&1));
        assert_eq!(*seen.borrow(), vec![1]);
        assert!(nested.get());
        assert!(sub.call(&3));
        assert_eq!(*seen.borrow(), vec![1, 3]);
        me.borrow_mut().take();
    }

    #[test]
    fn test_names_are_kept() {
        let sub = Subscription::new(|_: &u8| true);
        assert_eq!(sub.name(), None);
        sub.set_name("musicVolumeUpdate");
        assert_eq!(sub.name().as_deref(), Some("musicVolumeUpdate"));
    }
}

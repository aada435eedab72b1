//! Desired vs actual values
//!
//! A consumer requests a value (`desired`); the value actually applied
//! (`actual`) follows it unless locked. While locked, requests are remembered
//! and the latest one is applied on unlock.

use super::listener::Subscription;
use super::observable::ObservableValue;

/// Input to [`DesiredState::apply`]
#[derive(Debug, Clone, PartialEq)]
pub enum DesiredEvent<T> {
    SetDesired(T),
    Lock,
    Unlock,
}

/// Pure state of a desired/actual pair
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState<T> {
    pub desired: T,
    pub locked: bool,
}

impl<T: Clone> DesiredState<T> {
    pub fn new(desired: T) -> Self {
        Self {
            desired,
            locked: false,
        }
    }

    /// Transition function. Returns the next state and the value to write to
    /// `actual`, if any.
    pub fn apply(self, event: DesiredEvent<T>) -> (Self, Option<T>) {
        match event {
            DesiredEvent::SetDesired(desired) => {
                let write = (!self.locked).then(|| desired.clone());
                (
                    Self {
                        desired,
                        locked: self.locked,
                    },
                    write,
                )
            }
            DesiredEvent::Lock => (
                Self {
                    desired: self.desired,
                    locked: true,
                },
                None,
            ),
            DesiredEvent::Unlock => {
                let write = Some(self.desired.clone());
                (
                    Self {
                        desired: self.desired,
                        locked: false,
                    },
                    write,
                )
            }
        }
    }
}

/// Desired/actual pair whose actual side is observable
pub struct DesiredValue<T> {
    state: DesiredState<T>,
    actual: ObservableValue<T>,
}

impl<T: Clone + PartialEq + 'static> DesiredValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: DesiredState::new(value.clone()),
            actual: ObservableValue::new(value),
        }
    }

    pub fn desired(&self) -> &T {
        &self.state.desired
    }

    pub fn actual(&self) -> T {
        self.actual.get()
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    pub fn set_desired(&mut self, value: T) {
        self.dispatch(DesiredEvent::SetDesired(value));
    }

    pub fn lock(&mut self) {
        self.dispatch(DesiredEvent::Lock);
    }

    pub fn unlock(&mut self) {
        self.dispatch(DesiredEvent::Unlock);
    }

    /// Observe writes to the actual value
    pub fn connect(&self, callback: impl FnMut(&T) -> bool + 'static) -> Subscription<T> {
        self.actual.connect(callback)
    }

    /// Handle to the actual value cell
    pub fn actual_value(&self) -> &ObservableValue<T> {
        &self.actual
    }

    fn dispatch(&mut self, event: DesiredEvent<T>) {
        let (next, write) = self.state.clone().apply(event);
        self.state = next;
        if let Some(value) = write {
            self.actual.set(value);
        }
    }
}

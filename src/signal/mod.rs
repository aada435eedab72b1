//! Reactive values and subscriptions
//!
//! Single-threaded: every handle here is `Rc`-based and all notification
//! happens on the update thread. Callbacks may connect, disconnect or write
//! values while a notification pass is running.

pub mod desired;
pub mod listener;
pub mod observable;

pub use desired::{DesiredEvent, DesiredState, DesiredValue};
pub use listener::{ListenerList, Subscription};
pub use observable::ObservableValue;

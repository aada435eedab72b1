//! Priority-ordered update dispatch
//!
//! Each [`TickPhase`] owns a list of priority buckets sorted ascending. A
//! bucket is a [`ListenerList`] of `(dt) -> keep_alive` callbacks. One call to
//! [`UpdateDispatcher::tick`] runs every bucket of the phase in priority
//! order, and every listener of a bucket in registration order.
//!
//! Buckets and listeners added while a tick is running are first run by the
//! next tick. Destroyed listeners and empty buckets are pruned lazily.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::janitor::ListenerGroup;
use crate::signal::{ListenerList, Subscription};

/// Point in the host frame at which a tick runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickPhase {
    /// Fixed physics step
    FixedUpdate,
    /// Once per frame, after physics
    Update,
    /// After every `Update` listener
    LateUpdate,
    /// Right before the camera renders
    PreRender,
}

impl TickPhase {
    pub const ALL: [TickPhase; 4] = [
        TickPhase::FixedUpdate,
        TickPhase::Update,
        TickPhase::LateUpdate,
        TickPhase::PreRender,
    ];

    fn index(self) -> usize {
        match self {
            TickPhase::FixedUpdate => 0,
            TickPhase::Update => 1,
            TickPhase::LateUpdate => 2,
            TickPhase::PreRender => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TickPhase::FixedUpdate => "FixedUpdate",
            TickPhase::Update => "Update",
            TickPhase::LateUpdate => "LateUpdate",
            TickPhase::PreRender => "PreRender",
        }
    }
}

#[derive(Clone)]
struct Bucket {
    priority: i32,
    listeners: ListenerList<f32>,
}

type Channel = RefCell<Vec<Bucket>>;

/// Per-phase priority registry of update callbacks.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct UpdateDispatcher {
    channels: Rc<[Channel; 4]>,
}

impl Default for UpdateDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for phase in TickPhase::ALL {
            map.entry(&phase.as_str(), &self.bucket_priorities(phase));
        }
        map.finish()
    }
}

impl UpdateDispatcher {
    pub fn new() -> Self {
        Self {
            channels: Rc::new(std::array::from_fn(|_| RefCell::new(Vec::new()))),
        }
    }

    fn channel(&self, phase: TickPhase) -> &Channel {
        &self.channels[phase.index()]
    }

    /// Bucket for `priority`, inserted at its sorted position if missing
    fn bucket(&self, phase: TickPhase, priority: i32) -> ListenerList<f32> {
        let mut buckets = self.channel(phase).borrow_mut();
        let pos = buckets.partition_point(|b| b.priority < priority);
        let existing = buckets
            .get(pos)
            .filter(|b| b.priority == priority)
            .map(|b| b.listeners.clone());
        if let Some(listeners) = existing {
            return listeners;
        }

        log::trace!("{}: new bucket at priority {}", phase.as_str(), priority);
        let listeners = ListenerList::new();
        buckets.insert(
            pos,
            Bucket {
                priority,
                listeners: listeners.clone(),
            },
        );
        listeners
    }

    /// Run `callback(dt)` on every tick of `phase` until it returns `false`
    /// or the subscription is disconnected.
    pub fn bind(
        &self,
        phase: TickPhase,
        priority: i32,
        mut callback: impl FnMut(f32) -> bool + 'static,
    ) -> Subscription<f32> {
        let subscription = Subscription::new(move |dt: &f32| callback(*dt));
        self.bucket(phase, priority).push(subscription.clone());
        subscription
    }

    /// Run `callback` once, on the first tick at which the accumulated time
    /// reaches `delay` seconds.
    pub fn run_after(
        &self,
        phase: TickPhase,
        priority: i32,
        delay: f32,
        callback: impl FnOnce(f32) + 'static,
    ) -> Subscription<f32> {
        let mut elapsed = 0.0;
        let mut callback = Some(callback);
        self.bind(phase, priority, move |dt| {
            elapsed += dt;
            if elapsed < delay {
                return true;
            }
            if let Some(callback) = callback.take() {
                callback(dt);
            }
            false
        })
    }

    /// Run `callback` every tick while the accumulated time has not passed
    /// `duration` seconds.
    pub fn run_for(
        &self,
        phase: TickPhase,
        priority: i32,
        duration: f32,
        mut callback: impl FnMut(f32) -> bool + 'static,
    ) -> Subscription<f32> {
        let mut elapsed = 0.0;
        self.bind(phase, priority, move |dt| {
            if elapsed > duration {
                return false;
            }
            elapsed += dt;
            callback(dt)
        })
    }

    /// Run `callback` each time the accumulated time reaches `interval`
    /// seconds, then restart the count. Stops only when the callback returns
    /// `false` or the subscription is disconnected.
    pub fn run_every(
        &self,
        phase: TickPhase,
        priority: i32,
        interval: f32,
        mut callback: impl FnMut(f32) -> bool + 'static,
    ) -> Subscription<f32> {
        let mut elapsed = 0.0;
        self.bind(phase, priority, move |dt| {
            elapsed += dt;
            if elapsed < interval {
                return true;
            }
            elapsed = 0.0;
            callback(dt)
        })
    }

    /// Run every listener of `phase` once with `dt`
    pub fn tick(&self, phase: TickPhase, dt: f32) {
        let plan: Vec<(ListenerList<f32>, usize)> = {
            let mut buckets = self.channel(phase).borrow_mut();
            let before = buckets.len();
            buckets.retain(|b| !b.listeners.is_empty());
            if buckets.len() != before {
                log::trace!(
                    "{}: pruned {} empty bucket(s)",
                    phase.as_str(),
                    before - buckets.len()
                );
            }
            buckets
                .iter()
                .map(|b| (b.listeners.clone(), b.listeners.len()))
                .collect()
        };

        for (listeners, count) in plan {
            listeners.notify_first(&dt, count);
        }
    }

    /// Drop every listener of `phase` without running it. Called from a
    /// listener, the rest of the current pass is skipped as well.
    pub fn clear_phase(&self, phase: TickPhase) {
        let buckets = std::mem::take(&mut *self.channel(phase).borrow_mut());
        for bucket in buckets {
            bucket.listeners.clear();
        }
    }

    /// Live listeners across all buckets of `phase`
    pub fn listener_count(&self, phase: TickPhase) -> usize {
        self.channel(phase)
            .borrow()
            .iter()
            .map(|b| b.listeners.live_count())
            .sum()
    }

    /// Priorities of the current buckets, in run order
    pub fn bucket_priorities(&self, phase: TickPhase) -> Vec<i32> {
        self.channel(phase)
            .borrow()
            .iter()
            .map(|b| b.priority)
            .collect()
    }

    /// Every listener of `phase` as one group, for bulk release
    pub fn phase_listeners(&self, phase: TickPhase) -> PhaseListeners {
        PhaseListeners {
            dispatcher: self.clone(),
            phase,
        }
    }
}

/// All listeners of one phase of a dispatcher
#[derive(Debug, Clone)]
pub struct PhaseListeners {
    dispatcher: UpdateDispatcher,
    phase: TickPhase,
}

impl ListenerGroup for PhaseListeners {
    fn clear_listeners(&self) {
        self.dispatcher.clear_phase(self.phase);
    }
}

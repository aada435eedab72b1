//! Rigid attachment between two frames
//!
//! A [`Weld`] keeps `part0 * c0 == part1 * c1` by rewriting `part1` once per
//! update, as if `part1` were parented to `part0`. Welds are driven by a
//! [`WeldSet`], which owns a single update listener for all of them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::janitor::Dispose;
use crate::math::AffineFrame;
use crate::priority;
use crate::signal::Subscription;
use crate::tick::{TickPhase, UpdateDispatcher};

/// Shared, mutable frame of a host object
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    frame: Rc<Cell<AffineFrame>>,
}

impl FrameSlot {
    pub fn new(frame: AffineFrame) -> Self {
        Self {
            frame: Rc::new(Cell::new(frame)),
        }
    }

    pub fn get(&self) -> AffineFrame {
        self.frame.get()
    }

    pub fn set(&self, frame: AffineFrame) {
        self.frame.set(frame);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

#[derive(Debug)]
struct WeldState {
    part0: Option<FrameSlot>,
    part1: Option<FrameSlot>,
    c0: AffineFrame,
    c1: AffineFrame,
    active: bool,
    destroyed: bool,
}

/// Handle to one weld. Cloning yields another handle to the same weld.
#[derive(Clone)]
pub struct Weld {
    state: Rc<RefCell<WeldState>>,
}

impl fmt::Debug for Weld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.state.borrow(), f)
    }
}

impl Weld {
    pub fn part0(&self) -> Option<FrameSlot> {
        self.state.borrow().part0.clone()
    }

    pub fn part1(&self) -> Option<FrameSlot> {
        self.state.borrow().part1.clone()
    }

    pub fn set_part0(&self, part: Option<FrameSlot>) {
        self.state.borrow_mut().part0 = part;
    }

    pub fn set_part1(&self, part: Option<FrameSlot>) {
        self.state.borrow_mut().part1 = part;
    }

    pub fn c0(&self) -> AffineFrame {
        self.state.borrow().c0
    }

    pub fn c1(&self) -> AffineFrame {
        self.state.borrow().c1
    }

    /// Offset of the attachment point from `part0`
    pub fn set_c0(&self, c0: AffineFrame) {
        self.state.borrow_mut().c0 = c0;
    }

    /// Offset of the attachment point from `part1`
    pub fn set_c1(&self, c1: AffineFrame) {
        self.state.borrow_mut().c1 = c1;
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn set_active(&self, active: bool) {
        self.state.borrow_mut().active = active;
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    /// Frame `part1` should have, if both parts are set
    pub fn target(&self) -> Option<AffineFrame> {
        let state = self.state.borrow();
        let part0 = state.part0.as_ref()?;
        Some(part0.get() * state.c0 * state.c1.inverse())
    }

    fn apply(&self) {
        let (active, destroyed) = {
            let state = self.state.borrow();
            (state.active, state.destroyed)
        };
        if !active || destroyed {
            return;
        }
        if let (Some(target), Some(part1)) = (self.target(), self.part1()) {
            part1.set(target);
        }
    }
}

impl Dispose for Weld {
    fn dispose(&mut self) {
        self.state.borrow_mut().destroyed = true;
    }
}

/// Every weld updated by one dispatcher
pub struct WeldSet {
    welds: Rc<RefCell<Vec<Weld>>>,
    subscription: Subscription<f32>,
}

impl fmt::Debug for WeldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeldSet")
            .field("welds", &self.welds.borrow().len())
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl WeldSet {
    /// Bind the weld update to `dispatcher` at heartbeat physics priority
    pub fn new(dispatcher: &UpdateDispatcher) -> Self {
        let welds: Rc<RefCell<Vec<Weld>>> = Rc::default();

        let list = Rc::clone(&welds);
        let subscription = dispatcher.bind(TickPhase::Update, priority::heartbeat::PHYSICS, move |_| {
            update_welds(&list);
            true
        });
        subscription.set_name("UpdateWelds");

        Self {
            welds,
            subscription,
        }
    }

    /// Weld `part1` to `part0` with explicit offsets
    pub fn weld(
        &self,
        part0: FrameSlot,
        part1: FrameSlot,
        c0: AffineFrame,
        c1: AffineFrame,
    ) -> Weld {
        let weld = Weld {
            state: Rc::new(RefCell::new(WeldState {
                part0: Some(part0),
                part1: Some(part1),
                c0,
                c1,
                active: true,
                destroyed: false,
            })),
        };
        self.welds.borrow_mut().push(weld.clone());
        weld
    }

    /// Weld holding the current relative placement of the two parts
    pub fn weld_in_place(&self, part0: FrameSlot, part1: FrameSlot) -> Weld {
        let c0 = part0.get().to_local(&part1.get());
        self.weld(part0, part1, c0, AffineFrame::IDENTITY)
    }

    /// Welds not yet pruned, including disposed ones
    pub fn len(&self) -> usize {
        self.welds.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.welds.borrow().is_empty()
    }

    pub fn subscription(&self) -> &Subscription<f32> {
        &self.subscription
    }
}

impl Dispose for WeldSet {
    fn dispose(&mut self) {
        self.subscription.disconnect();
        self.welds.borrow_mut().clear();
    }
}

fn update_welds(welds: &RefCell<Vec<Weld>>) {
    let mut i = 0;
    loop {
        let Some(weld) = welds.borrow().get(i).cloned() else {
            break;
        };
        if weld.is_destroyed() {
            welds.borrow_mut().remove(i);
            continue;
        }
        weld.apply();
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn tick(d: &UpdateDispatcher) {
        d.tick(TickPhase::Update, 1.0 / 60.0);
    }

    #[test]
    fn test_part1_follows_part0() {
        let d = UpdateDispatcher::new();
        let welds = WeldSet::new(&d);
        let body = FrameSlot::new(AffineFrame::IDENTITY);
        let wing = FrameSlot::new(AffineFrame::from_xyz(2.0, 0.0, 0.0));
        welds.weld_in_place(body.clone(), wing.clone());

        body.set(AffineFrame::from_position_rotation(
            Vec3::new(0.0, 5.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        ));
        tick(&d);

        // +X offset rotated a quarter turn about Y lands on -Z
        assert!(wing.get().position().abs_diff_eq(Vec3::new(0.0, 5.0, -2.0), 1e-5));
    }

    #[test]
    fn test_constraint_holds_with_offsets() {
        let d = UpdateDispatcher::new();
        let welds = WeldSet::new(&d);
        let part0 = FrameSlot::new(AffineFrame::from_euler_xyz(0.3, -0.2, 1.1) + Vec3::ONE);
        let part1 = FrameSlot::new(AffineFrame::IDENTITY);
        let c0 = AffineFrame::from_xyz(0.0, 1.0, 0.0);
        let c1 = AffineFrame::from_axis_angle(Vec3::Z, 0.5);
        welds.weld(part0.clone(), part1.clone(), c0, c1);

        tick(&d);
        assert!((part0.get() * c0).abs_diff_eq(&(part1.get() * c1), 1e-5));
    }

    #[test]
    fn test_inactive_weld_leaves_part1() {
        let d = UpdateDispatcher::new();
        let welds = WeldSet::new(&d);
        let part0 = FrameSlot::new(AffineFrame::from_xyz(1.0, 0.0, 0.0));
        let part1 = FrameSlot::new(AffineFrame::from_xyz(9.0, 9.0, 9.0));
        let weld = welds.weld(part0, part1.clone(), AffineFrame::IDENTITY, AffineFrame::IDENTITY);

        weld.set_active(false);
        tick(&d);
        assert_eq!(part1.get().position(), Vec3::new(9.0, 9.0, 9.0));

        weld.set_active(true);
        tick(&d);
        assert_eq!(part1.get().position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_missing_part_is_skipped() {
        let d = UpdateDispatcher::new();
        let welds = WeldSet::new(&d);
        let part1 = FrameSlot::new(AffineFrame::from_xyz(4.0, 0.0, 0.0));
        let weld = welds.weld(
            FrameSlot::default(),
            part1.clone(),
            AffineFrame::IDENTITY,
            AffineFrame::IDENTITY,
        );
        weld.set_part0(None);
        tick(&d);
        assert_eq!(part1.get().position(), Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_disposed_welds_are_pruned() {
        let d = UpdateDispatcher::new();
        let welds = WeldSet::new(&d);
        let part0 = FrameSlot::new(AffineFrame::IDENTITY);
        let part1 = FrameSlot::new(AffineFrame::from_xyz(0.0, 0.0, 3.0));
        let mut weld = welds.weld_in_place(part0.clone(), part1.clone());
        assert_eq!(welds.len(), 1);

        weld.dispose();
        part0.set(AffineFrame::from_xyz(10.0, 0.0, 0.0));
        tick(&d);
        assert!(welds.is_empty());
        assert_eq!(part1.get().position(), Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_disposed_set_unbinds() {
        let d = UpdateDispatcher::new();
        let mut welds = WeldSet::new(&d);
        assert_eq!(d.listener_count(TickPhase::Update), 1);
        welds.dispose();
        assert_eq!(d.listener_count(TickPhase::Update), 0);
    }
}

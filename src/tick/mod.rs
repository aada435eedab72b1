//! Phased, priority-ordered update ticks

pub mod dispatcher;
pub mod driver;

pub use dispatcher::{PhaseListeners, TickPhase, UpdateDispatcher};
pub use driver::{FrameDriver, FrameReport};

//! Frame math
//!
//! Engine-independent position + orientation type used for positioning
//! game objects, welds and camera targets.

pub mod frame;

pub use frame::AffineFrame;

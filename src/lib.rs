//! Birds Assemble - reactive gameplay core
//!
//! Core modules:
//! - `math`: Affine frames (rotation + translation) and their algebra
//! - `signal`: Observable values and subscriptions
//! - `tick`: Phased, priority-ordered update dispatch and the frame driver
//! - `janitor`: Exactly-once resource release
//! - `context`: Application context wiring the above together
//! - `weld`, `score`, `settings`: Gameplay pieces built on the core
//! - `persistence`: Key-value storage for settings

pub mod config;
pub mod context;
pub mod janitor;
pub mod math;
pub mod persistence;
pub mod score;
pub mod settings;
pub mod signal;
pub mod tick;
pub mod weld;

pub use config::EngineConfig;
pub use context::AppContext;
pub use janitor::{Dispose, ListenerGroup, ObjectHost, ObjectId, Resource, ResourceJanitor};
pub use math::AffineFrame;
pub use score::Score;
pub use settings::SoundSettings;
pub use signal::{ObservableValue, Subscription};
pub use tick::{FrameDriver, TickPhase, UpdateDispatcher};
pub use weld::{FrameSlot, Weld, WeldSet};

/// Update priorities. Lower values run first within a phase.
pub mod priority {
    /// Priorities for `PreRender` listeners
    pub mod render_step {
        pub const FIRST: i32 = 0;
        pub const CAMERA: i32 = 100;
        pub const CHARACTER: i32 = 200;
        pub const LAST: i32 = 1000;
    }

    /// Priorities for `Update` and `FixedUpdate` listeners
    pub mod heartbeat {
        pub const FIRST: i32 = 0;
        pub const INPUT: i32 = 100;
        pub const PHYSICS: i32 = 200;
    }
}

//! Player score

use crate::signal::{ObservableValue, Subscription};

/// Points awarded for each hit
pub const POINTS_PER_HIT: u64 = 200;

/// Observable running score
#[derive(Debug, Clone, Default)]
pub struct Score {
    value: ObservableValue<u64>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.value.get()
    }

    pub fn record_hit(&self) {
        self.value.update(|score| score.saturating_add(POINTS_PER_HIT));
    }

    pub fn reset(&self) {
        self.value.set(0);
    }

    /// Observe score changes
    pub fn connect(&self, callback: impl FnMut(&u64) -> bool + 'static) -> Subscription<u64> {
        self.value.connect(callback)
    }

    pub fn value(&self) -> &ObservableValue<u64> {
        &self.value
    }
}

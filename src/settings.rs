//! Sound settings
//!
//! Volumes live in observable cells so mixers can react to changes. Every
//! change is written back to the key-value store.

use std::rc::Rc;

use crate::janitor::ResourceJanitor;
use crate::persistence::KeyValueStore;
use crate::signal::ObservableValue;

pub const MASTER_VOLUME_KEY: &str = "MasterVolume";
pub const MUSIC_VOLUME_KEY: &str = "MusicVolume";
pub const EFFECT_VOLUME_KEY: &str = "EffectVolume";

/// Volume used when the store has no entry yet
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Persisted volume levels (0.0 - 1.0)
#[derive(Debug, Clone)]
pub struct SoundSettings {
    master: ObservableValue<f32>,
    music: ObservableValue<f32>,
    effects: ObservableValue<f32>,
}

impl SoundSettings {
    /// Load volumes from `store`, writing defaults for missing keys. The
    /// write-back listeners are owned by `janitor`.
    pub fn new(store: Rc<dyn KeyValueStore>, janitor: &ResourceJanitor) -> Self {
        Self {
            master: persisted_volume(&store, janitor, MASTER_VOLUME_KEY),
            music: persisted_volume(&store, janitor, MUSIC_VOLUME_KEY),
            effects: persisted_volume(&store, janitor, EFFECT_VOLUME_KEY),
        }
    }

    pub fn master(&self) -> &ObservableValue<f32> {
        &self.master
    }

    pub fn music(&self) -> &ObservableValue<f32> {
        &self.music
    }

    pub fn effects(&self) -> &ObservableValue<f32> {
        &self.effects
    }

    pub fn set_master(&self, volume: f32) {
        self.master.set(volume.clamp(0.0, 1.0));
    }

    pub fn set_music(&self, volume: f32) {
        self.music.set(volume.clamp(0.0, 1.0));
    }

    pub fn set_effects(&self, volume: f32) {
        self.effects.set(volume.clamp(0.0, 1.0));
    }

    /// Music volume after the master level
    pub fn effective_music(&self) -> f32 {
        self.master.get() * self.music.get()
    }

    /// Effect volume after the master level
    pub fn effective_effects(&self) -> f32 {
        self.master.get() * self.effects.get()
    }
}

fn persisted_volume(
    store: &Rc<dyn KeyValueStore>,
    janitor: &ResourceJanitor,
    key: &'static str,
) -> ObservableValue<f32> {
    let volume = ObservableValue::new(store.get_or_insert_f32(key, DEFAULT_VOLUME));

    let store = Rc::clone(store);
    let write_back = volume.connect(move |v| {
        store.set_f32(key, *v);
        true
    });
    write_back.set_name(format!("{key}Update"));
    janitor.give_subscription(write_back);

    volume
}

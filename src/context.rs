//! Application context
//!
//! Owns the process-wide pieces (root janitor, update dispatcher, config,
//! sound settings) and hands them to subsystems explicitly.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::janitor::{ObjectHost, ResourceJanitor};
use crate::persistence::KeyValueStore;
use crate::settings::SoundSettings;
use crate::tick::{FrameDriver, TickPhase, UpdateDispatcher};

pub struct AppContext {
    janitor: ResourceJanitor,
    dispatcher: UpdateDispatcher,
    config: EngineConfig,
    sound: SoundSettings,
    shut_down: Cell<bool>,
}

impl AppContext {
    pub fn new(config: EngineConfig, store: Rc<dyn KeyValueStore>) -> Self {
        Self::build(config, store, None)
    }

    /// Context whose janitors destroy owned objects through `host`
    pub fn with_host(
        config: EngineConfig,
        store: Rc<dyn KeyValueStore>,
        host: Rc<dyn ObjectHost>,
    ) -> Self {
        Self::build(config, store, Some(host))
    }

    fn build(
        config: EngineConfig,
        store: Rc<dyn KeyValueStore>,
        host: Option<Rc<dyn ObjectHost>>,
    ) -> Self {
        let janitor = match host {
            Some(host) => ResourceJanitor::with_host(host),
            None => ResourceJanitor::new(),
        };
        let dispatcher = UpdateDispatcher::new();
        for phase in TickPhase::ALL {
            janitor.give_listeners(dispatcher.phase_listeners(phase));
        }
        let sound = SoundSettings::new(store, &janitor);

        log::info!(
            "context ready: fixed step {:.4}s, time scale {}",
            config.fixed_time_step,
            config.time_scale
        );

        Self {
            janitor,
            dispatcher,
            config,
            sound,
            shut_down: Cell::new(false),
        }
    }

    /// Janitor released together with the root janitor at shutdown. Releasing
    /// it earlier removes it from the root.
    pub fn new_janitor(&self) -> ResourceJanitor {
        self.janitor.new_child()
    }

    pub fn janitor(&self) -> &ResourceJanitor {
        &self.janitor
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sound(&self) -> &SoundSettings {
        &self.sound
    }

    /// Frame loop adapter over this context's dispatcher
    pub fn frame_driver(&self) -> FrameDriver {
        FrameDriver::new(self.dispatcher.clone(), self.config.clone())
    }

    /// Release everything owned by the root janitor. Only the first call
    /// does anything.
    pub fn shutdown(&self) {
        if self.shut_down.replace(true) {
            return;
        }
        log::info!("shutting down, {} root task(s)", self.janitor.len());
        self.janitor.release_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::janitor::ObjectId;
    use crate::persistence::MemoryStore;
    use std::cell::RefCell;

    fn context() -> (AppContext, Rc<MemoryStore>) {
        let store = Rc::new(MemoryStore::new());
        (AppContext::new(EngineConfig::default(), store.clone()), store)
    }

    #[test]
    fn test_shutdown_releases_children_once() {
        let (ctx, _) = context();
        let hits = Rc::new(Cell::new(0));
        let child = ctx.new_janitor();
        let h = Rc::clone(&hits);
        child.give_cleanup(move || h.set(h.get() + 1));

        ctx.shutdown();
        ctx.shutdown();
        assert_eq!(hits.get(), 1);
        assert!(ctx.is_shut_down());
        assert!(ctx.janitor().is_empty());
    }

    #[test]
    fn test_early_released_child_leaves_root() {
        let (ctx, _) = context();
        let baseline = ctx.janitor().len();

        let child = ctx.new_janitor();
        child.give_cleanup(|| {});
        assert_eq!(ctx.janitor().len(), baseline + 1);

        child.release_all();
        assert_eq!(ctx.janitor().len(), baseline);
    }

    #[test]
    fn test_shutdown_clears_dispatcher() {
        let (ctx, _) = context();
        for phase in TickPhase::ALL {
            ctx.dispatcher().bind(phase, 0, |_| true);
        }
        ctx.shutdown();
        for phase in TickPhase::ALL {
            assert_eq!(ctx.dispatcher().listener_count(phase), 0);
        }
    }

    #[test]
    fn test_sound_stops_persisting_after_shutdown() {
        let (ctx, store) = context();
        ctx.sound().set_music(0.5);
        assert_eq!(store.get_f32(crate::settings::MUSIC_VOLUME_KEY), Some(0.5));

        ctx.shutdown();
        ctx.sound().set_music(0.1);
        assert_eq!(store.get_f32(crate::settings::MUSIC_VOLUME_KEY), Some(0.5));
    }

    #[test]
    fn test_child_janitors_share_host() {
        #[derive(Default)]
        struct Host(RefCell<Vec<ObjectId>>);
        impl ObjectHost for Host {
            fn destroy_object(&self, id: ObjectId) {
                self.0.borrow_mut().push(id);
            }
        }

        let host = Rc::new(Host::default());
        let ctx = AppContext::with_host(
            EngineConfig::default(),
            Rc::new(MemoryStore::new()),
            host.clone(),
        );
        ctx.new_janitor().give_object(ObjectId(42));
        ctx.shutdown();
        assert_eq!(*host.0.borrow(), vec![ObjectId(42)]);
    }
}

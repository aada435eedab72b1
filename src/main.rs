//! Birds Assemble headless session
//!
//! Wires the core together and drives it with a simulated host clock: a
//! bird is launched, falls under gravity, scores when it lands and is
//! relaunched with a seeded random velocity. A camera follows it and a
//! welded trail marker rides along.
//!
//! Usage: `birds-assemble [config.json] [seed]`

use std::rc::Rc;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use birds_assemble::persistence::JsonFileStore;
use birds_assemble::priority::{heartbeat, render_step};
use birds_assemble::{AffineFrame, AppContext, EngineConfig, FrameSlot, Score, TickPhase, WeldSet};

/// Host frame length (60 Hz display)
const FRAME_DT: f32 = 1.0 / 60.0;
/// Simulated session length in seconds
const SESSION_SECONDS: f32 = 10.0;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::default(),
    };
    let seed = args
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0xB1AD5);
    log::info!("Birds Assemble (headless) starting, seed {}", seed);

    let store_path = std::env::temp_dir()
        .join("birds-assemble")
        .join("settings.json");
    let store = Rc::new(JsonFileStore::load_or_default(store_path));
    let ctx = AppContext::new(config, store.clone());
    let session = ctx.new_janitor();

    // Score
    let score = Score::new();
    let scored = score.connect(|points| {
        log::info!("Score: {}", points);
        true
    });
    session.give_subscription(scored);

    // Bird flight on the fixed step
    let bird = FrameSlot::new(AffineFrame::from_xyz(0.0, 1.0, 0.0));
    let gravity = ctx.config().gravity;
    let mut rng = Pcg32::seed_from_u64(seed);
    let mut velocity = launch_velocity(&mut rng);
    let flight = {
        let bird = bird.clone();
        let score = score.clone();
        ctx.dispatcher()
            .bind(TickPhase::FixedUpdate, heartbeat::PHYSICS, move |dt| {
                velocity.y += gravity * dt;
                let mut frame = bird.get() + velocity * dt;
                if frame.position().y <= 0.0 {
                    score.record_hit();
                    frame = AffineFrame::from_xyz(0.0, 1.0, 0.0);
                    velocity = launch_velocity(&mut rng);
                }
                bird.set(frame);
                true
            })
    };
    flight.set_name("BirdFlight");
    session.give_subscription(flight);

    // Trail marker welded half a unit behind the bird
    let welds = WeldSet::new(ctx.dispatcher());
    let marker = FrameSlot::new(AffineFrame::IDENTITY);
    welds.weld(
        bird.clone(),
        marker.clone(),
        AffineFrame::from_xyz(-0.5, 0.0, 0.0),
        AffineFrame::IDENTITY,
    );
    session.give_disposable(welds);

    // Camera eases toward a look-at on the bird
    let camera = FrameSlot::new(AffineFrame::from_xyz(0.0, 5.0, 20.0));
    let follow = {
        let camera = camera.clone();
        let bird = bird.clone();
        ctx.dispatcher()
            .bind(TickPhase::PreRender, render_step::CAMERA, move |dt| {
                let current = camera.get();
                let goal = AffineFrame::look_at(current.position(), bird.get().position());
                camera.set(current.slerp(&goal, (dt * 5.0).min(1.0)));
                true
            })
    };
    session.give_subscription(follow);

    let status = {
        let score = score.clone();
        let marker = marker.clone();
        ctx.dispatcher()
            .run_every(TickPhase::Update, heartbeat::FIRST, 1.0, move |_| {
                log::debug!("score {} marker at {}", score.get(), marker.get().position());
                true
            })
    };
    session.give_subscription(status);

    let sound = ctx.sound().clone();
    let fade = ctx
        .dispatcher()
        .run_after(TickPhase::Update, heartbeat::FIRST, SESSION_SECONDS / 2.0, move |_| {
            sound.set_music(0.5);
            log::info!("Music faded to {}", sound.effective_music());
        });
    session.give_subscription(fade);

    let mut driver = ctx.frame_driver();
    let frames = (SESSION_SECONDS / FRAME_DT) as u32;
    let mut substeps = 0;
    for _ in 0..frames {
        substeps += driver.advance(FRAME_DT).substeps;
    }
    log::info!(
        "Ran {} frames ({} physics steps), final score {}, camera {}",
        driver.frames(),
        substeps,
        score.get(),
        camera.get()
    );

    ctx.shutdown();
    if let Err(e) = store.save() {
        log::error!("Failed to save settings: {}", e);
    }
}

fn launch_velocity(rng: &mut Pcg32) -> Vec3 {
    Vec3::new(
        rng.random_range(2.0..6.0),
        rng.random_range(4.0..9.0),
        rng.random_range(-1.0..1.0),
    )
}

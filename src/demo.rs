//! Demo scene used by the `scenekit` binary.
//!
//! Sets up a `World` with the scene resources, fills the scene with
//! randomised [`Spinner`] members plus one [`BackgroundUpdater`], and builds
//! the update and draw schedules that drive it. Integration tests reuse the
//! same builders.

use bevy_ecs::prelude::*;
use log::{debug, info, trace};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::components::background::BackgroundUpdater;
use crate::components::priority::Priority;
use crate::events::scenefault::SceneFault;
use crate::resources::deferred::{Boundary, DeferredCalls};
use crate::resources::sceneconfig::SceneConfig;
use crate::resources::worldtime::WorldTime;
use crate::scene::{Drawable, MemberId, MemberResult, Scene, SceneError, SceneMember, Updatable};
use crate::systems::deferred::{
    run_draw_end_calls, run_draw_start_calls, run_update_end_calls, run_update_start_calls,
};
use crate::systems::scene::{scene_draw_system, scene_update_system, update_scene_fault_messages};

/// Priorities handed out to demo members fall in `0..PRIORITY_RANGE`.
pub const PRIORITY_RANGE: i32 = 100;

/// A member that turns at a fixed rate and counts its callbacks.
pub struct Spinner {
    name: String,
    update_priority: Priority,
    draw_priority: Priority,
    enabled: AtomicBool,
    visible: AtomicBool,
    /// Degrees per second.
    speed: f32,
    /// Current angle, stored as `f32` bits.
    angle: AtomicU32,
    updates: AtomicU64,
    draws: AtomicU64,
}

impl Spinner {
    pub fn new(name: impl Into<String>, update_priority: i32, draw_priority: i32) -> Self {
        Spinner {
            name: name.into(),
            update_priority: Priority::new(update_priority),
            draw_priority: Priority::new(draw_priority),
            enabled: AtomicBool::new(true),
            visible: AtomicBool::new(true),
            speed: 90.0,
            angle: AtomicU32::new(0.0f32.to_bits()),
            updates: AtomicU64::new(0),
            draws: AtomicU64::new(0),
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    pub fn angle(&self) -> f32 {
        f32::from_bits(self.angle.load(Ordering::Acquire))
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn draws(&self) -> u64 {
        self.draws.load(Ordering::Relaxed)
    }
}

impl SceneMember for Spinner {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Updatable for Spinner {
    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn update_priority(&self) -> &Priority {
        &self.update_priority
    }

    fn update(&self, time: &WorldTime) -> MemberResult {
        let angle = (self.angle() + self.speed * time.delta).rem_euclid(360.0);
        self.angle.store(angle.to_bits(), Ordering::Release);
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drawable for Spinner {
    fn visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    fn draw_priority(&self) -> &Priority {
        &self.draw_priority
    }

    fn draw(&self, time: &WorldTime) -> MemberResult {
        trace!(
            "frame {}: draw '{}' at {:.1} deg",
            time.frame_count,
            self.name,
            self.angle()
        );
        self.draws.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Slow updatable meant to run behind a [`BackgroundUpdater`].
pub struct Survey {
    priority: Priority,
    work: Duration,
    runs: AtomicU64,
}

impl Survey {
    pub fn new(work: Duration) -> Self {
        Survey {
            priority: Priority::new(0),
            work,
            runs: AtomicU64::new(0),
        }
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

impl SceneMember for Survey {
    fn name(&self) -> &str {
        "survey"
    }
}

impl Updatable for Survey {
    fn enabled(&self) -> bool {
        true
    }

    fn update_priority(&self) -> &Priority {
        &self.priority
    }

    fn update(&self, _time: &WorldTime) -> MemberResult {
        std::thread::sleep(self.work);
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Create a world holding every resource the scene systems need.
pub fn setup_world(config: &SceneConfig) -> World {
    let mut world = World::new();
    world.insert_resource(WorldTime::default().with_time_scale(config.time_scale));
    world.insert_resource(config.clone());
    world.insert_resource(Scene::new());
    world.insert_resource(DeferredCalls::new());
    world.init_resource::<Messages<SceneFault>>();
    world
}

/// Register `config.members` spinners with random priorities, plus a
/// background survey. Returns the spinners in registration order.
pub fn spawn_members(
    scene: &Scene,
    config: &SceneConfig,
    rng: &mut fastrand::Rng,
) -> Result<Vec<Arc<Spinner>>, SceneError> {
    let mut spinners = Vec::with_capacity(config.members as usize);
    for i in 0..config.members {
        let spinner = Arc::new(
            Spinner::new(
                format!("spinner-{}", i),
                rng.i32(0..PRIORITY_RANGE),
                rng.i32(0..PRIORITY_RANGE),
            )
            .with_speed(rng.f32() * 360.0),
        );
        scene.register(spinner.clone())?;
        spinners.push(spinner);
    }

    let survey = Arc::new(Survey::new(Duration::from_millis(2)));
    let background = BackgroundUpdater::new("survey", survey, PRIORITY_RANGE).block_after(4);
    scene.register_updatable(Arc::new(background))?;

    info!("demo: spawned {} member(s)", scene.len());
    Ok(spinners)
}

/// Give one random spinner new update and draw priorities.
pub fn shuffle_one(spinners: &[Arc<Spinner>], rng: &mut fastrand::Rng) {
    if spinners.is_empty() {
        return;
    }
    let spinner = &spinners[rng.usize(..spinners.len())];
    let update = rng.i32(0..PRIORITY_RANGE);
    let draw = rng.i32(0..PRIORITY_RANGE);
    debug!(
        "demo: '{}' update {} -> {}, draw {} -> {}",
        spinner.name,
        spinner.update_priority.get(),
        update,
        spinner.draw_priority.get(),
        draw
    );
    spinner.update_priority.set(update);
    spinner.draw_priority.set(draw);
}

/// Queue a spinner to be registered at the start of the next update pass.
///
/// The returned handle sees the member's id once the call has run.
pub fn defer_latecomer(world: &World, spinner: Arc<Spinner>) -> Arc<AtomicU64> {
    let registered = Arc::new(AtomicU64::new(u64::MAX));
    let slot = registered.clone();
    world
        .resource::<DeferredCalls>()
        .defer(Boundary::UpdateStart, move |world, time| {
            let scene = world.resource::<Scene>().clone();
            match scene.register(spinner) {
                Ok(MemberId(id)) => {
                    debug!("demo: latecomer joined as #{} on frame {}", id, time.frame_count);
                    slot.store(id, Ordering::Release);
                }
                Err(e) => log::error!("demo: latecomer rejected: {}", e),
            }
        });
    registered
}

/// Update schedule: deferred calls around the scene's update pass, then the
/// fault queue is advanced.
pub fn build_update_schedule() -> Schedule {
    let mut update = Schedule::default();
    update.add_systems(
        (
            run_update_start_calls,
            scene_update_system,
            run_update_end_calls,
            update_scene_fault_messages,
        )
            .chain(),
    );
    update
}

/// Draw schedule: deferred calls around the scene's draw pass.
pub fn build_draw_schedule() -> Schedule {
    let mut draw = Schedule::default();
    draw.add_systems((run_draw_start_calls, scene_draw_system, run_draw_end_calls).chain());
    draw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_wraps_angle() {
        let s = Spinner::new("s", 0, 0).with_speed(180.0);
        let mut t = WorldTime::default();
        t.advance(3.0);
        s.update(&t).unwrap();
        assert!((s.angle() - 180.0).abs() < 1e-3);
        assert_eq!(s.updates(), 1);
    }

    #[test]
    fn test_spawn_members_registers_survey() {
        let scene = Scene::new();
        let config = SceneConfig {
            members: 5,
            ..SceneConfig::new()
        };
        let mut rng = fastrand::Rng::with_seed(1);
        let spinners = spawn_members(&scene, &config, &mut rng).unwrap();
        assert_eq!(spinners.len(), 5);
        assert_eq!(scene.len(), 6);
        assert_eq!(scene.updatable_count(), 6);
        assert_eq!(scene.drawable_count(), 5);
        scene.clear().unwrap();
    }

    #[test]
    fn test_shuffle_keeps_orders_sorted() {
        let scene = Scene::new();
        let config = SceneConfig {
            members: 12,
            ..SceneConfig::new()
        };
        let mut rng = fastrand::Rng::with_seed(9);
        let spinners = spawn_members(&scene, &config, &mut rng).unwrap();
        for _ in 0..50 {
            shuffle_one(&spinners, &mut rng);
        }
        let snap = scene.snapshot();
        assert!(snap.update_order.windows(2).all(|w| w[0].priority <= w[1].priority));
        assert!(snap.draw_order.windows(2).all(|w| w[0].priority <= w[1].priority));
        scene.clear().unwrap();
    }
}

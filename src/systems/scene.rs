//! Scene dispatch systems.
//!
//! Bridge the [`Scene`] resource with a bevy `Schedule`:
//! - [`scene_update_system`] runs one update pass with the current
//!   [`WorldTime`]
//! - [`scene_draw_system`] runs one draw pass
//! - [`update_scene_fault_messages`] advances the [`SceneFault`] queue
//!
//! A failing member aborts the pass; the system logs the error and writes a
//! [`SceneFault`] instead of panicking, so the loop keeps running.

use bevy_ecs::prelude::*;
use log::error;

use crate::events::scenefault::SceneFault;
use crate::resources::worldtime::WorldTime;
use crate::scene::{Phase, Scene};

pub fn scene_update_system(
    scene: Res<Scene>,
    time: Res<WorldTime>,
    mut faults: MessageWriter<SceneFault>,
) {
    if let Err(e) = scene.update(&time) {
        error!("scene: update pass aborted on frame {}: {}", time.frame_count, e);
        faults.write(SceneFault::new(Phase::Update, time.frame_count, &e));
    }
}

pub fn scene_draw_system(
    scene: Res<Scene>,
    time: Res<WorldTime>,
    mut faults: MessageWriter<SceneFault>,
) {
    if let Err(e) = scene.draw(&time) {
        error!("scene: draw pass aborted on frame {}: {}", time.frame_count, e);
        faults.write(SceneFault::new(Phase::Draw, time.frame_count, &e));
    }
}

/// Advance the [`SceneFault`] message queue; run once per frame.
pub fn update_scene_fault_messages(mut msgs: ResMut<Messages<SceneFault>>) {
    msgs.update();
}

//! Scene pass failure messages.
//!
//! When a member callback fails during a pass driven by
//! [`crate::systems::scene`], the pass is aborted, the failure is logged and a
//! [`SceneFault`] is written so game code can react (show an error overlay,
//! quit, unregister the culprit, ...).
//!
//! Remember to advance `Messages<SceneFault>` once per frame (see
//! [`crate::systems::scene::update_scene_fault_messages`]).

use bevy_ecs::message::Message;

use crate::scene::{MemberFailure, Phase, SceneError};

#[derive(Message, Debug, Clone, PartialEq)]
pub struct SceneFault {
    /// Pass that was aborted.
    pub phase: Phase,
    /// Frame during which the pass failed.
    pub frame: u64,
    pub failures: Vec<MemberFailure>,
    /// Rendered error, for logging and overlays.
    pub message: String,
}

impl SceneFault {
    pub fn new(phase: Phase, frame: u64, error: &SceneError) -> Self {
        SceneFault {
            phase,
            frame,
            failures: error.failures().to_vec(),
            message: error.to_string(),
        }
    }
}

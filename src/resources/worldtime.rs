//! Simulation clock resource.
//!
//! [`WorldTime`] is the tick value handed to every scene member. It is
//! advanced once per frame by
//! [`update_world_time`](crate::systems::time::update_world_time) and passed
//! through unmodified to `update` and `draw`.

use bevy_ecs::prelude::Resource;
use serde::Serialize;

#[derive(Resource, Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WorldTime {
    /// Scaled seconds since the clock started.
    pub elapsed: f32,
    /// Scaled seconds of the current frame.
    pub delta: f32,
    pub time_scale: f32,
    /// Number of frames advanced so far.
    pub frame_count: u64,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
            frame_count: 0,
        }
    }
}

impl WorldTime {
    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Advance by an unscaled frame delta in seconds.
    pub fn advance(&mut self, dt: f32) {
        let scaled_dt = dt * self.time_scale;
        self.elapsed += scaled_dt;
        self.delta = scaled_dt;
        self.frame_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_applies_scale() {
        let mut t = WorldTime::default().with_time_scale(0.5);
        t.advance(0.2);
        t.advance(0.2);
        assert!((t.delta - 0.1).abs() < 1e-6);
        assert!((t.elapsed - 0.2).abs() < 1e-6);
        assert_eq!(t.frame_count, 2);
    }

    #[test]
    fn test_zero_scale_freezes_time() {
        let mut t = WorldTime::default().with_time_scale(0.0);
        t.advance(1.0);
        assert_eq!(t.elapsed, 0.0);
        assert_eq!(t.delta, 0.0);
        assert_eq!(t.frame_count, 1);
    }
}

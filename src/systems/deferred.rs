//! Exclusive systems that run deferred calls at pass boundaries.
//!
//! Schedule [`run_update_start_calls`] first and [`run_update_end_calls`]
//! last in the update schedule, and the draw pair around the draw schedule.
//! Each drains only the calls queued before it started; calls enqueued by a
//! running call wait for the next boundary of the same kind. This differs on
//! purpose from draining until the queue is empty, which would let a call that
//! re-enqueues itself stall the frame.

use bevy_ecs::prelude::*;
use log::trace;

use crate::resources::deferred::{Boundary, DeferredCalls};
use crate::resources::worldtime::WorldTime;

pub fn run_update_start_calls(world: &mut World) {
    run_deferred_calls(world, Boundary::UpdateStart);
}

pub fn run_update_end_calls(world: &mut World) {
    run_deferred_calls(world, Boundary::UpdateEnd);
}

pub fn run_draw_start_calls(world: &mut World) {
    run_deferred_calls(world, Boundary::DrawStart);
}

pub fn run_draw_end_calls(world: &mut World) {
    run_deferred_calls(world, Boundary::DrawEnd);
}

/// Drain and run the calls queued for `boundary`.
///
/// Does nothing when [`DeferredCalls`] is missing. Calls see the current
/// [`WorldTime`] (or a default one if the resource is absent).
pub fn run_deferred_calls(world: &mut World, boundary: Boundary) {
    let Some(calls) = world.get_resource::<DeferredCalls>() else {
        return;
    };
    let pending = calls.take(boundary);
    if pending.is_empty() {
        return;
    }
    let time = world.get_resource::<WorldTime>().copied().unwrap_or_default();
    trace!("deferred: running {} call(s) at {:?}", pending.len(), boundary);
    for call in pending {
        call(world, &time);
    }
}

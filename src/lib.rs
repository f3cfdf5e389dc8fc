//! Scenekit library.
//!
//! An ordered scene container for game loops: members register once and are
//! called back every tick in ascending update priority and draw priority,
//! with priorities that may change at any time. The [`scene`] module holds
//! the container itself; the remaining modules plug it into a bevy_ecs
//! `World` and `Schedule`.

pub mod components;
pub mod demo;
pub mod events;
pub mod resources;
pub mod scene;
pub mod systems;

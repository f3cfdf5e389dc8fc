//! Scene systems.
//!
//! Submodules overview
//! - [`deferred`] – run deferred calls at the update and draw boundaries
//! - [`scene`] – drive the scene's update and draw passes from a schedule
//! - [`time`] – advance [`crate::resources::worldtime::WorldTime`]

pub mod deferred;
pub mod scene;
pub mod time;

//! ECS resources made available to systems.
//!
//! Overview
//! - `deferred` – one-shot calls queued for the next pass boundary
//! - `sceneconfig` – demo runner settings loaded from an INI file
//! - `worldtime` – simulation time and delta
//!
//! The [`crate::scene::Scene`] handle itself is also a resource.
pub mod deferred;
pub mod sceneconfig;
pub mod worldtime;

//! Building blocks that scene members are made of.
//!
//! Submodules overview:
//! - [`priority`] – observable integer cell used for update and draw ordering
//! - [`background`] – updatable wrapper that runs another updatable on a worker thread

pub mod background;
pub mod priority;

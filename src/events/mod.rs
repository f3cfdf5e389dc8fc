//! Messages emitted by the scene systems.
//!
//! Submodules:
//! - [`scenefault`] – a pass aborted because a member callback failed
pub mod scenefault;
